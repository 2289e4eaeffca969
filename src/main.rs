// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Strava-Ledger Webhook Server
//!
//! Receives Strava activity events and mirrors each activity into one row of
//! a Google Sheets ledger.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use strava_ledger::{
    config::{Config, LedgerBackend},
    db::{LedgerStore, MemoryLedger, SheetsDb},
    services::{
        ActivityFetcher, ActivityProcessor, CredentialManager, GoogleTokenSource, LedgerSync,
        StravaClient, StravaToken,
    },
    AppState,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize structured JSON logging
    init_logging()?;

    // Load configuration from environment; refuse to start without it
    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!(error = %e, "Failed to load configuration");
            return Err(e.into());
        }
    };
    tracing::info!(port = config.port, "Starting Strava-Ledger webhook server");

    // Strava client and token lifecycle
    let strava = StravaClient::new(
        config.strava_client_id.clone(),
        config.strava_client_secret.clone(),
    );
    let credentials = CredentialManager::new(strava.clone(), initial_token(&config));
    let fetcher = ActivityFetcher::new(strava);

    // Ledger document
    let store = build_store(&config).await?;
    let ledger = Arc::new(LedgerSync::new(store));

    let state = Arc::new(AppState {
        config: config.clone(),
        processor: ActivityProcessor::new(credentials, fetcher, ledger),
    });

    // Build router
    let app = strava_ledger::routes::create_router(state);

    // Start server
    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(
        address = %addr,
        callback_url = %config.webhook_callback_url,
        "Server listening"
    );

    axum::serve(listener, app).await?;
    Ok(())
}

/// Seed token from configuration.
///
/// Without a seed access token an already-expired placeholder is used, so the
/// first event triggers a refresh.
fn initial_token(config: &Config) -> StravaToken {
    let expires_at = DateTime::from_timestamp(config.strava_token_expires_at, 0)
        .unwrap_or_default();

    match &config.strava_access_token {
        Some(access_token) => StravaToken {
            access_token: access_token.clone(),
            refresh_token: config.strava_refresh_token.clone(),
            expires_at,
        },
        None => StravaToken {
            access_token: String::new(),
            refresh_token: config.strava_refresh_token.clone(),
            expires_at: DateTime::<Utc>::default(),
        },
    }
}

/// Open the configured ledger backend.
async fn build_store(
    config: &Config,
) -> Result<Arc<dyn LedgerStore>, Box<dyn std::error::Error>> {
    match config.ledger_backend {
        LedgerBackend::Memory => {
            tracing::warn!("Using in-memory ledger; rows are lost on restart");
            let store: Arc<dyn LedgerStore> = Arc::new(MemoryLedger::new());
            Ok(store)
        }
        LedgerBackend::Sheets => {
            tracing::info!(
                path = %config.google_credentials_path,
                "Loading Google service account key"
            );
            let auth = Arc::new(GoogleTokenSource::from_file(&config.google_credentials_path)?);
            let sheets = SheetsDb::new(
                &config.google_sheets_id,
                &config.sheet_name,
                config.sheet_gid,
                auth,
            )?;

            // Connectivity check only; the server still starts if it fails.
            match sheets.check_connection().await {
                Ok(title) => tracing::info!(
                    spreadsheet = %title,
                    sheet = %config.sheet_name,
                    "Connected to Google Sheets"
                ),
                Err(e) => tracing::warn!(error = %e, "Google Sheets connectivity check failed"),
            }

            let store: Arc<dyn LedgerStore> = Arc::new(sheets);
            Ok(store)
        }
    }
}

/// Initialize structured JSON logging.
fn init_logging() -> Result<(), Box<dyn std::error::Error>> {
    let format = tracing_subscriber::fmt::layer()
        .json()
        .with_target(false)
        .with_current_span(true)
        .flatten_event(true);

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("strava_ledger=debug".parse()?)
                .add_directive("info".parse()?),
        )
        .with(format)
        .init();
    Ok(())
}
