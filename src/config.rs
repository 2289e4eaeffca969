// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Application configuration loaded from environment variables.
//!
//! Everything is read once at startup. A missing credential or identifier is
//! fatal: the server refuses to start rather than accept webhooks it cannot
//! process.

use std::env;

/// Default path of the Google service-account key file.
pub const DEFAULT_GOOGLE_CREDENTIALS_PATH: &str = "./google-credentials.json";

/// Which ledger document backend to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LedgerBackend {
    /// Google Sheets (production).
    Sheets,
    /// In-process grid, for local development without Google credentials.
    Memory,
}

/// Application configuration, loaded once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    // --- Strava ---
    /// Strava OAuth client ID
    pub strava_client_id: String,
    /// Strava OAuth client secret
    pub strava_client_secret: String,
    /// Long-lived refresh token for the single tracked athlete
    pub strava_refresh_token: String,
    /// Optional seed access token (skips the first refresh if still valid)
    pub strava_access_token: Option<String>,
    /// Expiry of the seed access token (unix seconds)
    pub strava_token_expires_at: i64,
    /// Webhook verification token shared with Strava
    pub webhook_verify_token: String,
    /// Expected push subscription ID (events for others are ignored)
    pub strava_subscription_id: Option<u64>,

    // --- Ledger document ---
    /// Which backend holds the ledger
    pub ledger_backend: LedgerBackend,
    /// Google Sheets spreadsheet ID
    pub google_sheets_id: String,
    /// Sheet (tab) name used in A1 ranges
    pub sheet_name: String,
    /// Numeric sheet ID (gid) used for structural updates
    pub sheet_gid: i64,
    /// Path to the service-account JSON key
    pub google_credentials_path: String,

    // --- Server ---
    /// Server port
    pub port: u16,
    /// Public callback URL registered with Strava (informational)
    pub webhook_callback_url: String,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok(); // Load .env file if present

        let port = match env::var("PORT") {
            Ok(v) => v
                .trim()
                .parse()
                .map_err(|e| ConfigError::Invalid("PORT", format!("{e}")))?,
            Err(_) => 3000,
        };

        let strava_token_expires_at = match env::var("STRAVA_TOKEN_EXPIRES_AT") {
            Ok(v) => v
                .trim()
                .parse()
                .map_err(|e| ConfigError::Invalid("STRAVA_TOKEN_EXPIRES_AT", format!("{e}")))?,
            Err(_) => 0,
        };

        let strava_subscription_id = match env::var("STRAVA_SUBSCRIPTION_ID") {
            Ok(v) if !v.trim().is_empty() => Some(
                v.trim()
                    .parse()
                    .map_err(|e| ConfigError::Invalid("STRAVA_SUBSCRIPTION_ID", format!("{e}")))?,
            ),
            _ => None,
        };

        let sheet_gid = match env::var("GOOGLE_SHEET_GID") {
            Ok(v) => v
                .trim()
                .parse()
                .map_err(|e| ConfigError::Invalid("GOOGLE_SHEET_GID", format!("{e}")))?,
            Err(_) => 0,
        };

        let ledger_backend = match env::var("LEDGER_BACKEND").as_deref() {
            Ok("memory") => LedgerBackend::Memory,
            Ok("sheets") | Err(_) => LedgerBackend::Sheets,
            Ok(other) => {
                return Err(ConfigError::Invalid(
                    "LEDGER_BACKEND",
                    format!("expected 'sheets' or 'memory', got '{other}'"),
                ))
            }
        };

        Ok(Self {
            strava_client_id: required("STRAVA_CLIENT_ID")?,
            strava_client_secret: required("STRAVA_CLIENT_SECRET")?,
            strava_refresh_token: required("STRAVA_REFRESH_TOKEN")?,
            strava_access_token: env::var("STRAVA_ACCESS_TOKEN")
                .ok()
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty()),
            strava_token_expires_at,
            webhook_verify_token: required("STRAVA_VERIFY_TOKEN")?,
            strava_subscription_id,

            ledger_backend,
            google_sheets_id: required("GOOGLE_SHEETS_ID")?,
            sheet_name: env::var("GOOGLE_SHEET_NAME").unwrap_or_else(|_| "Sheet1".to_string()),
            sheet_gid,
            google_credentials_path: env::var("GOOGLE_APPLICATION_CREDENTIALS")
                .unwrap_or_else(|_| DEFAULT_GOOGLE_CREDENTIALS_PATH.to_string()),

            port,
            webhook_callback_url: env::var("WEBHOOK_CALLBACK_URL")
                .unwrap_or_else(|_| format!("http://localhost:{port}/webhook")),
        })
    }

    /// Deterministic configuration for tests.
    pub fn test_default() -> Self {
        Self {
            strava_client_id: "test_client_id".to_string(),
            strava_client_secret: "test_secret".to_string(),
            strava_refresh_token: "test_refresh_token".to_string(),
            strava_access_token: None,
            strava_token_expires_at: 0,
            webhook_verify_token: "test_verify_token".to_string(),
            strava_subscription_id: None,
            ledger_backend: LedgerBackend::Memory,
            google_sheets_id: "test-sheet".to_string(),
            sheet_name: "Sheet1".to_string(),
            sheet_gid: 0,
            google_credentials_path: DEFAULT_GOOGLE_CREDENTIALS_PATH.to_string(),
            port: 3000,
            webhook_callback_url: "http://localhost:3000/webhook".to_string(),
        }
    }
}

/// Read a required variable, trimming stray whitespace from secret files.
fn required(name: &'static str) -> Result<String, ConfigError> {
    env::var(name)
        .map(|v| v.trim().to_string())
        .ok()
        .filter(|v| !v.is_empty())
        .ok_or(ConfigError::Missing(name))
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),

    #[error("Invalid value for {0}: {1}")]
    Invalid(&'static str, String),
}

#[cfg(test)]
mod tests {
    use super::*;

    // Environment mutation is process-wide, so everything lives in one test.
    #[test]
    fn test_config_from_env() {
        env::set_var("STRAVA_CLIENT_ID", "test_id");
        env::set_var("STRAVA_CLIENT_SECRET", " test_secret\n");
        env::set_var("STRAVA_REFRESH_TOKEN", "refresh");
        env::set_var("STRAVA_VERIFY_TOKEN", "test_verify");
        env::set_var("GOOGLE_SHEETS_ID", "sheet-123");
        env::remove_var("PORT");
        env::remove_var("LEDGER_BACKEND");

        let config = Config::from_env().expect("Config should load");

        assert_eq!(config.strava_client_id, "test_id");
        assert_eq!(config.strava_client_secret, "test_secret");
        assert_eq!(config.port, 3000);
        assert_eq!(config.sheet_name, "Sheet1");
        assert_eq!(config.ledger_backend, LedgerBackend::Sheets);
        assert_eq!(config.webhook_callback_url, "http://localhost:3000/webhook");

        env::set_var("PORT", "not-a-port");
        assert!(matches!(
            Config::from_env(),
            Err(ConfigError::Invalid("PORT", _))
        ));
        env::remove_var("PORT");

        env::remove_var("STRAVA_REFRESH_TOKEN");
        assert!(matches!(
            Config::from_env(),
            Err(ConfigError::Missing("STRAVA_REFRESH_TOKEN"))
        ));
    }
}
