// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Google service-account access tokens for the Sheets API.
//!
//! Mints a signed JWT assertion from the service-account key, exchanges it
//! for a bearer token and caches the result until shortly before expiry.

use crate::error::AppError;
use anyhow::Context;
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};
use tokio::sync::{Mutex, RwLock};

/// OAuth scope granting read/write access to spreadsheets.
pub const SHEETS_SCOPE: &str = "https://www.googleapis.com/auth/spreadsheets";

const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";
const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(10);
const ASSERTION_LIFETIME_SECS: u64 = 3600;
/// Refresh this long before the token expires (5 minutes).
const TOKEN_REFRESH_MARGIN: Duration = Duration::from_secs(5 * 60);

/// Fields of a service-account JSON key that we use.
#[derive(Clone, Deserialize)]
pub struct ServiceAccountKey {
    pub client_email: String,
    pub private_key: String,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.to_string()
}

#[derive(Clone)]
enum TokenSourceMode {
    ServiceAccount {
        client_email: String,
        token_uri: String,
        signing_key: Arc<EncodingKey>,
    },
    Static(String),
}

#[derive(Clone)]
struct CachedAccessToken {
    access_token: String,
    expires_at: Instant,
}

#[derive(Serialize)]
struct AssertionClaims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
    iat: u64,
    exp: u64,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: u64,
}

/// Source of bearer tokens for Google APIs.
pub struct GoogleTokenSource {
    http: reqwest::Client,
    mode: TokenSourceMode,
    cache: RwLock<Option<CachedAccessToken>>,
    refresh_lock: Mutex<()>,
}

impl GoogleTokenSource {
    /// Load a service-account key file.
    pub fn from_file(path: &str) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed reading Google credentials from {path}"))?;
        let key: ServiceAccountKey =
            serde_json::from_str(&raw).context("invalid Google credentials JSON")?;
        Self::from_key(key)
    }

    /// Build a token source from an already-parsed service-account key.
    pub fn from_key(key: ServiceAccountKey) -> anyhow::Result<Self> {
        let signing_key = EncodingKey::from_rsa_pem(key.private_key.as_bytes())
            .context("invalid service-account private key")?;

        let http = reqwest::Client::builder()
            .timeout(DEFAULT_HTTP_TIMEOUT)
            .build()
            .context("failed building Google auth HTTP client")?;

        tracing::info!(client_email = %key.client_email, "Loaded Google service account");

        Ok(Self {
            http,
            mode: TokenSourceMode::ServiceAccount {
                client_email: key.client_email,
                token_uri: key.token_uri,
                signing_key: Arc::new(signing_key),
            },
            cache: RwLock::new(None),
            refresh_lock: Mutex::new(()),
        })
    }

    /// A token source that always returns the same bearer token.
    ///
    /// This is intended for tests against a mock Sheets server.
    pub fn new_static(token: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            mode: TokenSourceMode::Static(token.into()),
            cache: RwLock::new(None),
            refresh_lock: Mutex::new(()),
        }
    }

    /// Return a bearer token valid for at least the refresh margin.
    pub async fn access_token(&self) -> Result<String, AppError> {
        let (client_email, token_uri, signing_key) = match &self.mode {
            TokenSourceMode::Static(token) => return Ok(token.clone()),
            TokenSourceMode::ServiceAccount {
                client_email,
                token_uri,
                signing_key,
            } => (client_email, token_uri, signing_key),
        };

        if let Some(token) = self.lookup_cached().await {
            return Ok(token);
        }

        let _guard = self.refresh_lock.lock().await;

        // Another task may have refreshed while we waited.
        if let Some(token) = self.lookup_cached().await {
            return Ok(token);
        }

        let fresh = self
            .mint(client_email, token_uri, signing_key.as_ref())
            .await?;
        let token = fresh.access_token.clone();
        *self.cache.write().await = Some(fresh);

        tracing::debug!("Google access token refreshed");
        Ok(token)
    }

    async fn lookup_cached(&self) -> Option<String> {
        let cache = self.cache.read().await;
        let now = Instant::now();
        cache
            .as_ref()
            .filter(|entry| entry.expires_at > now + TOKEN_REFRESH_MARGIN)
            .map(|entry| entry.access_token.clone())
    }

    async fn mint(
        &self,
        client_email: &str,
        token_uri: &str,
        signing_key: &EncodingKey,
    ) -> Result<CachedAccessToken, AppError> {
        let iat = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_err(|e| AppError::Internal(anyhow::anyhow!("clock before epoch: {e}")))?
            .as_secs();

        let claims = AssertionClaims {
            iss: client_email,
            scope: SHEETS_SCOPE,
            aud: token_uri,
            iat,
            exp: iat + ASSERTION_LIFETIME_SECS,
        };

        let assertion = encode(&Header::new(Algorithm::RS256), &claims, signing_key)
            .map_err(|e| AppError::Store(format!("Failed to sign Google assertion: {e}")))?;

        let requested_at = Instant::now();
        let response = self
            .http
            .post(token_uri)
            .form(&[
                ("grant_type", "urn:ietf:params:oauth:grant-type:jwt-bearer"),
                ("assertion", assertion.as_str()),
            ])
            .send()
            .await
            .map_err(|e| AppError::Store(format!("Google token request failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            tracing::error!(status = %status, body = %body, "Google token exchange failed");
            return Err(AppError::from_upstream_status(status, &body, AppError::Store));
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| AppError::Store(format!("Invalid Google token response: {e}")))?;

        Ok(CachedAccessToken {
            access_token: token.access_token,
            expires_at: requested_at + Duration::from_secs(token.expires_in),
        })
    }
}
