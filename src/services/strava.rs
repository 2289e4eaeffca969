// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Strava API client and access-token lifecycle.
//!
//! Handles:
//! - Activity fetching
//! - Token refresh when expired (single-flight across concurrent callers)
//! - Rate limit / revoked token classification

use crate::error::AppError;
use chrono::{DateTime, Duration, Utc};
use futures_util::future::{BoxFuture, FutureExt, Shared};
use serde::Deserialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;

const DEFAULT_API_URL: &str = "https://www.strava.com/api/v3";
const DEFAULT_OAUTH_TOKEN_URL: &str = "https://www.strava.com/oauth/token";

/// Strava API client.
#[derive(Clone)]
pub struct StravaClient {
    http: reqwest::Client,
    base_url: String,
    token_url: String,
    client_id: String,
    client_secret: String,
}

impl StravaClient {
    /// Create a new Strava client with OAuth credentials.
    pub fn new(client_id: String, client_secret: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: DEFAULT_API_URL.to_string(),
            token_url: DEFAULT_OAUTH_TOKEN_URL.to_string(),
            client_id,
            client_secret,
        }
    }

    /// Point the client at a different API root and token endpoint (tests).
    pub fn with_urls(mut self, base_url: impl Into<String>, token_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self.token_url = token_url.into();
        self
    }

    /// Get a detailed activity by ID.
    pub async fn get_activity(
        &self,
        access_token: &str,
        activity_id: u64,
    ) -> Result<StravaActivity, AppError> {
        let url = format!("{}/activities/{}", self.base_url, activity_id);

        let response = self
            .http
            .get(&url)
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|e| AppError::Fetch(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::from_upstream_status(status, &body, AppError::Fetch));
        }

        response
            .json()
            .await
            .map_err(|e| AppError::Fetch(format!("JSON parse error: {}", e)))
    }

    /// Exchange a refresh token for a new access/refresh token pair.
    pub async fn refresh_token(
        &self,
        refresh_token: &str,
    ) -> Result<TokenRefreshResponse, AppError> {
        let response = self
            .http
            .post(&self.token_url)
            .form(&[
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("refresh_token", refresh_token),
                ("grant_type", "refresh_token"),
            ])
            .send()
            .await
            .map_err(|e| AppError::Auth(format!("Token refresh request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            tracing::error!(status = %status, body = %body, "Strava token refresh failed");
            return Err(AppError::from_upstream_status(status, &body, AppError::Auth));
        }

        response
            .json()
            .await
            .map_err(|e| AppError::Auth(format!("Failed to parse token response: {}", e)))
    }
}

/// Token refresh response from Strava.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenRefreshResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_at: i64,
}

/// Detailed Strava activity response.
///
/// Everything is optional: the ledger substitutes defaults rather than
/// rejecting sparse payloads.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StravaActivity {
    #[serde(default)]
    pub id: Option<u64>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub sport_type: Option<String>,
    /// Legacy activity type, superseded by `sport_type`.
    #[serde(default, rename = "type")]
    pub activity_type: Option<String>,
    #[serde(default)]
    pub start_date: Option<String>,
    #[serde(default)]
    pub start_date_local: Option<String>,
    /// Distance in meters
    #[serde(default)]
    pub distance: Option<f64>,
    /// Moving time in seconds
    #[serde(default)]
    pub moving_time: Option<u64>,
}

// ─────────────────────────────────────────────────────────────────────────────
// CredentialManager - access token lifecycle
// ─────────────────────────────────────────────────────────────────────────────

/// Margin before token expiration when we proactively refresh (5 minutes).
pub const TOKEN_REFRESH_MARGIN_SECS: i64 = 5 * 60;

/// The athlete's current OAuth token pair.
#[derive(Debug, Clone)]
pub struct StravaToken {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_at: DateTime<Utc>,
}

impl StravaToken {
    /// True if the access token can be used without refreshing.
    pub fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        now < self.expires_at - Duration::seconds(TOKEN_REFRESH_MARGIN_SECS)
    }
}

impl TryFrom<TokenRefreshResponse> for StravaToken {
    type Error = AppError;

    fn try_from(response: TokenRefreshResponse) -> Result<Self, Self::Error> {
        let expires_at = DateTime::from_timestamp(response.expires_at, 0).ok_or_else(|| {
            AppError::Auth(format!("Invalid token expiry: {}", response.expires_at))
        })?;
        Ok(Self {
            access_token: response.access_token,
            refresh_token: response.refresh_token,
            expires_at,
        })
    }
}

/// In-flight refresh, awaited by every caller that found the token stale.
type RefreshFuture = Shared<BoxFuture<'static, Result<StravaToken, String>>>;

struct TokenSlot {
    token: StravaToken,
    pending: Option<RefreshFuture>,
}

struct CredentialState {
    client: StravaClient,
    slot: Mutex<TokenSlot>,
    refreshes: AtomicU64,
}

/// Owns the single athlete's token pair and hands out valid access tokens.
///
/// - Fresh token: returned from memory, no I/O.
/// - Stale token: the first caller starts a refresh; later callers await the
///   same shared future instead of starting another.
/// - Failed refresh: previous token pair is kept, every waiter gets
///   `AppError::Auth`, and the next call tries again.
#[derive(Clone)]
pub struct CredentialManager {
    inner: Arc<CredentialState>,
}

impl CredentialManager {
    /// Create a manager seeded with an initial token pair.
    pub fn new(client: StravaClient, initial: StravaToken) -> Self {
        Self {
            inner: Arc::new(CredentialState {
                client,
                slot: Mutex::new(TokenSlot {
                    token: initial,
                    pending: None,
                }),
                refreshes: AtomicU64::new(0),
            }),
        }
    }

    /// Get a valid (non-expiring) access token, refreshing at most once.
    pub async fn get_valid_token(&self) -> Result<String, AppError> {
        let refresh = {
            let mut slot = self.inner.slot.lock().await;

            if slot.token.is_fresh(Utc::now()) {
                return Ok(slot.token.access_token.clone());
            }

            match &slot.pending {
                Some(pending) => pending.clone(),
                None => {
                    let pending =
                        Self::start_refresh(self.inner.clone(), slot.token.refresh_token.clone());
                    slot.pending = Some(pending.clone());
                    pending
                }
            }
        };

        refresh
            .await
            .map(|token| token.access_token)
            .map_err(AppError::Auth)
    }

    /// Mark `rejected` as unusable after Strava answered 401 for it.
    ///
    /// The next call refreshes instead of reusing the cached token. A token
    /// that has already been replaced is left alone.
    pub async fn invalidate(&self, rejected: &str) {
        let mut slot = self.inner.slot.lock().await;
        if slot.token.access_token == rejected {
            slot.token.expires_at = DateTime::<Utc>::default();
            tracing::warn!("Access token rejected by Strava, forcing refresh");
        }
    }

    /// Number of refresh exchanges started so far.
    pub fn refresh_count(&self) -> u64 {
        self.inner.refreshes.load(Ordering::SeqCst)
    }

    /// Snapshot of the current token pair.
    pub async fn current_token(&self) -> StravaToken {
        self.inner.slot.lock().await.token.clone()
    }

    fn start_refresh(inner: Arc<CredentialState>, refresh_token: String) -> RefreshFuture {
        async move {
            inner.refreshes.fetch_add(1, Ordering::SeqCst);
            tracing::info!("Access token expired, refreshing");

            let result = inner
                .client
                .refresh_token(&refresh_token)
                .await
                .and_then(StravaToken::try_from);

            let mut slot = inner.slot.lock().await;
            slot.pending = None;

            match result {
                Ok(token) => {
                    // Replace all three fields at once.
                    slot.token = token.clone();
                    tracing::info!(expires_at = %token.expires_at, "Token refreshed");
                    Ok(token)
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Token refresh failed, keeping previous token");
                    Err(match e {
                        AppError::Auth(msg) => msg,
                        other => other.to_string(),
                    })
                }
            }
        }
        .boxed()
        .shared()
    }
}
