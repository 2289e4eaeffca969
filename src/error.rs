// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Application error types.
//!
//! Webhook responses never carry these errors (Strava has already been
//! acknowledged by the time they happen), so they exist for control flow and
//! for the structured failure records written by the event dispatcher.

/// Application error type.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// Token refresh failed (network error or non-success response).
    #[error("Authentication error: {0}")]
    Auth(String),

    /// Upstream activity detail could not be fetched.
    #[error("Strava API error: {0}")]
    Fetch(String),

    /// The ledger document could not be read or written.
    #[error("Ledger store error: {0}")]
    Store(String),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    /// Message used when an upstream API answers 429.
    pub const RATE_LIMITED: &'static str = "Rate limit exceeded";

    /// Message used when an upstream API rejects our bearer token.
    pub const TOKEN_REJECTED: &'static str = "Token expired or invalid";

    /// Stable short name for structured logs.
    pub fn kind(&self) -> &'static str {
        match self {
            AppError::Auth(_) => "auth",
            AppError::Fetch(_) => "fetch",
            AppError::Store(_) => "store",
            AppError::Internal(_) => "internal",
        }
    }

    /// True if an upstream API throttled us.
    pub fn is_rate_limited(&self) -> bool {
        match self {
            AppError::Auth(msg) | AppError::Fetch(msg) | AppError::Store(msg) => {
                msg.contains(Self::RATE_LIMITED)
            }
            _ => false,
        }
    }

    /// True if an upstream API rejected the bearer token.
    pub fn is_token_rejected(&self) -> bool {
        match self {
            AppError::Auth(msg) | AppError::Fetch(msg) | AppError::Store(msg) => {
                msg.contains(Self::TOKEN_REJECTED)
            }
            _ => false,
        }
    }

    /// Build an error for a non-success upstream response.
    ///
    /// `wrap` selects the taxonomy bucket (e.g. `AppError::Fetch`).
    pub fn from_upstream_status(
        status: reqwest::StatusCode,
        body: &str,
        wrap: fn(String) -> AppError,
    ) -> AppError {
        match status.as_u16() {
            429 => {
                tracing::warn!("Upstream rate limit hit (429)");
                wrap(Self::RATE_LIMITED.to_string())
            }
            401 => wrap(Self::TOKEN_REJECTED.to_string()),
            _ => wrap(format!("HTTP {}: {}", status, body)),
        }
    }
}

/// Result type alias used throughout the crate.
pub type Result<T> = std::result::Result<T, AppError>;
