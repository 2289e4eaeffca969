// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Services module - business logic layer.

pub mod activity;
pub mod fetcher;
pub mod google_auth;
pub mod ledger;
pub mod strava;

pub use activity::ActivityProcessor;
pub use fetcher::ActivityFetcher;
pub use google_auth::GoogleTokenSource;
pub use ledger::{LedgerSync, UpsertKind, UpsertOutcome};
pub use strava::{CredentialManager, StravaClient, StravaToken};
