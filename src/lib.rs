// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Strava-Ledger: mirror Strava activities into a spreadsheet ledger
//!
//! This crate receives Strava push-subscription webhooks, fetches the
//! activity detail for the configured athlete and keeps exactly one
//! spreadsheet row per activity.

pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod time_utils;

use config::Config;
use services::ActivityProcessor;

/// Shared application state.
pub struct AppState {
    pub config: Config,
    pub processor: ActivityProcessor,
}
