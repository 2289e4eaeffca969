// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

use chrono::{Duration, Utc};
use serde_json::json;
use std::sync::Arc;
use strava_ledger::config::Config;
use strava_ledger::db::MemoryLedger;
use strava_ledger::models::ActivityRecord;
use strava_ledger::routes::create_router;
use strava_ledger::services::{
    ActivityFetcher, ActivityProcessor, CredentialManager, LedgerSync, StravaClient, StravaToken,
};
use strava_ledger::AppState;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Everything an end-to-end test needs to drive and observe the server.
#[allow(dead_code)]
pub struct TestApp {
    pub router: axum::Router,
    pub state: Arc<AppState>,
    pub ledger: Arc<MemoryLedger>,
    pub credentials: CredentialManager,
    pub strava: MockServer,
}

/// Token pair valid for another hour.
#[allow(dead_code)]
pub fn fresh_token() -> StravaToken {
    StravaToken {
        access_token: "valid_access".to_string(),
        refresh_token: "valid_refresh".to_string(),
        expires_at: Utc::now() + Duration::hours(1),
    }
}

/// Token pair that expired a minute ago.
#[allow(dead_code)]
pub fn stale_token() -> StravaToken {
    StravaToken {
        access_token: "stale_access".to_string(),
        refresh_token: "stale_refresh".to_string(),
        expires_at: Utc::now() - Duration::minutes(1),
    }
}

/// Strava client pointed at the mock server.
#[allow(dead_code)]
pub fn mock_strava_client(server: &MockServer) -> StravaClient {
    StravaClient::new("test_client_id".to_string(), "test_secret".to_string()).with_urls(
        format!("{}/api/v3", server.uri()),
        format!("{}/oauth/token", server.uri()),
    )
}

/// Create a test app backed by an in-memory ledger and a mock Strava API.
#[allow(dead_code)]
pub async fn create_test_app() -> TestApp {
    create_test_app_with(Config::test_default(), MemoryLedger::new()).await
}

/// Like [`create_test_app`], with explicit config and ledger.
#[allow(dead_code)]
pub async fn create_test_app_with(config: Config, ledger: MemoryLedger) -> TestApp {
    let strava = MockServer::start().await;
    let client = mock_strava_client(&strava);
    let credentials = CredentialManager::new(client.clone(), fresh_token());
    let ledger = Arc::new(ledger);

    let processor = ActivityProcessor::new(
        credentials.clone(),
        ActivityFetcher::new(client),
        Arc::new(LedgerSync::new(ledger.clone())),
    );

    let state = Arc::new(AppState { config, processor });

    TestApp {
        router: create_router(state.clone()),
        state,
        ledger,
        credentials,
        strava,
    }
}

/// Detailed activity payload as Strava returns it.
#[allow(dead_code)]
pub fn strava_activity_json(id: u64, name: &str) -> serde_json::Value {
    json!({
        "id": id,
        "name": name,
        "description": "Easy loop",
        "sport_type": "Run",
        "type": "Run",
        "start_date": "2024-03-04T15:30:00Z",
        "start_date_local": "2024-03-04T07:30:00Z",
        "distance": 5000.0,
        "moving_time": 1800
    })
}

/// Serve `body` for `GET /api/v3/activities/{id}`.
#[allow(dead_code)]
pub async fn mount_activity(server: &MockServer, id: u64, body: serde_json::Value) {
    Mock::given(method("GET"))
        .and(path(format!("/api/v3/activities/{id}")))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(server)
        .await;
}

/// A ledger record with fixed date fields.
#[allow(dead_code)]
pub fn record(activity_id: &str, title: &str) -> ActivityRecord {
    ActivityRecord {
        activity_id: activity_id.to_string(),
        day: "Monday".to_string(),
        date: "04/03/2024".to_string(),
        time: "07:30".to_string(),
        title: title.to_string(),
        notes: String::new(),
        activity_type: "Run".to_string(),
        distance: "5.00".to_string(),
        duration: "00:30:00".to_string(),
    }
}

/// Data region (row 10 onwards) of the ledger.
#[allow(dead_code)]
pub fn data_rows(ledger: &MemoryLedger) -> Vec<Vec<String>> {
    ledger.rows().into_iter().skip(9).collect()
}

/// Activity IDs in the data region, top to bottom.
#[allow(dead_code)]
pub fn data_ids(ledger: &MemoryLedger) -> Vec<String> {
    data_rows(ledger)
        .into_iter()
        .map(|row| row.get(8).cloned().unwrap_or_default())
        .collect()
}

/// Poll until `check` holds or a few seconds pass.
///
/// Webhook events are processed on spawned tasks, so tests have to wait for
/// their side effects.
#[allow(dead_code)]
pub async fn wait_for<F>(mut check: F) -> bool
where
    F: FnMut() -> bool,
{
    for _ in 0..300 {
        if check() {
            return true;
        }
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
    }
    check()
}
