// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Access-token lifecycle against a mock Strava token endpoint.

mod common;

use chrono::Utc;
use common::{fresh_token, mock_strava_client, stale_token};
use serde_json::json;
use std::time::Duration;
use strava_ledger::error::AppError;
use strava_ledger::services::CredentialManager;
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn refreshed_body() -> serde_json::Value {
    json!({
        "token_type": "Bearer",
        "access_token": "new_access",
        "refresh_token": "new_refresh",
        "expires_at": Utc::now().timestamp() + 6 * 3600,
        "expires_in": 6 * 3600
    })
}

#[tokio::test]
async fn test_fresh_token_served_from_memory() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/oauth/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(refreshed_body()))
        .expect(0)
        .mount(&server)
        .await;

    let manager = CredentialManager::new(mock_strava_client(&server), fresh_token());

    for _ in 0..3 {
        assert_eq!(manager.get_valid_token().await.unwrap(), "valid_access");
    }
    assert_eq!(manager.refresh_count(), 0);
}

#[tokio::test]
async fn test_stale_token_refreshed_and_rotated() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/oauth/token"))
        .and(body_string_contains("grant_type=refresh_token"))
        .and(body_string_contains("refresh_token=stale_refresh"))
        .respond_with(ResponseTemplate::new(200).set_body_json(refreshed_body()))
        .expect(1)
        .mount(&server)
        .await;

    let manager = CredentialManager::new(mock_strava_client(&server), stale_token());

    assert_eq!(manager.get_valid_token().await.unwrap(), "new_access");
    // Second call uses the cached result
    assert_eq!(manager.get_valid_token().await.unwrap(), "new_access");

    let token = manager.current_token().await;
    assert_eq!(token.refresh_token, "new_refresh");
    assert!(token.is_fresh(Utc::now()));
    assert_eq!(manager.refresh_count(), 1);
}

#[tokio::test]
async fn test_concurrent_stale_callers_share_one_refresh() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/oauth/token"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(refreshed_body())
                .set_delay(Duration::from_millis(200)),
        )
        .expect(1)
        .mount(&server)
        .await;

    let manager = CredentialManager::new(mock_strava_client(&server), stale_token());

    let handles: Vec<_> = (0..10)
        .map(|_| {
            let manager = manager.clone();
            tokio::spawn(async move { manager.get_valid_token().await })
        })
        .collect();

    for handle in handles {
        assert_eq!(handle.await.unwrap().unwrap(), "new_access");
    }
    assert_eq!(manager.refresh_count(), 1);
}

#[tokio::test]
async fn test_failed_refresh_keeps_previous_token() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/oauth/token"))
        .respond_with(ResponseTemplate::new(400).set_body_string("invalid refresh token"))
        .mount(&server)
        .await;

    let manager = CredentialManager::new(mock_strava_client(&server), stale_token());

    let err = manager.get_valid_token().await.unwrap_err();
    assert!(matches!(err, AppError::Auth(_)));

    let token = manager.current_token().await;
    assert_eq!(token.access_token, "stale_access");
    assert_eq!(token.refresh_token, "stale_refresh");

    // The next call tries again rather than caching the failure.
    assert!(manager.get_valid_token().await.is_err());
    assert_eq!(manager.refresh_count(), 2);
}

#[tokio::test]
async fn test_refresh_recovers_after_failure() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/oauth/token"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/oauth/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(refreshed_body()))
        .mount(&server)
        .await;

    let manager = CredentialManager::new(mock_strava_client(&server), stale_token());

    assert!(manager.get_valid_token().await.is_err());
    assert_eq!(manager.get_valid_token().await.unwrap(), "new_access");
}

#[tokio::test]
async fn test_rate_limited_refresh_classified() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/oauth/token"))
        .respond_with(ResponseTemplate::new(429))
        .mount(&server)
        .await;

    let manager = CredentialManager::new(mock_strava_client(&server), stale_token());

    let err = manager.get_valid_token().await.unwrap_err();
    assert!(matches!(err, AppError::Auth(_)));
    assert!(err.is_rate_limited());
}

#[tokio::test]
async fn test_invalidated_token_refreshed_on_next_call() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/oauth/token"))
        .and(body_string_contains("refresh_token=valid_refresh"))
        .respond_with(ResponseTemplate::new(200).set_body_json(refreshed_body()))
        .expect(1)
        .mount(&server)
        .await;

    let manager = CredentialManager::new(mock_strava_client(&server), fresh_token());
    assert_eq!(manager.get_valid_token().await.unwrap(), "valid_access");

    manager.invalidate("valid_access").await;

    assert_eq!(manager.get_valid_token().await.unwrap(), "new_access");
    assert_eq!(manager.refresh_count(), 1);
}

#[tokio::test]
async fn test_invalidate_ignores_replaced_token() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/oauth/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(refreshed_body()))
        .expect(0)
        .mount(&server)
        .await;

    let manager = CredentialManager::new(mock_strava_client(&server), fresh_token());

    // A late 401 for a token we no longer hold changes nothing.
    manager.invalidate("some_older_access").await;

    assert_eq!(manager.get_valid_token().await.unwrap(), "valid_access");
    assert_eq!(manager.refresh_count(), 0);
}
