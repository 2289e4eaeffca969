// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Webhook routes for Strava events.

use crate::models::{ActivityEvent, WebhookEvent};
use crate::AppState;
use axum::{
    body::Bytes,
    extract::{Json, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use subtle::ConstantTimeEq;

/// Webhook routes.
pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/webhook", get(verify).post(handle_event))
}

/// Strava webhook verification query params.
///
/// All optional so that a malformed handshake is answered with 403 rather
/// than an extractor rejection.
#[derive(Deserialize)]
struct VerifyParams {
    #[serde(rename = "hub.mode", default)]
    mode: Option<String>,
    #[serde(rename = "hub.challenge", default)]
    challenge: Option<String>,
    #[serde(rename = "hub.verify_token", default)]
    verify_token: Option<String>,
}

/// Verification response.
#[derive(Serialize)]
struct VerifyResponse {
    #[serde(rename = "hub.challenge")]
    challenge: String,
}

/// Verify webhook subscription (GET).
async fn verify(
    State(state): State<Arc<AppState>>,
    Query(params): Query<VerifyParams>,
) -> impl IntoResponse {
    let expected = state.config.webhook_verify_token.as_bytes();
    let token_ok = params
        .verify_token
        .as_deref()
        .is_some_and(|token| bool::from(token.as_bytes().ct_eq(expected)));

    match (params.mode.as_deref(), params.challenge) {
        (Some("subscribe"), Some(challenge)) if token_ok => {
            tracing::info!("Webhook subscription verified");
            (StatusCode::OK, Json(VerifyResponse { challenge })).into_response()
        }
        (mode, _) => {
            tracing::warn!(
                mode = mode.unwrap_or(""),
                token_present = params.verify_token.is_some(),
                "Webhook verification failed"
            );
            StatusCode::FORBIDDEN.into_response()
        }
    }
}

/// Handle incoming webhook events (POST).
///
/// Always answers 200 before any upstream call is made; the event is processed
/// on a spawned task and its outcome is only visible in logs.
async fn handle_event(State(state): State<Arc<AppState>>, body: Bytes) -> StatusCode {
    let event: WebhookEvent = match serde_json::from_slice(&body) {
        Ok(e) => e,
        Err(e) => {
            tracing::warn!(
                error = %e,
                payload = %String::from_utf8_lossy(&body),
                "Failed to parse webhook event"
            );
            return StatusCode::OK; // Still return 200 to Strava to avoid retries
        }
    };

    tracing::info!(
        object_type = %event.object_type,
        object_id = event.object_id,
        aspect_type = %event.aspect_type,
        owner_id = event.owner_id,
        event_time = event.event_time,
        "Webhook event received"
    );

    if let (Some(expected), Some(received)) =
        (state.config.strava_subscription_id, event.subscription_id)
    {
        if expected != received {
            tracing::warn!(
                received_id = received,
                expected_id = expected,
                "Webhook subscription ID mismatch, ignoring event"
            );
            return StatusCode::OK;
        }
    }

    let Some(activity_event) = ActivityEvent::from_webhook(&event) else {
        tracing::debug!(
            object_type = %event.object_type,
            aspect_type = %event.aspect_type,
            "Ignoring webhook event"
        );
        return StatusCode::OK;
    };

    let processor = state.processor.clone();
    tokio::spawn(async move {
        processor.dispatch(activity_event).await;
    });

    StatusCode::OK
}
