// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Activity event processing.
//!
//! Handles the core workflow for one webhook delivery:
//! 1. Obtain a valid access token
//! 2. Fetch the activity from Strava and project it onto a ledger row
//! 3. Upsert the row into the ledger
//!
//! Events are applied in whatever order they reach the ledger lock: a late
//! redelivery of an older event overwrites a newer one (last write wins).

use crate::error::Result;
use crate::models::{ActivityEvent, AspectType};
use crate::services::ledger::{LedgerSync, UpsertKind, UpsertOutcome};
use crate::services::{ActivityFetcher, CredentialManager};
use std::sync::Arc;

/// Runs the token → fetch → upsert pipeline for activity events.
#[derive(Clone)]
pub struct ActivityProcessor {
    credentials: CredentialManager,
    fetcher: ActivityFetcher,
    ledger: Arc<LedgerSync>,
}

impl ActivityProcessor {
    pub fn new(
        credentials: CredentialManager,
        fetcher: ActivityFetcher,
        ledger: Arc<LedgerSync>,
    ) -> Self {
        Self {
            credentials,
            fetcher,
            ledger,
        }
    }

    /// Process one activity event, returning the ledger outcome.
    pub async fn process_event(&self, event: &ActivityEvent) -> Result<UpsertOutcome> {
        tracing::info!(
            activity_id = event.object_id,
            owner_id = event.owner_id,
            aspect_type = event.aspect_type.as_str(),
            event_time = event.event_time,
            "Processing activity event"
        );

        let access_token = self.credentials.get_valid_token().await?;
        let record = match self.fetcher.fetch(event.object_id, &access_token).await {
            Ok(record) => record,
            Err(e) => {
                if e.is_token_rejected() {
                    self.credentials.invalidate(&access_token).await;
                }
                return Err(e);
            }
        };
        let outcome = self.ledger.upsert(&record).await?;

        if event.aspect_type == AspectType::Update && outcome.kind == UpsertKind::Inserted {
            tracing::info!(
                activity_id = event.object_id,
                "Update event created a new row (create event was missed)"
            );
        }

        Ok(outcome)
    }

    /// Fire-and-forget entry point used by the webhook handler.
    ///
    /// Failures are logged as one structured record and dropped; Strava has
    /// already been acknowledged and nothing retries.
    pub async fn dispatch(&self, event: ActivityEvent) {
        let correlation_id = event.correlation_id();

        match self.process_event(&event).await {
            Ok(outcome) => {
                tracing::info!(
                    correlation_id = %correlation_id,
                    activity_id = event.object_id,
                    outcome = outcome.kind.as_str(),
                    row = outcome.row,
                    "Activity event processed"
                );
            }
            Err(e) => {
                tracing::error!(
                    correlation_id = %correlation_id,
                    activity_id = event.object_id,
                    owner_id = event.owner_id,
                    aspect_type = event.aspect_type.as_str(),
                    error_kind = e.kind(),
                    rate_limited = e.is_rate_limited(),
                    token_rejected = e.is_token_rejected(),
                    error = %e,
                    "Activity event failed"
                );
            }
        }
    }
}
