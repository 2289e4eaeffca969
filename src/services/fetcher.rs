// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Fetches activity detail and projects it onto a ledger row.

use crate::error::Result;
use crate::models::ActivityRecord;
use crate::services::strava::StravaClient;

/// Single-shot activity detail fetcher (no retries).
#[derive(Clone)]
pub struct ActivityFetcher {
    client: StravaClient,
}

impl ActivityFetcher {
    pub fn new(client: StravaClient) -> Self {
        Self { client }
    }

    /// Fetch an activity with the given bearer token and normalize it.
    pub async fn fetch(&self, activity_id: u64, access_token: &str) -> Result<ActivityRecord> {
        let activity = self.client.get_activity(access_token, activity_id).await?;

        if let Some(id) = activity.id.filter(|id| *id != activity_id) {
            tracing::warn!(activity_id, payload_id = id, "Activity payload ID mismatch");
        }

        let record = ActivityRecord::from_strava(activity_id, &activity);
        tracing::debug!(activity_id, title = %record.title, "Fetched activity");
        Ok(record)
    }
}
