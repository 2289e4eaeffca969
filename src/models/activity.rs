// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Canonical ledger row for a Strava activity.

use crate::services::strava::StravaActivity;
use crate::time_utils::{format_hms, parse_wall_clock};
use serde::{Deserialize, Serialize};

/// Title used when Strava returns an empty or missing name.
pub const UNTITLED_ACTIVITY: &str = "Untitled Activity";

/// Placeholder for missing distance/duration.
pub const NOT_AVAILABLE: &str = "N/A";

/// Column labels of the ledger, in column order.
pub const COLUMN_LABELS: [&str; 9] = [
    "Day",
    "Date",
    "Time",
    "Activity Title",
    "Notes",
    "Type",
    "Distance",
    "Duration",
    "Activity ID",
];

/// Zero-based column holding the activity ID (the upsert key).
pub const KEY_COLUMN: usize = 8;

/// One ledger row, keyed by `activity_id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityRecord {
    /// Strava activity ID (unique key)
    pub activity_id: String,
    /// Weekday name, e.g. "Monday"
    pub day: String,
    /// Start date as dd/mm/yyyy
    pub date: String,
    /// Start time as HH:MM (24h)
    pub time: String,
    /// Activity name
    pub title: String,
    /// Activity description
    pub notes: String,
    /// Sport type (Run, Ride, ...)
    pub activity_type: String,
    /// Distance in km with two decimals
    pub distance: String,
    /// Moving time as HH:MM:SS
    pub duration: String,
}

impl ActivityRecord {
    /// Project a detailed Strava activity onto a ledger row.
    ///
    /// `activity_id` comes from the webhook event, which is authoritative even
    /// if the detail payload omits or disagrees on `id`.
    pub fn from_strava(activity_id: u64, activity: &StravaActivity) -> Self {
        // Day, date and time must all come from the same parsed instant.
        let started = activity
            .start_date_local
            .as_deref()
            .and_then(parse_wall_clock)
            .or_else(|| activity.start_date.as_deref().and_then(parse_wall_clock));

        let (day, date, time) = match started {
            Some(ts) => (
                ts.format("%A").to_string(),
                ts.format("%d/%m/%Y").to_string(),
                ts.format("%H:%M").to_string(),
            ),
            None => {
                tracing::warn!(activity_id, "Activity has no usable start date");
                (String::new(), String::new(), String::new())
            }
        };

        let title = non_empty(activity.name.as_deref())
            .unwrap_or(UNTITLED_ACTIVITY)
            .to_string();
        let notes = activity.description.clone().unwrap_or_default();
        let activity_type = non_empty(activity.sport_type.as_deref())
            .or(non_empty(activity.activity_type.as_deref()))
            .unwrap_or_default()
            .to_string();

        let distance = match activity.distance {
            Some(meters) if meters > 0.0 => format!("{:.2}", meters / 1000.0),
            _ => NOT_AVAILABLE.to_string(),
        };
        let duration = match activity.moving_time {
            Some(secs) if secs > 0 => format_hms(secs),
            _ => NOT_AVAILABLE.to_string(),
        };

        Self {
            activity_id: activity_id.to_string(),
            day,
            date,
            time,
            title,
            notes,
            activity_type,
            distance,
            duration,
        }
    }

    /// Cell values in ledger column order.
    ///
    /// Rows are written as if typed by a user, so free text that would parse
    /// as a formula is quoted.
    pub fn to_row(&self) -> Vec<String> {
        vec![
            self.day.clone(),
            self.date.clone(),
            self.time.clone(),
            quote_text(&self.title),
            quote_text(&self.notes),
            quote_text(&self.activity_type),
            self.distance.clone(),
            self.duration.clone(),
            self.activity_id.clone(),
        ]
    }
}

/// Prefix `'` onto text the spreadsheet would otherwise evaluate.
fn quote_text(value: &str) -> String {
    if value.starts_with(['=', '+', '-', '@']) {
        format!("'{value}")
    } else {
        value.to_string()
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}
