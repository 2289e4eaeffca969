// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Strava push-subscription event payloads.

use serde::{Deserialize, Serialize};

/// Raw webhook event as POSTed by Strava.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WebhookEvent {
    pub object_type: String, // "activity" or "athlete"
    pub object_id: u64,
    pub aspect_type: String, // "create", "update", "delete"
    pub owner_id: u64,
    #[serde(default)]
    pub subscription_id: Option<u64>,
    #[serde(default)]
    pub event_time: Option<i64>,
}

/// Activity lifecycle aspects that drive a ledger upsert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AspectType {
    Create,
    Update,
}

impl AspectType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AspectType::Create => "create",
            AspectType::Update => "update",
        }
    }
}

/// An activity event accepted for processing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActivityEvent {
    pub object_id: u64,
    pub owner_id: u64,
    pub aspect_type: AspectType,
    pub event_time: i64,
}

impl ActivityEvent {
    /// Accept only activity create/update events; everything else is ignored.
    pub fn from_webhook(event: &WebhookEvent) -> Option<Self> {
        if event.object_type != "activity" {
            return None;
        }
        let aspect_type = match event.aspect_type.as_str() {
            "create" => AspectType::Create,
            "update" => AspectType::Update,
            _ => return None,
        };
        Some(Self {
            object_id: event.object_id,
            owner_id: event.owner_id,
            aspect_type,
            event_time: event.event_time.unwrap_or_default(),
        })
    }

    /// Identifier tying together all log lines for one delivery.
    pub fn correlation_id(&self) -> String {
        format!(
            "{}:{}:{}",
            self.object_id,
            self.aspect_type.as_str(),
            self.event_time
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn webhook(object_type: &str, aspect_type: &str) -> WebhookEvent {
        WebhookEvent {
            object_type: object_type.to_string(),
            object_id: 111,
            aspect_type: aspect_type.to_string(),
            owner_id: 9,
            subscription_id: Some(1),
            event_time: Some(1_700_000_000),
        }
    }

    #[test]
    fn test_activity_create_and_update_accepted() {
        let create = ActivityEvent::from_webhook(&webhook("activity", "create")).unwrap();
        assert_eq!(create.aspect_type, AspectType::Create);
        assert_eq!(create.object_id, 111);

        let update = ActivityEvent::from_webhook(&webhook("activity", "update")).unwrap();
        assert_eq!(update.aspect_type, AspectType::Update);
    }

    #[test]
    fn test_other_events_ignored() {
        assert!(ActivityEvent::from_webhook(&webhook("activity", "delete")).is_none());
        assert!(ActivityEvent::from_webhook(&webhook("athlete", "update")).is_none());
        assert!(ActivityEvent::from_webhook(&webhook("athlete", "create")).is_none());
    }

    #[test]
    fn test_correlation_id() {
        let event = ActivityEvent::from_webhook(&webhook("activity", "update")).unwrap();
        assert_eq!(event.correlation_id(), "111:update:1700000000");
    }

    #[test]
    fn test_minimal_payload_deserializes() {
        let event: WebhookEvent = serde_json::from_value(serde_json::json!({
            "object_type": "activity",
            "aspect_type": "create",
            "object_id": 111,
            "owner_id": 9
        }))
        .unwrap();
        assert!(event.subscription_id.is_none());
        assert!(event.event_time.is_none());
    }
}
