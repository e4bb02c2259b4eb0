//! Event payloads and the JSON envelope that goes over the wire

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::constants::TEST_EVENT_TYPE;

/// Anything that can be delivered as a webhook.
///
/// The dispatcher only needs an id (stable across retries) and a type; the
/// rest of the value is serialized into `payload` untouched.
pub trait WebhookEvent: Serialize {
    fn event_id(&self) -> &str;
    fn event_type(&self) -> &str;
}

/* -------------------------------------------------------------------------- */
/* Upstream payload */
/* -------------------------------------------------------------------------- */

/// Booking/contract event handed over by the application layer.
///
/// Opaque to delivery: nothing here is validated beyond being serializable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingEventPayload {
    pub id: String,

    #[serde(rename = "type")]
    pub event_type: String,

    pub description: String,

    pub created_at: DateTime<Utc>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,

    #[serde(default)]
    pub metadata: Map<String, Value>,
}

impl BookingEventPayload {
    /// New event with a random id and `created_at = now`.
    pub fn new(event_type: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            event_type: event_type.into(),
            description: description.into(),
            created_at: Utc::now(),
            updated_at: None,
            metadata: Map::new(),
        }
    }

    /// Synthetic event used to check that a receiver is reachable.
    pub fn connection_test() -> Self {
        Self::new(TEST_EVENT_TYPE, "Webhook connection test")
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

impl WebhookEvent for BookingEventPayload {
    fn event_id(&self) -> &str {
        &self.id
    }

    fn event_type(&self) -> &str {
        &self.event_type
    }
}

/* -------------------------------------------------------------------------- */
/* Wire envelope */
/* -------------------------------------------------------------------------- */

/// Where and when an envelope was produced
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SystemContext {
    pub environment: String,
    pub timestamp: DateTime<Utc>,
    /// Caller supplied context; `null` when none was given
    pub request_metadata: Value,
}

/// JSON body POSTed to the receiver. Built fresh for every attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookEnvelope {
    pub event_id: String,
    pub event_type: String,
    pub event_timestamp: DateTime<Utc>,
    pub payload: Value,
    pub system_context: SystemContext,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payload_uses_type_key_and_camel_case() {
        let event = BookingEventPayload::new("booking.created", "New booking")
            .with_metadata("bookingId", "bk_42");
        let json = serde_json::to_value(&event).unwrap();

        assert_eq!(json["type"], "booking.created");
        assert!(json.get("createdAt").is_some());
        assert!(json.get("updatedAt").is_none());
        assert_eq!(json["metadata"]["bookingId"], "bk_42");
    }

    #[test]
    fn payload_deserializes_without_optional_fields() {
        let event: BookingEventPayload = serde_json::from_str(
            r#"{"id":"evt_1","type":"contract.signed","description":"d","createdAt":"2024-05-01T10:00:00Z"}"#,
        )
        .unwrap();
        assert_eq!(event.event_id(), "evt_1");
        assert_eq!(event.event_type(), "contract.signed");
        assert!(event.metadata.is_empty());
    }

    #[test]
    fn connection_test_event_has_test_type_and_unique_id() {
        let a = BookingEventPayload::connection_test();
        let b = BookingEventPayload::connection_test();
        assert_eq!(a.event_type, "webhook.test");
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn envelope_serializes_camel_case_keys() {
        let now = Utc::now();
        let envelope = WebhookEnvelope {
            event_id: "evt_1".into(),
            event_type: "booking.created".into(),
            event_timestamp: now,
            payload: serde_json::json!({"id": "evt_1"}),
            system_context: SystemContext {
                environment: "test".into(),
                timestamp: now,
                request_metadata: Value::Null,
            },
        };
        let json = serde_json::to_value(&envelope).unwrap();

        assert_eq!(json["eventId"], "evt_1");
        assert_eq!(json["eventType"], "booking.created");
        assert!(json["eventTimestamp"].is_string());
        assert_eq!(json["systemContext"]["environment"], "test");
        assert!(json["systemContext"]["requestMetadata"].is_null());
    }
}
