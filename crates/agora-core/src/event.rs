//! Push-event envelope.
//!
//! The transport delivers named, payload-bearing events over a persistent
//! connection. Payloads always include the identifier of the entity the
//! event pertains to, so channels can discard events for entities they do
//! not currently track.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Reserved event name: transport connection established.
pub const EVENT_CONNECT: &str = "connect";
/// Reserved event name: transport connection dropped.
pub const EVENT_DISCONNECT: &str = "disconnect";
/// Reserved event name: transport failed to connect.
pub const EVENT_CONNECT_ERROR: &str = "connect_error";
/// Reserved event name: session token expired mid-connection.
pub const EVENT_TOKEN_EXPIRED: &str = "token_expired";
/// Reserved event name: credentials rejected by the server.
pub const EVENT_AUTH_ERROR: &str = "auth_error";

/// A named event delivered by the push transport.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventEnvelope {
    /// Event name, e.g. `order_status_updated`.
    #[serde(rename = "event")]
    pub name: String,
    /// Event payload. Always carries the entity id for domain events.
    #[serde(default)]
    pub payload: Value,
}

impl EventEnvelope {
    /// Create a new envelope.
    pub fn new(name: impl Into<String>, payload: Value) -> Self {
        Self {
            name: name.into(),
            payload,
        }
    }

    /// Whether this is one of the reserved transport lifecycle events.
    pub fn is_lifecycle(&self) -> bool {
        matches!(
            self.name.as_str(),
            EVENT_CONNECT
                | EVENT_DISCONNECT
                | EVENT_CONNECT_ERROR
                | EVENT_TOKEN_EXPIRED
                | EVENT_AUTH_ERROR
        )
    }

    /// Whether this lifecycle event signals an authentication failure.
    pub fn is_auth_failure(&self) -> bool {
        matches!(
            self.name.as_str(),
            EVENT_TOKEN_EXPIRED | EVENT_AUTH_ERROR
        )
    }

    /// Extract a string field from the payload, e.g. the entity id.
    pub fn str_field(&self, field: &str) -> Option<&str> {
        self.payload.get(field).and_then(Value::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_envelope() {
        let raw = r#"{"event":"order_status_updated","payload":{"order_id":"order-123","status":"confirmed"}}"#;
        let envelope: EventEnvelope = serde_json::from_str(raw).unwrap();
        assert_eq!(envelope.name, "order_status_updated");
        assert_eq!(envelope.str_field("order_id"), Some("order-123"));
        assert!(!envelope.is_lifecycle());
    }

    #[test]
    fn test_missing_payload_defaults_to_null() {
        let raw = r#"{"event":"connect"}"#;
        let envelope: EventEnvelope = serde_json::from_str(raw).unwrap();
        assert!(envelope.is_lifecycle());
        assert!(envelope.payload.is_null());
    }

    #[test]
    fn test_auth_failure_names() {
        assert!(EventEnvelope::new(EVENT_TOKEN_EXPIRED, json!({})).is_auth_failure());
        assert!(EventEnvelope::new(EVENT_AUTH_ERROR, json!({})).is_auth_failure());
        assert!(!EventEnvelope::new(EVENT_CONNECT_ERROR, json!({})).is_auth_failure());
    }
}
