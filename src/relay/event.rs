//! # Relay Events
//!
//! Event types flowing from the upstream feed to downstream clients.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A unit relayed from the upstream event source.
///
/// The `directory` is the routing key: `Some(dir)` delivers only to clients
/// subscribed to that directory, `None` is a broadcast to every connected
/// client (system-wide notices such as `connected` and `ping`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelayEvent {
    /// Routing key; absent = broadcast
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub directory: Option<String>,

    /// Outward event name (e.g. "session.updated", "ping")
    pub kind: String,

    /// Opaque event body
    pub payload: Value,
}

impl RelayEvent {
    /// Create an event scoped to a single directory
    pub fn scoped(directory: impl Into<String>, kind: impl Into<String>, payload: Value) -> Self {
        Self {
            directory: Some(directory.into()),
            kind: kind.into(),
            payload,
        }
    }

    /// Create a broadcast event delivered to all connected clients
    pub fn broadcast(kind: impl Into<String>, payload: Value) -> Self {
        Self {
            directory: None,
            kind: kind.into(),
            payload,
        }
    }

    /// Check if this event is a broadcast
    pub fn is_broadcast(&self) -> bool {
        self.directory.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_scoped_event() {
        let event = RelayEvent::scoped("repoA", "session.updated", json!({"x": 1}));
        assert_eq!(event.directory.as_deref(), Some("repoA"));
        assert_eq!(event.kind, "session.updated");
        assert!(!event.is_broadcast());
    }

    #[test]
    fn test_broadcast_event() {
        let event = RelayEvent::broadcast("ping", json!({}));
        assert!(event.directory.is_none());
        assert!(event.is_broadcast());
    }

    #[test]
    fn test_broadcast_omits_directory_on_wire() {
        let event = RelayEvent::broadcast("ping", json!({}));
        let json = serde_json::to_string(&event).unwrap();
        assert!(!json.contains("directory"));
    }
}
