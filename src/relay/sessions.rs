//! # Active Session Tracking
//!
//! Bookkeeping of agent sessions observed on the relayed event feed.
//!
//! Sessions are upstream-side state: they exist whether or not any client is
//! currently streaming, and they are rebuilt from the live feed after a
//! restart. The tracker is fed every relayed event and keeps the set of
//! sessions it has seen created/updated but not yet deleted.

use std::collections::HashMap;
use std::sync::RwLock;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::event::RelayEvent;

/// Event kinds that register a session
const SESSION_UPSERT_KINDS: &[&str] = &["session.created", "session.updated"];

/// Event kind that clears a session
const SESSION_DELETE_KIND: &str = "session.deleted";

/// One active session on the upstream feed
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionInfo {
    /// Session id as reported by the upstream payload
    pub session_id: String,

    /// Directory the session belongs to
    pub directory: String,

    /// Last time an event for this session was observed
    pub last_activity: DateTime<Utc>,
}

/// Tracker of sessions currently live on the upstream feed
#[derive(Debug, Default)]
pub struct SessionTracker {
    sessions: RwLock<HashMap<String, SessionInfo>>,
}

impl SessionTracker {
    /// Create an empty tracker
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one relayed event through the tracker
    pub fn observe(&self, event: &RelayEvent) {
        let Some(directory) = event.directory.as_deref() else {
            return;
        };
        let Some(session_id) = extract_session_id(&event.payload) else {
            return;
        };

        if SESSION_UPSERT_KINDS.contains(&event.kind.as_str()) {
            if let Ok(mut sessions) = self.sessions.write() {
                sessions.insert(
                    session_id.to_string(),
                    SessionInfo {
                        session_id: session_id.to_string(),
                        directory: directory.to_string(),
                        last_activity: Utc::now(),
                    },
                );
            }
        } else if event.kind == SESSION_DELETE_KIND {
            if let Ok(mut sessions) = self.sessions.write() {
                sessions.remove(session_id);
            }
        }
    }

    /// Snapshot of all active sessions, sorted by session id
    pub fn active_sessions(&self) -> Vec<SessionInfo> {
        let mut sessions: Vec<SessionInfo> = self
            .sessions
            .read()
            .map(|s| s.values().cloned().collect())
            .unwrap_or_default();
        sessions.sort_by(|a, b| a.session_id.cmp(&b.session_id));
        sessions
    }

    /// Number of active sessions
    pub fn len(&self) -> usize {
        self.sessions.read().map(|s| s.len()).unwrap_or(0)
    }

    /// Check if no sessions are active
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Pull the session id out of an upstream payload.
///
/// The upstream feed carries the id either at the top level (`sessionId`) or
/// nested under `info.id` depending on the event kind.
fn extract_session_id(payload: &Value) -> Option<&str> {
    payload
        .get("sessionId")
        .and_then(|v| v.as_str())
        .or_else(|| {
            payload
                .get("info")
                .and_then(|info| info.get("id"))
                .and_then(|v| v.as_str())
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_session_created_and_deleted() {
        let tracker = SessionTracker::new();

        let created = RelayEvent::scoped("repoA", "session.created", json!({"sessionId": "s1"}));
        tracker.observe(&created);
        assert_eq!(tracker.len(), 1);
        assert_eq!(tracker.active_sessions()[0].directory, "repoA");

        let deleted = RelayEvent::scoped("repoA", "session.deleted", json!({"sessionId": "s1"}));
        tracker.observe(&deleted);
        assert!(tracker.is_empty());
    }

    #[test]
    fn test_session_update_is_upsert() {
        let tracker = SessionTracker::new();

        let updated = RelayEvent::scoped("repoA", "session.updated", json!({"info": {"id": "s1"}}));
        tracker.observe(&updated);
        tracker.observe(&updated);

        assert_eq!(tracker.len(), 1);
    }

    #[test]
    fn test_unrelated_events_are_ignored() {
        let tracker = SessionTracker::new();

        tracker.observe(&RelayEvent::scoped("repoA", "log.line", json!({"text": "hi"})));
        tracker.observe(&RelayEvent::broadcast("ping", json!({})));
        // Session event without an id in the payload
        tracker.observe(&RelayEvent::scoped("repoA", "session.updated", json!({})));

        assert!(tracker.is_empty());
    }
}
