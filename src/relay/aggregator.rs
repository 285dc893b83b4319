//! # Event Aggregator
//!
//! Single relay point between the upstream feed and downstream clients.
//!
//! ## Invariant: RL-A1
//! For every client `c` and directory `d`: `d` is in `c`'s directory set
//! if and only if `c`'s id is in `index[d]`. Holds after every mutation.
//!
//! ## Invariant: RL-A2
//! Best-effort, at-most-once delivery to currently connected clients.
//! No buffering, no replay.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, Weak};

use serde::Serialize;

use crate::observability::{Logger, Severity};

use super::emitter::Emitter;
use super::errors::{RelayError, RelayResult};
use super::event::RelayEvent;
use super::sessions::{SessionInfo, SessionTracker};
use super::upstream::{UpstreamHealth, UpstreamStatus};

/// One registered downstream client
struct ClientEntry {
    /// Push capability, owned exclusively by the aggregator
    emitter: Arc<dyn Emitter>,

    /// Directories this client is subscribed to
    directories: HashSet<String>,
}

/// Registry and inverted index, mutated together under one lock (RL-A1)
#[derive(Default)]
struct AggregatorState {
    /// Clients by id
    clients: HashMap<String, ClientEntry>,

    /// Client ids by directory
    index: HashMap<String, HashSet<String>>,
}

/// Read-only snapshot for diagnostics endpoints
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregatorStatus {
    /// Number of connected clients
    pub connected_clients: usize,

    /// Directories with at least one subscriber, sorted
    pub active_directories: Vec<String>,

    /// Upstream feed health
    pub upstream: UpstreamStatus,

    /// Sessions currently live on the upstream feed
    pub active_sessions: Vec<SessionInfo>,
}

/// Result of relaying one event
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RelayOutcome {
    /// Number of clients the event was routed to
    pub matched: usize,
    /// Number of successful emits
    pub delivered: usize,
    /// Number of emits that failed (client gone, transport error)
    pub failed: usize,
}

/// Fan-out aggregator for the downstream event stream.
///
/// Process-wide single instance, constructed at boot by the composition
/// root and shared behind an `Arc`. All state is in memory; a restart
/// loses every client and they reconnect and resubscribe.
pub struct Aggregator {
    state: Mutex<AggregatorState>,
    sessions: SessionTracker,
    upstream: UpstreamHealth,
}

impl Default for Aggregator {
    fn default() -> Self {
        Self::new()
    }
}

impl Aggregator {
    /// Create an empty aggregator
    pub fn new() -> Self {
        Self {
            state: Mutex::new(AggregatorState::default()),
            sessions: SessionTracker::new(),
            upstream: UpstreamHealth::new(),
        }
    }

    /// Upstream feed health bookkeeping
    pub fn upstream(&self) -> &UpstreamHealth {
        &self.upstream
    }

    /// Register a client with its initial directory set.
    ///
    /// An associated function because the disposer must hold a handle back
    /// to the aggregator: `Aggregator::connect(&aggregator, ...)`.
    ///
    /// A duplicate id is a logic error: the registration is rejected so two
    /// emitters can never silently merge under one id. The returned guard
    /// is the disposer; dropping it (or calling [`DisconnectGuard::disconnect`])
    /// performs the same work as [`Aggregator::disconnect`].
    pub fn connect(
        this: &Arc<Self>,
        client_id: impl Into<String>,
        emitter: Arc<dyn Emitter>,
        initial_directories: Vec<String>,
    ) -> RelayResult<DisconnectGuard> {
        let client_id = client_id.into();

        let mut state = this.lock_state();
        if state.clients.contains_key(&client_id) {
            drop(state);
            Logger::log(
                Severity::Warn,
                "relay.connect.duplicate",
                &[("client", client_id.as_str())],
            );
            return Err(RelayError::ClientExists(client_id));
        }

        let directories: HashSet<String> = initial_directories.into_iter().collect();
        for dir in &directories {
            state.index.entry(dir.clone()).or_default().insert(client_id.clone());
        }
        state.clients.insert(
            client_id.clone(),
            ClientEntry {
                emitter,
                directories,
            },
        );
        drop(state);

        Ok(DisconnectGuard {
            aggregator: Arc::downgrade(this),
            client_id,
        })
    }

    /// Add directories to a client's subscription set.
    ///
    /// Returns false when the client id is unknown; no mutation happens in
    /// that case. Directories already subscribed are skipped (idempotent).
    pub fn subscribe(&self, client_id: &str, directories: &[String]) -> bool {
        let mut state = self.lock_state();
        let Some(entry) = state.clients.get_mut(client_id) else {
            return false;
        };

        let added: Vec<String> = directories
            .iter()
            .filter(|d| entry.directories.insert((*d).clone()))
            .cloned()
            .collect();
        for dir in added {
            state.index.entry(dir).or_default().insert(client_id.to_string());
        }
        true
    }

    /// Remove directories from a client's subscription set.
    ///
    /// Same unknown-client contract as [`Aggregator::subscribe`]. Removing
    /// a directory the client never subscribed to is a no-op.
    pub fn unsubscribe(&self, client_id: &str, directories: &[String]) -> bool {
        let mut state = self.lock_state();
        let Some(entry) = state.clients.get_mut(client_id) else {
            return false;
        };

        let removed: Vec<String> = directories
            .iter()
            .filter(|d| entry.directories.remove(*d))
            .cloned()
            .collect();
        for dir in removed {
            remove_from_index(&mut state.index, &dir, client_id);
        }
        true
    }

    /// Remove a client and every index entry it appears in.
    ///
    /// Idempotent: unknown or already-disconnected ids are a safe no-op.
    /// Only the client's own recorded directory set is scanned.
    pub fn disconnect(&self, client_id: &str) {
        let mut state = self.lock_state();
        let Some(entry) = state.clients.remove(client_id) else {
            return;
        };
        for dir in entry.directories {
            remove_from_index(&mut state.index, &dir, client_id);
        }
    }

    /// Relay one upstream event to its interested clients.
    ///
    /// Broadcast events (no directory) go to every connected client; scoped
    /// events go to exactly the subscribers of that directory. Emitters are
    /// invoked on a copied target list after the state lock is released, so
    /// a blocking or reentrant emitter cannot deadlock the aggregator. One
    /// client's emit failure is logged and counted, never propagated (RL-A2).
    pub fn relay(&self, event: &RelayEvent) -> RelayOutcome {
        self.upstream.note_event();
        self.sessions.observe(event);

        let targets: Vec<(String, Arc<dyn Emitter>)> = {
            let state = self.lock_state();
            match &event.directory {
                None => state
                    .clients
                    .iter()
                    .map(|(id, entry)| (id.clone(), Arc::clone(&entry.emitter)))
                    .collect(),
                Some(dir) => state
                    .index
                    .get(dir)
                    .map(|ids| {
                        ids.iter()
                            .filter_map(|id| {
                                state
                                    .clients
                                    .get(id)
                                    .map(|entry| (id.clone(), Arc::clone(&entry.emitter)))
                            })
                            .collect()
                    })
                    .unwrap_or_default(),
            }
        };

        let mut outcome = RelayOutcome {
            matched: targets.len(),
            ..RelayOutcome::default()
        };

        for (client_id, emitter) in targets {
            match emitter.emit(&event.kind, &event.payload) {
                Ok(()) => outcome.delivered += 1,
                Err(err) => {
                    outcome.failed += 1;
                    let error = err.to_string();
                    Logger::log(
                        Severity::Warn,
                        "relay.emit.failed",
                        &[
                            ("client", client_id.as_str()),
                            ("kind", event.kind.as_str()),
                            ("error", error.as_str()),
                        ],
                    );
                }
            }
        }

        outcome
    }

    /// Read-only snapshot for health and diagnostics
    pub fn status(&self) -> AggregatorStatus {
        let (connected_clients, mut active_directories) = {
            let state = self.lock_state();
            let dirs: Vec<String> = state.index.keys().cloned().collect();
            (state.clients.len(), dirs)
        };
        active_directories.sort();

        AggregatorStatus {
            connected_clients,
            active_directories,
            upstream: self.upstream.snapshot(),
            active_sessions: self.sessions.active_sessions(),
        }
    }

    /// Number of connected clients
    pub fn client_count(&self) -> usize {
        self.lock_state().clients.len()
    }

    /// Directory set of one client, sorted; None when the id is unknown
    pub fn client_directories(&self, client_id: &str) -> Option<Vec<String>> {
        let state = self.lock_state();
        state.clients.get(client_id).map(|entry| {
            let mut dirs: Vec<String> = entry.directories.iter().cloned().collect();
            dirs.sort();
            dirs
        })
    }

    /// Subscriber ids of one directory, sorted; empty when none
    pub fn directory_clients(&self, directory: &str) -> Vec<String> {
        let state = self.lock_state();
        let mut ids: Vec<String> = state
            .index
            .get(directory)
            .map(|ids| ids.iter().cloned().collect())
            .unwrap_or_default();
        ids.sort();
        ids
    }

    fn lock_state(&self) -> std::sync::MutexGuard<'_, AggregatorState> {
        // A poisoned lock means a panic mid-mutation; the in-memory state
        // carries no durability so continuing with it is still sound.
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

/// Drop the client id from one directory's index entry, pruning the entry
/// when its subscriber set becomes empty.
fn remove_from_index(index: &mut HashMap<String, HashSet<String>>, dir: &str, client_id: &str) {
    if let Some(ids) = index.get_mut(dir) {
        ids.remove(client_id);
        if ids.is_empty() {
            index.remove(dir);
        }
    }
}

/// Disposer returned by [`Aggregator::connect`].
///
/// The transport registers exactly one of these against its connection
/// abort signal; dropping it disconnects the client. Safe to drop after
/// an explicit disconnect (the underlying operation is idempotent).
pub struct DisconnectGuard {
    aggregator: Weak<Aggregator>,
    client_id: String,
}

impl DisconnectGuard {
    /// Id of the client this guard disconnects
    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    /// Disconnect now instead of at drop time
    pub fn disconnect(self) {
        drop(self);
    }
}

impl Drop for DisconnectGuard {
    fn drop(&mut self) {
        if let Some(aggregator) = self.aggregator.upgrade() {
            aggregator.disconnect(&self.client_id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::relay::emitter::RecordingEmitter;
    use serde_json::json;

    fn recording_client(
        aggregator: &Arc<Aggregator>,
        id: &str,
        dirs: &[&str],
    ) -> (Arc<RecordingEmitter>, DisconnectGuard) {
        let emitter = Arc::new(RecordingEmitter::new());
        let guard = Aggregator::connect(
            aggregator,
            id,
            emitter.clone() as Arc<dyn Emitter>,
            dirs.iter().map(|d| d.to_string()).collect(),
        )
        .unwrap();
        (emitter, guard)
    }

    #[test]
    fn test_connect_rejects_duplicate_id() {
        let aggregator = Arc::new(Aggregator::new());
        let (_e1, _g1) = recording_client(&aggregator, "c1", &[]);

        let emitter = Arc::new(RecordingEmitter::new());
        let result = Aggregator::connect(&aggregator, "c1", emitter as Arc<dyn Emitter>, vec![]);
        assert!(matches!(result, Err(RelayError::ClientExists(_))));
        assert_eq!(aggregator.client_count(), 1);
    }

    #[test]
    fn test_guard_drop_disconnects() {
        let aggregator = Arc::new(Aggregator::new());
        let (_emitter, guard) = recording_client(&aggregator, "c1", &["repoA"]);
        assert_eq!(aggregator.client_count(), 1);

        drop(guard);
        assert_eq!(aggregator.client_count(), 0);
        assert!(aggregator.directory_clients("repoA").is_empty());
    }

    #[test]
    fn test_scoped_relay_hits_only_subscribers() {
        let aggregator = Arc::new(Aggregator::new());
        let (e1, _g1) = recording_client(&aggregator, "c1", &["repoA"]);
        let (e2, _g2) = recording_client(&aggregator, "c2", &["repoB"]);

        let outcome = aggregator.relay(&RelayEvent::scoped("repoA", "update", json!({"x": 1})));
        assert_eq!(outcome.matched, 1);
        assert_eq!(outcome.delivered, 1);
        assert_eq!(e1.call_count(), 1);
        assert_eq!(e2.call_count(), 0);
    }

    #[test]
    fn test_relay_to_absent_directory_is_empty() {
        let aggregator = Arc::new(Aggregator::new());
        let (_e1, _g1) = recording_client(&aggregator, "c1", &["repoA"]);

        let outcome = aggregator.relay(&RelayEvent::scoped("nowhere", "update", json!({})));
        assert_eq!(outcome, RelayOutcome::default());
    }

    #[test]
    fn test_status_snapshot() {
        let aggregator = Arc::new(Aggregator::new());
        let (_e1, _g1) = recording_client(&aggregator, "c1", &["repoA", "repoB"]);
        let (_e2, _g2) = recording_client(&aggregator, "c2", &["repoA"]);

        let status = aggregator.status();
        assert_eq!(status.connected_clients, 2);
        assert_eq!(status.active_directories, vec!["repoA", "repoB"]);
    }
}
