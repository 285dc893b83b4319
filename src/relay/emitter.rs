//! # Client Emitters
//!
//! The per-client push capability held by the aggregator.
//!
//! Each connected client hands the aggregator exactly one [`Emitter`]. The
//! aggregator owns it for the client's lifetime and never shares it. Emitting
//! to a gone client is an error the aggregator logs and swallows; it must
//! never panic and never abort delivery to other clients.

use std::sync::Mutex;

use serde_json::Value;
use tokio::sync::mpsc;

use super::errors::{RelayError, RelayResult};
use super::event::RelayEvent;

/// Push capability for one downstream client
pub trait Emitter: Send + Sync {
    /// Push a named event and payload to this client
    fn emit(&self, kind: &str, payload: &Value) -> RelayResult<()>;
}

/// Sending half of a client's event channel
pub type EventSender = mpsc::UnboundedSender<RelayEvent>;

/// Receiving half of a client's event channel
pub type EventReceiver = mpsc::UnboundedReceiver<RelayEvent>;

/// Emitter backed by an unbounded mpsc channel.
///
/// The send never blocks, so it is safe to invoke from the relay path. A
/// failed send means the receiving transport task is gone.
pub struct ChannelEmitter {
    sender: EventSender,
}

impl ChannelEmitter {
    /// Create an emitter and the receiver its events arrive on
    pub fn channel() -> (Self, EventReceiver) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { sender: tx }, rx)
    }
}

impl Emitter for ChannelEmitter {
    fn emit(&self, kind: &str, payload: &Value) -> RelayResult<()> {
        let event = RelayEvent {
            directory: None,
            kind: kind.to_string(),
            payload: payload.clone(),
        };
        self.sender.send(event).map_err(|_| RelayError::ClientGone)
    }
}

/// Emitter that records every call; used by tests and diagnostics
#[derive(Default)]
pub struct RecordingEmitter {
    calls: Mutex<Vec<(String, Value)>>,
}

impl RecordingEmitter {
    /// Create an empty recorder
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of all (kind, payload) pairs emitted so far
    pub fn calls(&self) -> Vec<(String, Value)> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    /// Number of emit calls received
    pub fn call_count(&self) -> usize {
        self.calls.lock().map(|c| c.len()).unwrap_or(0)
    }
}

impl Emitter for RecordingEmitter {
    fn emit(&self, kind: &str, payload: &Value) -> RelayResult<()> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push((kind.to_string(), payload.clone()));
        }
        Ok(())
    }
}
