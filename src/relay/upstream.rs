//! # Upstream Feed Bookkeeping
//!
//! Health state for the upstream event source and the push-style bridge
//! that pumps its events into the aggregator.
//!
//! The aggregator never polls: the source (or the pump task fronting it)
//! calls [`Aggregator::relay`] and events reach clients in the order those
//! calls are made.

use std::sync::{Arc, RwLock};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::task::JoinHandle;

use crate::observability::{Logger, Severity};

use super::aggregator::Aggregator;
use super::emitter::EventReceiver;

/// Health snapshot of the upstream feed
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpstreamStatus {
    /// Whether the feed is currently attached
    pub connected: bool,

    /// When the last event was relayed
    pub last_event_at: Option<DateTime<Utc>>,
}

/// Mutable upstream health state, owned by the aggregator
#[derive(Debug, Default)]
pub struct UpstreamHealth {
    status: RwLock<UpstreamStatus>,
}

impl UpstreamHealth {
    /// Create in the disconnected state
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark the feed attached
    pub fn mark_connected(&self) {
        if let Ok(mut status) = self.status.write() {
            status.connected = true;
        }
        Logger::log(Severity::Info, "relay.upstream.connected", &[]);
    }

    /// Mark the feed detached
    pub fn mark_disconnected(&self) {
        if let Ok(mut status) = self.status.write() {
            status.connected = false;
        }
        Logger::log(Severity::Warn, "relay.upstream.disconnected", &[]);
    }

    /// Record that an event was just relayed.
    ///
    /// An arriving event is proof the feed is live, so this also marks it
    /// connected. Sources that push over HTTP instead of the pump channel
    /// get health tracking without an explicit attach call.
    pub fn note_event(&self) {
        if let Ok(mut status) = self.status.write() {
            status.connected = true;
            status.last_event_at = Some(Utc::now());
        }
    }

    /// Current snapshot
    pub fn snapshot(&self) -> UpstreamStatus {
        self.status.read().map(|s| s.clone()).unwrap_or_default()
    }
}

/// Bridge a channel of upstream events into the aggregator.
///
/// Marks the feed connected while the channel is open and disconnected once
/// the sending side is dropped. Events are relayed in receive order, which
/// gives each client in-order delivery for the events targeting it.
pub fn spawn_pump(aggregator: Arc<Aggregator>, mut events: EventReceiver) -> JoinHandle<()> {
    tokio::spawn(async move {
        aggregator.upstream().mark_connected();
        while let Some(event) = events.recv().await {
            aggregator.relay(&event);
        }
        aggregator.upstream().mark_disconnected();
    })
}
