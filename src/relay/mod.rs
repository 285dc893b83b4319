//! # AeroRelay Relay Module
//!
//! Server-Sent Events aggregation and fan-out.
//!
//! One upstream feed of directory-tagged events is multiplexed to many
//! downstream clients, each with its own subscription set, without
//! per-client upstream connections and without drops or duplicates on the
//! fan-out path.
//!
//! ## Architecture
//!
//! - **Aggregator**: client registry + inverted directory index, one lock
//! - **Emitters**: per-client push capabilities
//! - **Sessions**: active-session bookkeeping from the observed feed
//! - **Upstream**: feed health and the push-style relay bridge

pub mod aggregator;
pub mod emitter;
pub mod errors;
pub mod event;
pub mod sessions;
pub mod upstream;

pub use aggregator::{Aggregator, AggregatorStatus, DisconnectGuard, RelayOutcome};
pub use emitter::{ChannelEmitter, Emitter, EventReceiver, EventSender, RecordingEmitter};
pub use errors::{RelayError, RelayResult};
pub use event::RelayEvent;
pub use sessions::{SessionInfo, SessionTracker};
pub use upstream::{spawn_pump, UpstreamHealth, UpstreamStatus};
