//! Observability subsystem for AeroRelay
//!
//! Structured JSON logging for the relay server.
//!
//! # Principles
//!
//! 1. Observability is read-only
//! 2. No side effects on relay execution
//! 3. No async or background threads
//! 4. One log line = one event
//!
//! Logging failure must never crash the relay; all write errors are
//! swallowed at the logger boundary.

pub mod logger;

pub use logger::{Logger, Severity};
