//! # AeroRelay HTTP Server Module
//!
//! Axum-based API server for the relay.
//!
//! # Endpoints
//!
//! - `/health` - Health check
//! - `/events/stream` - Long-lived SSE event stream
//! - `/events/subscribe`, `/events/unsubscribe` - Subscription management
//! - `/events/publish` - Push-style entry point for the upstream source
//! - `/events/status` - Aggregator status snapshot
//! - `/api/settings` - User preferences

pub mod config;
pub mod health_routes;
pub mod relay_routes;
pub mod server;
pub mod settings_routes;

pub use config::HttpServerConfig;
pub use server::HttpServer;
