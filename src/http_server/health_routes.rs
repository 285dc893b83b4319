//! Health HTTP Routes
//!
//! Overall service health derived from the upstream feed state.

use std::sync::Arc;

use axum::{extract::State, response::IntoResponse, routing::get, Json, Router};
use chrono::Utc;
use serde::Serialize;

use crate::relay::Aggregator;

/// Health check response
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    /// "healthy" when the upstream feed is attached, "degraded" otherwise
    pub status: String,
    pub version: String,
    pub timestamp: String,
    pub upstream_connected: bool,
    pub clients: usize,
}

/// Create health routes
pub fn health_routes(aggregator: Arc<Aggregator>) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .with_state(aggregator)
}

/// Health check handler.
///
/// A detached upstream degrades the service but does not fail it: clients
/// can still connect and will receive events once the feed reattaches.
async fn health_handler(State(aggregator): State<Arc<Aggregator>>) -> impl IntoResponse {
    let status = aggregator.status();
    let healthy = status.upstream.connected;

    Json(HealthResponse {
        status: if healthy { "healthy" } else { "degraded" }.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: Utc::now().to_rfc3339(),
        upstream_connected: status.upstream.connected,
        clients: status.connected_clients,
    })
}
