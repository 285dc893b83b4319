//! Settings HTTP Routes
//!
//! Key/value preference storage behind the `SettingsStore` interface.

use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::Serialize;
use serde_json::Value;

use crate::settings::{load_settings, update_preferences, SettingsResponse, SettingsStore};

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// Create settings routes
pub fn settings_routes(store: Arc<dyn SettingsStore>) -> Router {
    Router::new()
        .route("/settings", get(get_settings_handler).put(put_settings_handler))
        .with_state(store)
}

/// Read the stored preferences, defaults filled in
async fn get_settings_handler(
    State(store): State<Arc<dyn SettingsStore>>,
) -> Json<SettingsResponse> {
    Json(load_settings(store.as_ref()))
}

/// Apply a partial preferences update
async fn put_settings_handler(
    State(store): State<Arc<dyn SettingsStore>>,
    Json(patch): Json<Value>,
) -> Response {
    match update_preferences(store.as_ref(), &patch) {
        Ok(response) => Json(response).into_response(),
        Err(err) => (
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse {
                error: format!("Invalid preferences: {}", err),
            }),
        )
            .into_response(),
    }
}
