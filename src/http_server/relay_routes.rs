//! Relay HTTP Routes and SSE Handler
//!
//! Endpoints for the long-lived event stream, subscription management,
//! event publication and aggregator status.

use std::convert::Infallible;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Response,
    },
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use futures_util::Stream;
use rand::{distributions::Alphanumeric, Rng};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio_stream::wrappers::UnboundedReceiverStream;

use crate::observability::{Logger, Severity};
use crate::relay::{
    Aggregator, ChannelEmitter, DisconnectGuard, Emitter, RelayEvent, RelayOutcome,
};

// ==================
// Shared State
// ==================

/// Relay state shared across handlers
pub struct RelayState {
    pub aggregator: Arc<Aggregator>,
    pub keep_alive: Duration,
}

// ==================
// Request/Response Types
// ==================

#[derive(Debug, Deserialize)]
pub struct StreamParams {
    /// Comma-separated initial directory list
    #[serde(default)]
    pub directories: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscribeRequest {
    pub client_id: String,
    pub directories: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct SubscribeResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SubscribeResponse {
    fn ok() -> Self {
        Self {
            success: true,
            error: None,
        }
    }

    fn not_found() -> Self {
        Self {
            success: false,
            error: Some("Client not found".to_string()),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct PublishRequest {
    #[serde(default)]
    pub directory: Option<String>,
    pub kind: String,
    pub payload: Value,
}

// ==================
// Relay Routes
// ==================

/// Create relay routes with the SSE stream endpoint
pub fn relay_routes(aggregator: Arc<Aggregator>, keep_alive: Duration) -> Router {
    let state = Arc::new(RelayState {
        aggregator,
        keep_alive,
    });

    Router::new()
        .route("/stream", get(stream_handler))
        .route("/subscribe", post(subscribe_handler))
        .route("/unsubscribe", post(unsubscribe_handler))
        .route("/publish", post(publish_handler))
        .route("/status", get(status_handler))
        .with_state(state)
}

// ==================
// SSE Stream
// ==================

/// Event stream owned by one client connection.
///
/// Holds the disconnect guard so a client abort (the response body being
/// dropped) removes the client from the aggregator. This is the only way
/// the stream ends from the server side short of process shutdown.
struct ClientEventStream {
    events: UnboundedReceiverStream<RelayEvent>,
    _guard: DisconnectGuard,
}

impl Stream for ClientEventStream {
    type Item = Result<Event, Infallible>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        match Pin::new(&mut this.events).poll_next(cx) {
            Poll::Ready(Some(event)) => Poll::Ready(Some(Ok(Event::default()
                .event(event.kind)
                .data(event.payload.to_string())))),
            Poll::Ready(None) => Poll::Ready(None),
            Poll::Pending => Poll::Pending,
        }
    }
}

/// Open a long-lived event stream.
///
/// Registers the client with the directories from the query string, sends a
/// synthetic `connected` event carrying the client id and current status,
/// then forwards relayed events until the connection aborts.
async fn stream_handler(
    State(state): State<Arc<RelayState>>,
    Query(params): Query<StreamParams>,
) -> Response {
    let directories = parse_directories(params.directories.as_deref());
    let client_id = generate_client_id();

    let (emitter, rx) = ChannelEmitter::channel();
    let emitter = Arc::new(emitter);

    let guard = match Aggregator::connect(
        &state.aggregator,
        client_id.clone(),
        Arc::clone(&emitter) as Arc<dyn Emitter>,
        directories.clone(),
    ) {
        Ok(guard) => guard,
        Err(err) => {
            // Generated ids make this unreachable in practice
            let error = err.to_string();
            Logger::log(
                Severity::Error,
                "http.stream.connect_failed",
                &[("client", client_id.as_str()), ("error", error.as_str())],
            );
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({"error": err.to_string()})),
            )
                .into_response();
        }
    };

    let mut hello = serde_json::to_value(state.aggregator.status())
        .unwrap_or_else(|_| json!({}));
    if let Some(obj) = hello.as_object_mut() {
        obj.insert("clientId".to_string(), json!(client_id));
        obj.insert("directories".to_string(), json!(directories));
    }
    if let Err(err) = emitter.emit("connected", &hello) {
        let error = err.to_string();
        Logger::log(
            Severity::Error,
            "http.stream.hello_failed",
            &[("client", client_id.as_str()), ("error", error.as_str())],
        );
    }

    let joined = directories.join(",");
    Logger::log(
        Severity::Info,
        "http.stream.opened",
        &[
            ("client", client_id.as_str()),
            ("directories", joined.as_str()),
        ],
    );

    let stream = ClientEventStream {
        events: UnboundedReceiverStream::new(rx),
        _guard: guard,
    };

    Sse::new(stream)
        .keep_alive(
            KeepAlive::new()
                .interval(state.keep_alive)
                .text("ping"),
        )
        .into_response()
}

/// Parse the comma-separated directories query parameter
fn parse_directories(raw: Option<&str>) -> Vec<String> {
    raw.map(|s| {
        s.split(',')
            .map(str::trim)
            .filter(|d| !d.is_empty())
            .map(str::to_string)
            .collect()
    })
    .unwrap_or_default()
}

/// Generate a fresh client id: timestamp plus random suffix
fn generate_client_id() -> String {
    let suffix: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(10)
        .map(char::from)
        .collect();
    format!("client_{}_{}", Utc::now().timestamp_millis(), suffix)
}

// ==================
// HTTP Handlers
// ==================

/// Add directories to an existing client
async fn subscribe_handler(
    State(state): State<Arc<RelayState>>,
    Json(request): Json<SubscribeRequest>,
) -> Response {
    if state
        .aggregator
        .subscribe(&request.client_id, &request.directories)
    {
        Json(SubscribeResponse::ok()).into_response()
    } else {
        (StatusCode::NOT_FOUND, Json(SubscribeResponse::not_found())).into_response()
    }
}

/// Remove directories from an existing client
async fn unsubscribe_handler(
    State(state): State<Arc<RelayState>>,
    Json(request): Json<SubscribeRequest>,
) -> Response {
    if state
        .aggregator
        .unsubscribe(&request.client_id, &request.directories)
    {
        Json(SubscribeResponse::ok()).into_response()
    } else {
        (StatusCode::NOT_FOUND, Json(SubscribeResponse::not_found())).into_response()
    }
}

/// Push one event into the aggregator
async fn publish_handler(
    State(state): State<Arc<RelayState>>,
    Json(request): Json<PublishRequest>,
) -> Json<RelayOutcome> {
    let event = RelayEvent {
        directory: request.directory,
        kind: request.kind,
        payload: request.payload,
    };
    Json(state.aggregator.relay(&event))
}

/// Aggregator status snapshot
async fn status_handler(State(state): State<Arc<RelayState>>) -> Json<Value> {
    let status = state.aggregator.status();
    let clients = status.connected_clients;
    let mut body = serde_json::to_value(&status).unwrap_or_else(|_| json!({}));
    if let Some(obj) = body.as_object_mut() {
        // Derived counts kept alongside the raw snapshot
        obj.insert("clients".to_string(), json!(clients));
        obj.insert(
            "directories".to_string(),
            json!(status.active_directories.len()),
        );
    }
    Json(body)
}
