//! HTTP contract tests for the relay API
//!
//! Drives the assembled router with in-process requests and checks the
//! response shapes the frontend depends on.

use std::sync::Arc;

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;

use aerorelay::http_server::{HttpServer, HttpServerConfig};
use aerorelay::relay::{Aggregator, Emitter, RecordingEmitter};
use aerorelay::settings::MemorySettingsStore;

fn build_router(aggregator: Arc<Aggregator>) -> Router {
    HttpServer::new(
        HttpServerConfig::default(),
        aggregator,
        Arc::new(MemorySettingsStore::new()),
    )
    .router()
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

fn json_request(method: &str, uri: &str, body: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

#[tokio::test]
async fn health_reports_degraded_without_upstream() {
    let router = build_router(Arc::new(Aggregator::new()));

    let response = router
        .oneshot(Request::get("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["status"], "degraded");
    assert_eq!(body["upstreamConnected"], false);
    assert_eq!(body["clients"], 0);
}

#[tokio::test]
async fn health_reports_healthy_with_upstream() {
    let aggregator = Arc::new(Aggregator::new());
    aggregator.upstream().mark_connected();
    let router = build_router(aggregator);

    let response = router
        .oneshot(Request::get("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    let body = body_json(response).await;
    assert_eq!(body["status"], "healthy");
}

#[tokio::test]
async fn health_turns_healthy_once_events_flow() {
    let aggregator = Arc::new(Aggregator::new());
    let router = build_router(Arc::clone(&aggregator));

    // Pushing an event over HTTP is the feed showing signs of life, so
    // health must flip without any explicit attach step.
    let request = json_request(
        "POST",
        "/events/publish",
        r#"{"kind": "ping", "payload": {}}"#,
    );
    let response = router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = router
        .oneshot(Request::get("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    let body = body_json(response).await;
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["upstreamConnected"], true);
}

#[tokio::test]
async fn subscribe_unknown_client_is_404() {
    let router = build_router(Arc::new(Aggregator::new()));

    let request = json_request(
        "POST",
        "/events/subscribe",
        r#"{"clientId": "nonexistent-id", "directories": ["repoA"]}"#,
    );
    let response = router.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let body = body_json(response).await;
    assert_eq!(body["success"], false);
    assert_eq!(body["error"], "Client not found");
}

#[tokio::test]
async fn subscribe_known_client_succeeds() {
    let aggregator = Arc::new(Aggregator::new());
    let _guard = Aggregator::connect(
        &aggregator,
        "c1",
        Arc::new(RecordingEmitter::new()) as Arc<dyn Emitter>,
        vec![],
    )
    .unwrap();
    let router = build_router(Arc::clone(&aggregator));

    let request = json_request(
        "POST",
        "/events/subscribe",
        r#"{"clientId": "c1", "directories": ["repoA"]}"#,
    );
    let response = router.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await, json!({"success": true}));

    assert_eq!(aggregator.directory_clients("repoA"), vec!["c1".to_string()]);
}

#[tokio::test]
async fn malformed_subscribe_body_is_rejected_before_the_core() {
    let router = build_router(Arc::new(Aggregator::new()));

    let request = json_request("POST", "/events/subscribe", "{not json");
    let response = router.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn publish_routes_through_the_aggregator() {
    let aggregator = Arc::new(Aggregator::new());
    let emitter = Arc::new(RecordingEmitter::new());
    let _guard = Aggregator::connect(
        &aggregator,
        "c1",
        Arc::clone(&emitter) as Arc<dyn Emitter>,
        vec!["repoA".to_string()],
    )
    .unwrap();
    let router = build_router(Arc::clone(&aggregator));

    let request = json_request(
        "POST",
        "/events/publish",
        r#"{"directory": "repoA", "kind": "update", "payload": {"x": 1}}"#,
    );
    let response = router.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["matched"], 1);
    assert_eq!(body["delivered"], 1);
    assert_eq!(emitter.call_count(), 1);
}

#[tokio::test]
async fn status_carries_snapshot_and_derived_counts() {
    let aggregator = Arc::new(Aggregator::new());
    let _guard = Aggregator::connect(
        &aggregator,
        "c1",
        Arc::new(RecordingEmitter::new()) as Arc<dyn Emitter>,
        vec!["repoA".to_string()],
    )
    .unwrap();
    let router = build_router(aggregator);

    let response = router
        .oneshot(Request::get("/events/status").body(Body::empty()).unwrap())
        .await
        .unwrap();
    let body = body_json(response).await;

    assert_eq!(body["connectedClients"], 1);
    assert_eq!(body["clients"], 1);
    assert_eq!(body["activeDirectories"], json!(["repoA"]));
    assert_eq!(body["directories"], 1);
    assert_eq!(body["upstream"]["connected"], false);
}

#[tokio::test]
async fn stream_opens_with_a_connected_event() {
    use futures_util::StreamExt;

    let aggregator = Arc::new(Aggregator::new());
    let router = build_router(Arc::clone(&aggregator));

    let response = router
        .oneshot(
            Request::get("/events/stream?directories=repoA,repoB")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[header::CONTENT_TYPE],
        "text/event-stream"
    );
    assert_eq!(aggregator.client_count(), 1);

    // The synthetic hello is queued at connect time, so the first frame
    // is available immediately.
    let mut body = response.into_body().into_data_stream();
    let first = body.next().await.unwrap().unwrap();
    let frame = String::from_utf8(first.to_vec()).unwrap();
    assert!(frame.starts_with("event: connected\n"));
    assert!(frame.contains("clientId"));
    assert!(frame.contains("repoA"));
    assert!(frame.ends_with("\n\n"));

    // Dropping the body is the client abort; the disposer disconnects.
    drop(body);
    tokio::task::yield_now().await;
    assert_eq!(aggregator.client_count(), 0);
}

#[tokio::test]
async fn settings_get_and_partial_put() {
    let router = build_router(Arc::new(Aggregator::new()));

    let response = router
        .clone()
        .oneshot(Request::get("/api/settings").body(Body::empty()).unwrap())
        .await
        .unwrap();
    let body = body_json(response).await;
    assert_eq!(body["preferences"]["theme"], "system");

    let request = json_request("PUT", "/api/settings", r#"{"theme": "dark"}"#);
    let response = router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["preferences"]["theme"], "dark");

    let request = json_request("PUT", "/api/settings", r#"{"ttsEnabled": "yes"}"#);
    let response = router.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}
