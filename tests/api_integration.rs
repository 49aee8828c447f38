//! HTTP API integration tests
//!
//! Requests go through the full axum router via `tower::ServiceExt::oneshot`,
//! with in-memory collaborators behind the dispatcher.

use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use tower::ServiceExt;

use harkai_notifier::config::{DispatcherConfig, Settings};
use harkai_notifier::directory::{GeofenceRecord, MemoryGeofenceStore, MemoryUserDirectory};
use harkai_notifier::event::IncidentType;
use harkai_notifier::notification::{MessageId, NotificationDispatcher, NotificationMessage};
use harkai_notifier::server::{create_app, AppState};
use harkai_notifier::transport::{MemoryTransport, PushTransport, TransportError};

struct RejectingTransport(fn() -> TransportError);

#[async_trait]
impl PushTransport for RejectingTransport {
    fn name(&self) -> &'static str {
        "rejecting"
    }

    async fn deliver(&self, _message: &NotificationMessage) -> Result<MessageId, TransportError> {
        Err((self.0)())
    }
}

fn app_with(transport: Arc<dyn PushTransport>) -> Router {
    let users = Arc::new(MemoryUserDirectory::new());
    users.register("u1", "tok1");
    let geofences = Arc::new(MemoryGeofenceStore::new());
    geofences.insert("g1", GeofenceRecord::new(IncidentType::Fire, -12.0, -77.0));

    let dispatcher = NotificationDispatcher::new(&DispatcherConfig::default(), users, geofences, transport);
    let state = AppState::with_components(Settings::default(), Arc::new(dispatcher), None);

    create_app(state)
}

fn post_event(body: impl Into<Body>) -> Request<Body> {
    Request::builder()
        .method(Method::POST)
        .uri("/api/v1/events")
        .header(header::CONTENT_TYPE, "application/json")
        .body(body.into())
        .unwrap()
}

async fn send(app: Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}

fn incident_json(id: &str) -> String {
    json!({
        "id": id,
        "kind": "incidentCreated",
        "type": "fire",
        "description": "",
        "latitude": 1.0,
        "longitude": 2.0
    })
    .to_string()
}

#[tokio::test]
async fn test_incident_event_is_sent() {
    let transport = Arc::new(MemoryTransport::new());
    let app = app_with(transport.clone());

    let (status, body) = send(app, post_event(incident_json("evt-1"))).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["event_id"], "evt-1");
    assert_eq!(body["outcome"], "sent");
    assert!(body["message_id"].is_string());
    assert_eq!(transport.delivered_count().await, 1);
}

#[tokio::test]
async fn test_geofence_without_device_is_skipped() {
    let transport = Arc::new(MemoryTransport::new());
    let app = app_with(transport.clone());
    let event = json!({
        "id": "evt-2",
        "kind": "geofenceCrossed",
        "userId": "unknown-user",
        "geofenceId": "g1",
        "crossingKind": "exit"
    });

    let (status, body) = send(app, post_event(event.to_string())).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["outcome"], "skipped");
    assert_eq!(body["reason"], "no-target-device");
    assert_eq!(transport.delivered_count().await, 0);
}

#[tokio::test]
async fn test_geofence_event_is_sent_to_device() {
    let transport = Arc::new(MemoryTransport::new());
    let app = app_with(transport.clone());
    let event = json!({
        "id": "evt-3",
        "kind": "geofenceCrossed",
        "userId": "u1",
        "geofenceId": "g1",
        "crossingKind": "enter",
        "occurredAt": "2026-03-01T12:00:00Z"
    });

    let (status, body) = send(app, post_event(event.to_string())).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["outcome"], "sent");
    let delivered = transport.delivered().await;
    assert_eq!(delivered[0].data["geofenceId"], "g1");
    assert_eq!(delivered[0].data["crossingKind"], "enter");
}

#[tokio::test]
async fn test_malformed_json_is_bad_request() {
    let app = app_with(Arc::new(MemoryTransport::new()));

    let (status, body) = send(app, post_event("{not json")).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn test_missing_required_field_is_bad_request() {
    let app = app_with(Arc::new(MemoryTransport::new()));
    let event = json!({ "id": "evt-4", "kind": "geofenceCrossed", "userId": "u1" });

    let (status, _) = send(app, post_event(event.to_string())).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_missing_crossing_kind_is_bad_request() {
    let transport = Arc::new(MemoryTransport::new());
    let app = app_with(transport.clone());
    let event = json!({ "id": "evt-4b", "kind": "geofenceCrossed", "userId": "u1", "geofenceId": "g1" });

    let (status, body) = send(app, post_event(event.to_string())).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
    assert_eq!(transport.delivered_count().await, 0);
}

#[tokio::test]
async fn test_oversized_body_is_payload_too_large() {
    let app = app_with(Arc::new(MemoryTransport::new()));
    let event = json!({
        "id": "evt-big",
        "kind": "incidentCreated",
        "type": "fire",
        "description": "x".repeat(70 * 1024),
        "latitude": 1.0,
        "longitude": 2.0
    });

    let (status, body) = send(app, post_event(event.to_string())).await;

    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(body["error"]["code"], "REQUEST_REJECTED");
}

#[tokio::test]
async fn test_wrong_content_type_is_unsupported_media_type() {
    let app = app_with(Arc::new(MemoryTransport::new()));
    let request = Request::builder()
        .method(Method::POST)
        .uri("/api/v1/events")
        .header(header::CONTENT_TYPE, "text/plain")
        .body(Body::from(incident_json("evt-text")))
        .unwrap();

    let (status, _) = send(app, request).await;

    assert_eq!(status, StatusCode::UNSUPPORTED_MEDIA_TYPE);
}

#[tokio::test]
async fn test_empty_event_id_is_bad_request() {
    let transport = Arc::new(MemoryTransport::new());
    let app = app_with(transport.clone());

    let (status, body) = send(app, post_event(incident_json(""))).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
    assert_eq!(transport.delivered_count().await, 0);
}

#[tokio::test]
async fn test_transient_failure_is_service_unavailable() {
    let app = app_with(Arc::new(RejectingTransport(|| {
        TransportError::Transient("HTTP 503: backend unavailable".into())
    })));

    let (status, body) = send(app, post_event(incident_json("evt-5"))).await;

    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["outcome"], "failed");
    assert_eq!(body["retryable"], true);
    assert_eq!(body["permanent"], false);
    assert_eq!(body["code"], "transport_error");
}

#[tokio::test]
async fn test_permanent_failure_is_unprocessable() {
    let app = app_with(Arc::new(RejectingTransport(|| {
        TransportError::Permanent("UNREGISTERED".into())
    })));
    let event = json!({
        "id": "evt-6",
        "kind": "geofenceCrossed",
        "userId": "u1",
        "geofenceId": "g1",
        "crossingKind": "enter"
    });

    let (status, body) = send(app, post_event(event.to_string())).await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["permanent"], true);
    assert_eq!(body["retryable"], false);
}

#[tokio::test]
async fn test_health_reports_components() {
    let app = app_with(Arc::new(MemoryTransport::new()));
    let request = Request::builder().uri("/health").body(Body::empty()).unwrap();

    let (status, body) = send(app, request).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["transport"], "memory");
    assert_eq!(body["directory"], "memory");
    assert!(body.get("redis").is_none());
}

#[tokio::test]
async fn test_stats_reflect_handled_events() {
    let app = app_with(Arc::new(MemoryTransport::new()));

    let (status, _) = send(app.clone(), post_event(incident_json("evt-7"))).await;
    assert_eq!(status, StatusCode::OK);

    let request = Request::builder().uri("/stats").body(Body::empty()).unwrap();
    let (status, body) = send(app, request).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["dispatcher"]["events_received"], 1);
    assert_eq!(body["dispatcher"]["sent"], 1);
    assert_eq!(body["dispatcher"]["incidents"], 1);
}

#[tokio::test]
async fn test_metrics_endpoint() {
    let app = app_with(Arc::new(MemoryTransport::new()));
    send(app.clone(), post_event(incident_json("evt-8"))).await;

    let request = Request::builder().uri("/metrics").body(Body::empty()).unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let text = String::from_utf8(bytes.to_vec()).unwrap();
    assert!(text.contains("harkai_events_received_total"));
    assert!(text.contains("harkai_outcomes_total"));
}
