//! Integration tests for webhook delivery against a local HTTP server.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::routing::post;
use axum::Router;
use serde_json::{json, Map, Value};

use maintpilot_core::config::DeliveryConfig;
use maintpilot_delivery::{
    verify_signature, DeliveryService, DeliveryStatus, WebhookEndpoint, WebhookEvent,
};

#[derive(Clone)]
struct HookState {
    attempts: Arc<AtomicUsize>,
    status: StatusCode,
    last_headers: Arc<Mutex<Option<HeaderMap>>>,
    last_body: Arc<Mutex<Option<Vec<u8>>>>,
}

async fn hook(State(state): State<HookState>, headers: HeaderMap, body: axum::body::Bytes) -> StatusCode {
    state.attempts.fetch_add(1, Ordering::SeqCst);
    *state.last_headers.lock().unwrap() = Some(headers);
    *state.last_body.lock().unwrap() = Some(body.to_vec());
    state.status
}

async fn spawn_server(status: StatusCode) -> (SocketAddr, HookState) {
    let state = HookState {
        attempts: Arc::new(AtomicUsize::new(0)),
        status,
        last_headers: Arc::new(Mutex::new(None)),
        last_body: Arc::new(Mutex::new(None)),
    };
    let app = Router::new()
        .route("/hook", post(hook))
        .with_state(state.clone());
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (addr, state)
}

fn fast_endpoint(id: &str, addr: SocketAddr) -> WebhookEndpoint {
    // zero backoff keeps the retry tests quick
    WebhookEndpoint::new(id, format!("http://{addr}/hook")).with_retries(3, 0)
}

fn payload() -> Map<String, Value> {
    let mut map = Map::new();
    map.insert("asset_id".to_string(), json!("pump-7"));
    map.insert("score".to_string(), json!(0.91));
    map
}

#[tokio::test]
async fn delivers_successfully_on_2xx() {
    let (addr, state) = spawn_server(StatusCode::OK).await;
    let service = DeliveryService::new(DeliveryConfig::default());
    service.register(fast_endpoint("ok", addr));

    let results = service
        .trigger(WebhookEvent::AnomalyDetected, "tenant-1", payload())
        .await;

    assert_eq!(results.len(), 1);
    assert_eq!(results[0].status, DeliveryStatus::Success);
    assert_eq!(results[0].attempts, 1);
    assert_eq!(state.attempts.load(Ordering::SeqCst), 1);

    let record = &service.get_deliveries(Some("ok"), None, 10)[0];
    assert_eq!(record.response_code, Some(200));
    assert!(record.delivered_at.is_some());
}

#[tokio::test]
async fn server_errors_are_retried_to_the_bound() {
    let (addr, state) = spawn_server(StatusCode::SERVICE_UNAVAILABLE).await;
    let service = DeliveryService::new(DeliveryConfig::default());
    service.register(fast_endpoint("flaky", addr));

    let results = service
        .trigger(WebhookEvent::AlertCreated, "tenant-1", payload())
        .await;

    assert_eq!(results[0].status, DeliveryStatus::Failed);
    assert_eq!(results[0].attempts, 3);
    assert_eq!(state.attempts.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn client_errors_are_not_retried() {
    let (addr, state) = spawn_server(StatusCode::BAD_REQUEST).await;
    let service = DeliveryService::new(DeliveryConfig::default());
    service.register(fast_endpoint("broken", addr));

    let results = service
        .trigger(WebhookEvent::AlertCreated, "tenant-1", payload())
        .await;

    assert_eq!(results[0].status, DeliveryStatus::Failed);
    assert_eq!(results[0].attempts, 1);
    assert_eq!(state.attempts.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn unreachable_endpoint_exhausts_retries() {
    // nothing listens on this port
    let service = DeliveryService::new(DeliveryConfig::default());
    service.register(
        WebhookEndpoint::new("dead", "http://127.0.0.1:1/hook").with_retries(2, 0),
    );

    let results = service
        .trigger(WebhookEvent::AssetCritical, "tenant-1", payload())
        .await;

    assert_eq!(results[0].status, DeliveryStatus::Failed);
    assert_eq!(results[0].attempts, 2);
    let record = &service.get_deliveries(Some("dead"), None, 10)[0];
    assert!(record.response_code.is_none());
    assert!(record.response_body.is_some());
}

#[tokio::test]
async fn signed_delivery_verifies_against_received_body() {
    let (addr, state) = spawn_server(StatusCode::OK).await;
    let service = DeliveryService::new(DeliveryConfig::default());
    service.register(fast_endpoint("signed", addr).with_secret("topsecret"));

    service
        .trigger(WebhookEvent::IncidentCreated, "tenant-1", payload())
        .await;

    let headers = state.last_headers.lock().unwrap().clone().unwrap();
    let body = state.last_body.lock().unwrap().clone().unwrap();

    assert_eq!(headers.get("x-webhook-id").unwrap(), "signed");
    assert_eq!(headers.get("x-event-type").unwrap(), "incident.created");

    let signature = headers
        .get("x-signature-256")
        .unwrap()
        .to_str()
        .unwrap()
        .to_string();
    assert!(signature.starts_with("sha256="));
    assert!(verify_signature(&body, &signature, "topsecret"));
    assert!(!verify_signature(&body, &signature, "wrong"));

    // wire contract: envelope fields around the caller's payload
    let envelope: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(envelope["event"], "incident.created");
    assert_eq!(envelope["tenant_id"], "tenant-1");
    assert_eq!(envelope["data"]["asset_id"], "pump-7");
    assert!(envelope["timestamp"].is_string());
}

#[tokio::test]
async fn unsigned_delivery_has_no_signature_header() {
    let (addr, state) = spawn_server(StatusCode::OK).await;
    let service = DeliveryService::new(DeliveryConfig::default());
    service.register(fast_endpoint("unsigned", addr));

    service
        .trigger(WebhookEvent::DriftDetected, "tenant-1", payload())
        .await;

    let headers = state.last_headers.lock().unwrap().clone().unwrap();
    assert!(headers.get("x-signature-256").is_none());
}

#[tokio::test]
async fn extra_endpoint_headers_are_sent() {
    let (addr, state) = spawn_server(StatusCode::OK).await;
    let service = DeliveryService::new(DeliveryConfig::default());
    let mut endpoint = fast_endpoint("custom", addr);
    endpoint
        .headers
        .insert("X-Custom-Token".to_string(), "abc123".to_string());
    service.register(endpoint);

    service
        .trigger(WebhookEvent::MaintenanceDue, "tenant-1", payload())
        .await;

    let headers = state.last_headers.lock().unwrap().clone().unwrap();
    assert_eq!(headers.get("x-custom-token").unwrap(), "abc123");
}
