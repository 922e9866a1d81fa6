//! DeliveryService: retried, signed webhook fan-out plus the tenant-aware
//! WebhookManager registry.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use chrono::Utc;
use futures::future::join_all;
use serde::Serialize;
use serde_json::{json, Map, Value};
use tracing::{debug, info, warn};
use uuid::Uuid;

use maintpilot_core::config::DeliveryConfig;

use crate::endpoint::{DeliveryRecord, DeliveryStatus, WebhookEndpoint, WebhookEvent};
use crate::signature;

/// Outcome of one endpoint's delivery attempt sequence, as returned to the
/// `trigger` caller.
#[derive(Debug, Clone, Serialize)]
pub struct DeliveryResult {
    pub status: DeliveryStatus,
    pub delivery_id: String,
    pub endpoint_id: String,
    pub attempts: u32,
    pub response_code: Option<u16>,
}

/// Reliable outbound webhook delivery.
///
/// Endpoints are an in-memory registry; nothing here is persisted. Failed
/// deliveries end as recorded terminal outcomes, never as errors returned
/// to the caller.
pub struct DeliveryService {
    endpoints: RwLock<Vec<WebhookEndpoint>>,
    deliveries: RwLock<Vec<DeliveryRecord>>,
    client: Option<reqwest::Client>,
    config: DeliveryConfig,
}

impl std::fmt::Debug for DeliveryService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeliveryService")
            .field("config", &self.config)
            .field("mocked", &self.client.is_none())
            .finish()
    }
}

impl DeliveryService {
    /// Create a delivering service with a real HTTP client.
    pub fn new(config: DeliveryConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .user_agent(concat!("maintpilot-webhook/", env!("CARGO_PKG_VERSION")))
            .build()
            .ok();
        if client.is_none() {
            warn!("failed to build HTTP client, webhook deliveries will be mocked");
        }
        Self {
            endpoints: RwLock::new(Vec::new()),
            deliveries: RwLock::new(Vec::new()),
            client,
            config,
        }
    }

    /// Create a service that records deliveries as `mocked` without any
    /// network I/O. Used in dry-run mode and tests.
    pub fn mocked(config: DeliveryConfig) -> Self {
        Self {
            endpoints: RwLock::new(Vec::new()),
            deliveries: RwLock::new(Vec::new()),
            client: None,
            config,
        }
    }

    /// Register an endpoint. Re-registering the same id replaces the
    /// previous configuration in place.
    pub fn register(&self, endpoint: WebhookEndpoint) {
        info!(endpoint_id = %endpoint.id, url = %endpoint.url, "registered webhook endpoint");
        let mut endpoints = self.endpoints.write().unwrap();
        if let Some(existing) = endpoints.iter_mut().find(|e| e.id == endpoint.id) {
            *existing = endpoint;
        } else {
            endpoints.push(endpoint);
        }
    }

    /// Remove an endpoint; unknown ids are a no-op.
    pub fn unregister(&self, endpoint_id: &str) {
        let mut endpoints = self.endpoints.write().unwrap();
        let before = endpoints.len();
        endpoints.retain(|e| e.id != endpoint_id);
        if endpoints.len() != before {
            info!(endpoint_id, "unregistered webhook endpoint");
        }
    }

    pub fn endpoint(&self, endpoint_id: &str) -> Option<WebhookEndpoint> {
        self.endpoints
            .read()
            .unwrap()
            .iter()
            .find(|e| e.id == endpoint_id)
            .cloned()
    }

    pub fn endpoint_count(&self) -> usize {
        self.endpoints.read().unwrap().len()
    }

    /// Deliver `payload` to every active endpoint whose filter matches
    /// `event`. Results come back in registration order; endpoint delivery
    /// sequences run concurrently, so one endpoint's backoff never delays
    /// another's.
    pub async fn trigger(
        &self,
        event: WebhookEvent,
        tenant_id: &str,
        payload: Map<String, Value>,
    ) -> Vec<DeliveryResult> {
        self.trigger_raw(event.as_str(), tenant_id, payload).await
    }

    /// Same as [`trigger`](Self::trigger) for callers with a free-form
    /// event type string.
    pub async fn trigger_raw(
        &self,
        event_type: &str,
        tenant_id: &str,
        payload: Map<String, Value>,
    ) -> Vec<DeliveryResult> {
        let full_payload = json!({
            "event": event_type,
            "timestamp": Utc::now().to_rfc3339(),
            "tenant_id": tenant_id,
            "data": payload,
        });

        let matching: Vec<WebhookEndpoint> = self
            .endpoints
            .read()
            .unwrap()
            .iter()
            .filter(|e| e.accepts(event_type))
            .cloned()
            .collect();

        debug!(
            event_type,
            tenant_id,
            endpoints = matching.len(),
            "triggering webhook deliveries"
        );

        join_all(
            matching
                .into_iter()
                .map(|endpoint| self.deliver(endpoint, full_payload.clone())),
        )
        .await
    }

    /// Run one endpoint's full attempt sequence and record the outcome.
    async fn deliver(&self, endpoint: WebhookEndpoint, payload: Value) -> DeliveryResult {
        let event_type = payload
            .get("event")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        let mut record = DeliveryRecord::new(&endpoint.id, &event_type, payload.clone());

        let Some(client) = &self.client else {
            record.status = DeliveryStatus::Mocked;
            return self.finish(record);
        };

        // The signed bytes are exactly the bytes we send.
        let body = signature::canonical_json(&payload);

        let mut request_headers = reqwest::header::HeaderMap::new();
        request_headers.insert(
            reqwest::header::CONTENT_TYPE,
            reqwest::header::HeaderValue::from_static("application/json"),
        );
        insert_header(&mut request_headers, "X-Webhook-Id", &endpoint.id);
        insert_header(&mut request_headers, "X-Event-Type", &event_type);
        if let Some(secret) = &endpoint.secret {
            insert_header(
                &mut request_headers,
                "X-Signature-256",
                &signature::signature_header(&body, secret),
            );
        }
        for (name, value) in &endpoint.headers {
            insert_header(&mut request_headers, name, value);
        }

        for attempt in 1..=endpoint.retry_count.max(1) {
            record.attempts = attempt;

            let response = client
                .post(&endpoint.url)
                .headers(request_headers.clone())
                .body(body.clone())
                .send()
                .await;

            match response {
                Ok(response) => {
                    let code = response.status().as_u16();
                    record.response_code = Some(code);
                    record.response_body = Some(truncate(
                        &response.text().await.unwrap_or_default(),
                        self.config.response_body_limit,
                    ));

                    if (200..300).contains(&code) {
                        record.status = DeliveryStatus::Success;
                        record.delivered_at = Some(Utc::now());
                        break;
                    } else if code >= 500 {
                        warn!(
                            endpoint_id = %endpoint.id,
                            code,
                            attempt,
                            "webhook returned server error, retrying"
                        );
                        if attempt < endpoint.retry_count {
                            self.backoff(&endpoint, attempt).await;
                        }
                    } else {
                        // Client errors are not retried: the payload or the
                        // endpoint configuration is presumed broken.
                        record.status = DeliveryStatus::Failed;
                        break;
                    }
                }
                Err(e) => {
                    warn!(endpoint_id = %endpoint.id, attempt, error = %e, "webhook delivery failed");
                    record.response_body = Some(truncate(
                        &e.to_string(),
                        self.config.response_body_limit,
                    ));
                    if attempt < endpoint.retry_count {
                        self.backoff(&endpoint, attempt).await;
                    }
                }
            }
        }

        if record.status == DeliveryStatus::Pending {
            record.status = DeliveryStatus::Failed;
        }
        self.finish(record)
    }

    async fn backoff(&self, endpoint: &WebhookEndpoint, attempt: u32) {
        let delay = Duration::from_secs(endpoint.retry_delay_secs * u64::from(attempt));
        tokio::time::sleep(delay).await;
    }

    fn finish(&self, record: DeliveryRecord) -> DeliveryResult {
        let result = DeliveryResult {
            status: record.status,
            delivery_id: record.id.clone(),
            endpoint_id: record.endpoint_id.clone(),
            attempts: record.attempts,
            response_code: record.response_code,
        };
        info!(
            delivery_id = %record.id,
            endpoint_id = %record.endpoint_id,
            status = %record.status,
            attempts = record.attempts,
            "webhook delivery finished"
        );
        self.deliveries.write().unwrap().push(record);
        result
    }

    /// Query the delivery audit log, most recent last.
    pub fn get_deliveries(
        &self,
        endpoint_id: Option<&str>,
        status: Option<DeliveryStatus>,
        limit: usize,
    ) -> Vec<DeliveryRecord> {
        let deliveries = self.deliveries.read().unwrap();
        let filtered: Vec<DeliveryRecord> = deliveries
            .iter()
            .filter(|d| endpoint_id.map_or(true, |id| d.endpoint_id == id))
            .filter(|d| status.map_or(true, |s| d.status == s))
            .cloned()
            .collect();
        let skip = filtered.len().saturating_sub(limit);
        filtered.into_iter().skip(skip).collect()
    }
}

fn insert_header(headers: &mut reqwest::header::HeaderMap, name: &str, value: &str) {
    let Ok(name) = reqwest::header::HeaderName::from_bytes(name.as_bytes()) else {
        warn!(header = name, "dropping invalid header name");
        return;
    };
    match reqwest::header::HeaderValue::from_str(value) {
        Ok(value) => {
            headers.insert(name, value);
        }
        Err(_) => warn!(header = %name, "dropping invalid header value"),
    }
}

fn truncate(s: &str, limit: usize) -> String {
    if s.len() <= limit {
        return s.to_string();
    }
    // Respect char boundaries when cutting.
    let mut end = limit;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    s[..end].to_string()
}

/// Tenant-scoped view over the endpoint registry.
///
/// DeliveryService itself is tenant-agnostic; this keeps track of which
/// tenant owns which endpoint ids so the API layer can list and remove
/// them safely.
#[derive(Debug)]
pub struct WebhookManager {
    service: Arc<DeliveryService>,
    tenant_endpoints: RwLock<HashMap<String, Vec<String>>>,
}

impl WebhookManager {
    pub fn new(service: Arc<DeliveryService>) -> Self {
        Self {
            service,
            tenant_endpoints: RwLock::new(HashMap::new()),
        }
    }

    /// Register an endpoint for a tenant, generating its id.
    pub fn add_webhook(
        &self,
        tenant_id: &str,
        url: impl Into<String>,
        secret: Option<String>,
        events: Vec<String>,
    ) -> WebhookEndpoint {
        let mut endpoint =
            WebhookEndpoint::new(format!("wh_{}_{}", tenant_id, Uuid::new_v4()), url)
                .with_events(events);
        endpoint.secret = secret;

        self.service.register(endpoint.clone());
        self.tenant_endpoints
            .write()
            .unwrap()
            .entry(tenant_id.to_string())
            .or_default()
            .push(endpoint.id.clone());
        endpoint
    }

    /// Remove a tenant's endpoint. Ignores ids the tenant does not own.
    pub fn remove_webhook(&self, tenant_id: &str, endpoint_id: &str) {
        let mut tenants = self.tenant_endpoints.write().unwrap();
        if let Some(ids) = tenants.get_mut(tenant_id) {
            if let Some(pos) = ids.iter().position(|id| id == endpoint_id) {
                ids.remove(pos);
                self.service.unregister(endpoint_id);
            }
        }
    }

    pub fn list_for_tenant(&self, tenant_id: &str) -> Vec<WebhookEndpoint> {
        let tenants = self.tenant_endpoints.read().unwrap();
        tenants
            .get(tenant_id)
            .map(|ids| {
                ids.iter()
                    .filter_map(|id| self.service.endpoint(id))
                    .collect()
            })
            .unwrap_or_default()
    }
}
