//! Webhook endpoint configuration and delivery records.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Well-known outbound event names. The wire form is the dotted string
/// (`anomaly.detected`); endpoint filters match on that form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WebhookEvent {
    AnomalyDetected,
    AlertCreated,
    AlertResolved,
    IncidentCreated,
    IncidentUpdated,
    AssetCritical,
    DriftDetected,
    MaintenanceDue,
    ModelTrained,
}

impl WebhookEvent {
    pub fn as_str(&self) -> &'static str {
        match self {
            WebhookEvent::AnomalyDetected => "anomaly.detected",
            WebhookEvent::AlertCreated => "alert.created",
            WebhookEvent::AlertResolved => "alert.resolved",
            WebhookEvent::IncidentCreated => "incident.created",
            WebhookEvent::IncidentUpdated => "incident.updated",
            WebhookEvent::AssetCritical => "asset.critical",
            WebhookEvent::DriftDetected => "drift.detected",
            WebhookEvent::MaintenanceDue => "maintenance.due",
            WebhookEvent::ModelTrained => "model.trained",
        }
    }
}

impl std::fmt::Display for WebhookEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A registered outbound delivery target.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookEndpoint {
    pub id: String,
    pub url: String,
    /// HMAC key; when set, deliveries carry an `X-Signature-256` header.
    pub secret: Option<String>,
    /// Event names this endpoint receives. Empty matches everything.
    #[serde(default)]
    pub event_filter: Vec<String>,
    #[serde(default = "default_true")]
    pub active: bool,
    #[serde(default = "default_retry_count")]
    pub retry_count: u32,
    /// Base backoff in seconds; attempt N sleeps `retry_delay_secs * N`
    /// before the next try.
    #[serde(default = "default_retry_delay")]
    pub retry_delay_secs: u64,
    /// Extra headers sent with every delivery to this endpoint.
    #[serde(default)]
    pub headers: HashMap<String, String>,
}

fn default_true() -> bool {
    true
}

fn default_retry_count() -> u32 {
    3
}

fn default_retry_delay() -> u64 {
    5
}

impl WebhookEndpoint {
    pub fn new(id: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            url: url.into(),
            secret: None,
            event_filter: Vec::new(),
            active: true,
            retry_count: default_retry_count(),
            retry_delay_secs: default_retry_delay(),
            headers: HashMap::new(),
        }
    }

    pub fn with_secret(mut self, secret: impl Into<String>) -> Self {
        self.secret = Some(secret.into());
        self
    }

    pub fn with_events(mut self, events: Vec<String>) -> Self {
        self.event_filter = events;
        self
    }

    pub fn with_retries(mut self, retry_count: u32, retry_delay_secs: u64) -> Self {
        self.retry_count = retry_count;
        self.retry_delay_secs = retry_delay_secs;
        self
    }

    /// Whether this endpoint should receive the given event type.
    pub fn accepts(&self, event_type: &str) -> bool {
        self.active
            && (self.event_filter.is_empty()
                || self.event_filter.iter().any(|e| e == event_type))
    }
}

/// Terminal or in-flight state of one delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryStatus {
    Pending,
    Success,
    Failed,
    /// The service was built without an HTTP client (dry-run mode).
    Mocked,
}

impl DeliveryStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeliveryStatus::Pending => "pending",
            DeliveryStatus::Success => "success",
            DeliveryStatus::Failed => "failed",
            DeliveryStatus::Mocked => "mocked",
        }
    }
}

impl std::fmt::Display for DeliveryStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Audit record of one attempted delivery.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryRecord {
    pub id: String,
    pub endpoint_id: String,
    pub event_type: String,
    pub payload: Value,
    pub status: DeliveryStatus,
    pub attempts: u32,
    pub response_code: Option<u16>,
    /// Truncated response body (or transport error text) of the last
    /// attempt.
    pub response_body: Option<String>,
    pub created_at: DateTime<Utc>,
    pub delivered_at: Option<DateTime<Utc>>,
}

impl DeliveryRecord {
    pub fn new(endpoint_id: &str, event_type: &str, payload: Value) -> Self {
        Self {
            id: format!("del_{}", Uuid::new_v4()),
            endpoint_id: endpoint_id.to_string(),
            event_type: event_type.to_string(),
            payload,
            status: DeliveryStatus::Pending,
            attempts: 0,
            response_code: None,
            response_body: None,
            created_at: Utc::now(),
            delivered_at: None,
        }
    }
}
