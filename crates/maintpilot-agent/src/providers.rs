//! Collaborator contracts consumed by the copilot.
//!
//! Every provider is optional: the copilot falls back to deterministic
//! templates (LLM), mock receipts (ticketing), or a recorded no-op
//! (notifications) when one is absent. Absence is a normal configured
//! state, not an error.

use async_trait::async_trait;
use serde::Serialize;
use serde_json::{Map, Value};

use maintpilot_core::{Event, Incident, Priority, Result};

/// Generated incident content: produced by an LLM collaborator or by the
/// deterministic fallback templates in [`crate::reasoning`].
#[derive(Debug, Clone, Serialize)]
pub struct IncidentDraft {
    pub title: String,
    pub description: String,
    pub root_cause: String,
    pub actions: Vec<String>,
}

/// Free-text generation collaborator.
///
/// Calls must not mutate agent memory; they run inside the synchronous
/// processing of a single event and suspend only that event's progress.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Generate an incident report for an event, given similar past
    /// incidents as context.
    async fn generate_incident(
        &self,
        event: &Event,
        similar_incidents: &[Incident],
    ) -> Result<IncidentDraft>;

    /// Generate a maintenance recommendation for an event.
    async fn generate_recommendation(&self, event: &Event) -> Result<String>;

    /// Free-form chat with memory-derived context.
    async fn chat(&self, message: &str, context: &Map<String, Value>) -> Result<String>;
}

/// Request passed to the ticketing collaborator.
#[derive(Debug, Clone, Serialize)]
pub struct TicketRequest {
    pub system: String,
    pub title: String,
    pub description: String,
    pub priority: Priority,
    pub project: String,
    pub issue_type: String,
}

/// Receipt returned by the ticketing collaborator.
#[derive(Debug, Clone, Serialize)]
pub struct TicketReceipt {
    pub status: String,
    pub ticket_id: String,
    pub url: Option<String>,
}

impl TicketReceipt {
    /// Receipt with the same shape as real ticketing output, so downstream
    /// consumers cannot tell a dry run apart structurally.
    pub fn mocked() -> Self {
        let suffix = uuid::Uuid::new_v4().simple().to_string();
        let ticket_id = format!(
            "MAINT-{}-{}",
            chrono::Utc::now().format("%Y%m%d%H%M%S"),
            &suffix[..4]
        );
        Self {
            status: "created".to_string(),
            url: Some(format!("https://tickets.example.com/browse/{ticket_id}")),
            ticket_id,
        }
    }
}

#[async_trait]
pub trait TicketProvider: Send + Sync {
    async fn create_ticket(&self, request: TicketRequest) -> Result<TicketReceipt>;
}

/// Outbound notification passed to the notification collaborator.
#[derive(Debug, Clone, Serialize)]
pub struct Notification {
    pub channels: Vec<String>,
    pub message: String,
    pub priority: Priority,
    pub tenant_id: String,
    pub recipients: Vec<String>,
}

#[async_trait]
pub trait NotificationProvider: Send + Sync {
    /// Deliver a notification; the returned map is surfaced verbatim in
    /// the action result.
    async fn send(&self, notification: Notification) -> Result<Map<String, Value>>;
}

/// LLM stand-in that answers with the deterministic templates. Useful for
/// dry runs and local development.
#[derive(Debug, Default)]
pub struct MockLlm;

#[async_trait]
impl LlmProvider for MockLlm {
    async fn generate_incident(
        &self,
        event: &Event,
        _similar_incidents: &[Incident],
    ) -> Result<IncidentDraft> {
        Ok(crate::reasoning::fallback_incident_draft(event))
    }

    async fn generate_recommendation(&self, event: &Event) -> Result<String> {
        Ok(crate::reasoning::fallback_recommendation(event))
    }

    async fn chat(&self, message: &str, context: &Map<String, Value>) -> Result<String> {
        let asset = context
            .get("asset_id")
            .and_then(Value::as_str)
            .unwrap_or("your fleet");
        Ok(format!(
            "I received your question about {asset}: \"{message}\". \
             No language model is configured, so I can only report what is \
             in memory; see the context attached to this conversation."
        ))
    }
}

/// Ticketing stand-in returning `MAINT-<timestamp>` ids.
#[derive(Debug, Default)]
pub struct MockTicketing;

#[async_trait]
impl TicketProvider for MockTicketing {
    async fn create_ticket(&self, request: TicketRequest) -> Result<TicketReceipt> {
        tracing::info!(title = %request.title, system = %request.system, "mock ticket created");
        Ok(TicketReceipt::mocked())
    }
}

/// Notification stand-in that logs instead of sending.
#[derive(Debug, Default)]
pub struct MockNotifier;

#[async_trait]
impl NotificationProvider for MockNotifier {
    async fn send(&self, notification: Notification) -> Result<Map<String, Value>> {
        tracing::info!(
            channels = ?notification.channels,
            priority = %notification.priority,
            "mock notification sent"
        );
        let mut result = Map::new();
        result.insert("status".into(), Value::String("sent".into()));
        result.insert(
            "channels".into(),
            Value::Array(
                notification
                    .channels
                    .into_iter()
                    .map(Value::String)
                    .collect(),
            ),
        );
        Ok(result)
    }
}
