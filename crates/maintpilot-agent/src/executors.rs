//! Action executors.
//!
//! One executor per [`ActionKind`]; dispatch is an exhaustive match so a
//! new kind fails to compile until it gets an executor. Executors return a
//! structured result map on success and an error on collaborator failure;
//! the copilot is responsible for timeouts and for recording the outcome
//! on the action itself.

use std::sync::Arc;

use chrono::{Duration, Utc};
use serde_json::{json, Map, Value};
use tracing::{debug, info};

use maintpilot_core::{
    Action, ActionKind, Incident, IncidentStatus, Payload, Result,
};

use crate::memory::AgentMemory;
use crate::providers::{Notification, NotificationProvider, TicketProvider, TicketRequest};

pub struct ActionExecutor {
    memory: Arc<AgentMemory>,
    tickets: Option<Arc<dyn TicketProvider>>,
    notifications: Option<Arc<dyn NotificationProvider>>,
}

impl ActionExecutor {
    pub fn new(
        memory: Arc<AgentMemory>,
        tickets: Option<Arc<dyn TicketProvider>>,
        notifications: Option<Arc<dyn NotificationProvider>>,
    ) -> Self {
        Self {
            memory,
            tickets,
            notifications,
        }
    }

    pub async fn execute(&self, action: &Action) -> Result<Payload> {
        debug!(action_id = %action.id, kind = %action.kind, "executing action");
        match action.kind {
            ActionKind::CreateIncident => self.create_incident(action),
            ActionKind::SuggestAction => Ok(Self::record_suggestion(action)),
            ActionKind::CreateTicket => self.create_ticket(action).await,
            ActionKind::SendNotification => self.send_notification(action).await,
            ActionKind::ScheduleMaintenance => Ok(Self::schedule_maintenance(action)),
            ActionKind::Escalate => self.escalate(action).await,
        }
    }

    fn create_incident(&self, action: &Action) -> Result<Payload> {
        let now = Utc::now();
        let incident = Incident {
            id: Incident::generate_id(now),
            tenant_id: action.tenant_id.clone(),
            asset_id: action.asset_id.clone(),
            title: action.description.clone(),
            description: action
                .detail_str("full_description")
                .unwrap_or(&action.description)
                .to_string(),
            severity: action.priority,
            root_cause_analysis: action.detail_str("root_cause").unwrap_or("").to_string(),
            suggested_actions: action
                .details
                .get("suggested_actions")
                .and_then(Value::as_array)
                .map(|a| {
                    a.iter()
                        .filter_map(Value::as_str)
                        .map(str::to_string)
                        .collect()
                })
                .unwrap_or_default(),
            created_at: now,
            related_event_ids: action
                .detail_str("event_id")
                .map(|id| vec![id.to_string()])
                .unwrap_or_default(),
            status: IncidentStatus::Open,
            ticket_id: None,
        };

        let incident_id = incident.id.clone();
        info!(%incident_id, asset_id = %action.asset_id, "incident created");
        self.memory.add_incident(incident);

        let mut result = Map::new();
        result.insert("status".into(), json!("success"));
        result.insert("incident_id".into(), json!(incident_id));
        Ok(result)
    }

    fn record_suggestion(action: &Action) -> Payload {
        let mut result = Map::new();
        result.insert("status".into(), json!("recorded"));
        result.insert(
            "action".into(),
            action
                .details
                .get("action")
                .cloned()
                .unwrap_or(Value::Null),
        );
        result.insert(
            "recommendation".into(),
            action
                .details
                .get("recommendation")
                .cloned()
                .unwrap_or(Value::Null),
        );
        result
    }

    async fn create_ticket(&self, action: &Action) -> Result<Payload> {
        let receipt = match &self.tickets {
            Some(provider) => {
                let request = TicketRequest {
                    system: action.detail_str("system").unwrap_or("jira").to_string(),
                    title: action.description.clone(),
                    description: action
                        .detail_str("description")
                        .unwrap_or(&action.description)
                        .to_string(),
                    priority: action.priority,
                    project: action.detail_str("project").unwrap_or("MAINT").to_string(),
                    issue_type: action.detail_str("issue_type").unwrap_or("Task").to_string(),
                };
                provider.create_ticket(request).await?
            }
            None => crate::providers::TicketReceipt::mocked(),
        };

        info!(ticket_id = %receipt.ticket_id, asset_id = %action.asset_id, "ticket created");
        let mut result = Map::new();
        result.insert("status".into(), json!(receipt.status));
        result.insert("ticket_id".into(), json!(receipt.ticket_id));
        if let Some(url) = receipt.url {
            result.insert("url".into(), json!(url));
        }
        Ok(result)
    }

    async fn send_notification(&self, action: &Action) -> Result<Payload> {
        let channels = Self::channels_from(action, &["email"]);
        self.notify(action, channels, action.description.clone(), vec![])
            .await
    }

    async fn escalate(&self, action: &Action) -> Result<Payload> {
        self.notify(
            action,
            vec!["email".to_string(), "sms".to_string()],
            format!("ESCALATION: {}", action.description),
            vec!["management".to_string()],
        )
        .await?;

        let mut result = Map::new();
        result.insert("status".into(), json!("escalated"));
        result.insert("description".into(), json!(action.description));
        Ok(result)
    }

    async fn notify(
        &self,
        action: &Action,
        channels: Vec<String>,
        message: String,
        recipients: Vec<String>,
    ) -> Result<Payload> {
        match &self.notifications {
            Some(provider) => {
                let notification = Notification {
                    channels,
                    message,
                    priority: action.priority,
                    tenant_id: action.tenant_id.clone(),
                    recipients,
                };
                provider.send(notification).await
            }
            None => {
                debug!(asset_id = %action.asset_id, "no notification collaborator, recording only");
                let mut result = Map::new();
                result.insert("status".into(), json!("sent"));
                result.insert("channels".into(), json!(channels));
                Ok(result)
            }
        }
    }

    fn schedule_maintenance(action: &Action) -> Payload {
        let deadline_hours = action.detail_f64("deadline_hours").unwrap_or(24.0);
        let deadline = Utc::now() + Duration::seconds((deadline_hours * 3600.0) as i64);

        let mut maintenance = Map::new();
        maintenance.insert("asset_id".into(), json!(action.asset_id));
        maintenance.insert(
            "type".into(),
            json!(action.detail_str("type").unwrap_or("preventive")),
        );
        maintenance.insert("deadline".into(), json!(deadline.to_rfc3339()));

        let mut result = Map::new();
        result.insert("status".into(), json!("scheduled"));
        result.insert("maintenance".into(), Value::Object(maintenance));
        result
    }

    fn channels_from(action: &Action, default: &[&str]) -> Vec<String> {
        action
            .details
            .get("channels")
            .and_then(Value::as_array)
            .map(|a| {
                a.iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_else(|| default.iter().map(|s| s.to_string()).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use maintpilot_core::{Error, Priority};
    use std::sync::Mutex;

    struct RecordingNotifier {
        sent: Mutex<Vec<Notification>>,
    }

    #[async_trait]
    impl NotificationProvider for RecordingNotifier {
        async fn send(&self, notification: Notification) -> Result<Map<String, Value>> {
            self.sent.lock().unwrap().push(notification);
            let mut result = Map::new();
            result.insert("status".into(), json!("sent"));
            Ok(result)
        }
    }

    struct FailingTickets;

    #[async_trait]
    impl TicketProvider for FailingTickets {
        async fn create_ticket(&self, _request: TicketRequest) -> Result<crate::providers::TicketReceipt> {
            Err(Error::Provider("ticket backend unavailable".into()))
        }
    }

    fn executor(memory: Arc<AgentMemory>) -> ActionExecutor {
        ActionExecutor::new(memory, None, None)
    }

    fn action(kind: ActionKind, details: Payload) -> Action {
        Action::new(kind, Priority::High, "t", "a", "test action", details)
    }

    #[tokio::test]
    async fn test_create_incident_persists_to_memory() {
        let memory = Arc::new(AgentMemory::default());
        let mut details = Map::new();
        details.insert("full_description".into(), json!("long form"));
        details.insert("root_cause".into(), json!("bearing wear"));
        details.insert("suggested_actions".into(), json!(["inspect", "replace"]));
        details.insert("event_id".into(), json!("anomaly_detected_xyz"));

        let result = executor(memory.clone())
            .execute(&action(ActionKind::CreateIncident, details))
            .await
            .unwrap();

        assert_eq!(result.get("status"), Some(&json!("success")));
        let incident_id = result.get("incident_id").unwrap().as_str().unwrap();
        let incident = memory.get_incident(incident_id).unwrap();
        assert_eq!(incident.description, "long form");
        assert_eq!(incident.root_cause_analysis, "bearing wear");
        assert_eq!(incident.suggested_actions.len(), 2);
        assert_eq!(incident.related_event_ids, vec!["anomaly_detected_xyz"]);
        assert_eq!(incident.status, IncidentStatus::Open);
    }

    #[tokio::test]
    async fn test_mock_ticket_when_no_provider() {
        let memory = Arc::new(AgentMemory::default());
        let result = executor(memory)
            .execute(&action(ActionKind::CreateTicket, Map::new()))
            .await
            .unwrap();

        let ticket_id = result.get("ticket_id").unwrap().as_str().unwrap();
        assert!(ticket_id.starts_with("MAINT-"));
        let url = result.get("url").unwrap().as_str().unwrap();
        assert!(url.ends_with(ticket_id));
    }

    #[tokio::test]
    async fn test_ticket_provider_error_propagates() {
        let memory = Arc::new(AgentMemory::default());
        let executor = ActionExecutor::new(memory, Some(Arc::new(FailingTickets)), None);

        let err = executor
            .execute(&action(ActionKind::CreateTicket, Map::new()))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Provider(_)));
    }

    #[tokio::test]
    async fn test_notification_uses_detail_channels() {
        let notifier = Arc::new(RecordingNotifier {
            sent: Mutex::new(vec![]),
        });
        let memory = Arc::new(AgentMemory::default());
        let executor = ActionExecutor::new(memory, None, Some(notifier.clone()));

        let mut details = Map::new();
        details.insert("channels".into(), json!(["slack"]));
        executor
            .execute(&action(ActionKind::SendNotification, details))
            .await
            .unwrap();

        let sent = notifier.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].channels, vec!["slack"]);
        assert!(sent[0].recipients.is_empty());
    }

    #[tokio::test]
    async fn test_escalation_notifies_management() {
        let notifier = Arc::new(RecordingNotifier {
            sent: Mutex::new(vec![]),
        });
        let memory = Arc::new(AgentMemory::default());
        let executor = ActionExecutor::new(memory, None, Some(notifier.clone()));

        let result = executor
            .execute(&action(ActionKind::Escalate, Map::new()))
            .await
            .unwrap();

        assert_eq!(result.get("status"), Some(&json!("escalated")));
        let sent = notifier.sent.lock().unwrap();
        assert_eq!(sent[0].channels, vec!["email", "sms"]);
        assert_eq!(sent[0].recipients, vec!["management"]);
        assert!(sent[0].message.starts_with("ESCALATION:"));
    }

    #[tokio::test]
    async fn test_schedule_maintenance_result_shape() {
        let memory = Arc::new(AgentMemory::default());
        let mut details = Map::new();
        details.insert("deadline_hours".into(), json!(9.6));
        details.insert("type".into(), json!("preventive"));

        let result = executor(memory)
            .execute(&action(ActionKind::ScheduleMaintenance, details))
            .await
            .unwrap();

        assert_eq!(result.get("status"), Some(&json!("scheduled")));
        let maintenance = result.get("maintenance").unwrap().as_object().unwrap();
        assert_eq!(maintenance.get("asset_id"), Some(&json!("a")));
        assert_eq!(maintenance.get("type"), Some(&json!("preventive")));
        assert!(maintenance.contains_key("deadline"));
    }

    #[tokio::test]
    async fn test_suggestion_is_record_only() {
        let memory = Arc::new(AgentMemory::default());
        let mut details = Map::new();
        details.insert("action".into(), json!("retrain_model"));
        details.insert("recommendation".into(), json!("retrain soon"));

        let result = executor(memory)
            .execute(&action(ActionKind::SuggestAction, details))
            .await
            .unwrap();

        assert_eq!(result.get("status"), Some(&json!("recorded")));
        assert_eq!(result.get("action"), Some(&json!("retrain_model")));
        assert_eq!(result.get("recommendation"), Some(&json!("retrain soon")));
    }
}
