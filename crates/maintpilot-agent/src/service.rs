//! Service wrapper around the copilot.
//!
//! Construction order is fixed and explicit: config first, then
//! collaborators, then the copilot, then the monitor on top. Whatever
//! process entry point starts the service owns it; there is no global
//! instance to reach for.

use std::sync::Arc;

use serde::Serialize;
use serde_json::{json, Map, Value};
use tokio::task::JoinHandle;
use tracing::{info, warn};

use maintpilot_core::config::Config;
use maintpilot_core::{Priority, Result};

use crate::copilot::MaintenanceCopilot;
use crate::memory::{AgentMemory, DEFAULT_SIMILAR_LIMIT};
use crate::monitor::EventMonitor;
use crate::providers::{LlmProvider, NotificationProvider, TicketProvider};

/// One prior suggestion surfaced by [`CopilotService::get_suggestions`].
#[derive(Debug, Clone, Serialize)]
pub struct SuggestionEntry {
    pub action: String,
    pub recommendation: Option<String>,
    pub priority: Priority,
}

/// Suggestion history plus memory counts for one asset.
#[derive(Debug, Clone, Serialize)]
pub struct SuggestionsReport {
    pub asset_id: String,
    pub suggestions: Vec<SuggestionEntry>,
    pub recent_event_count: usize,
    pub similar_incident_count: usize,
}

pub struct CopilotService {
    copilot: Arc<MaintenanceCopilot>,
    monitor: EventMonitor,
    llm: Option<Arc<dyn LlmProvider>>,
    loop_handle: tokio::sync::Mutex<Option<JoinHandle<Result<()>>>>,
}

impl CopilotService {
    pub fn new(
        config: &Config,
        llm: Option<Arc<dyn LlmProvider>>,
        tickets: Option<Arc<dyn TicketProvider>>,
        notifications: Option<Arc<dyn NotificationProvider>>,
    ) -> Self {
        let memory = Arc::new(AgentMemory::new(config.copilot.max_events));
        let copilot = Arc::new(MaintenanceCopilot::new(
            config.copilot.clone(),
            memory,
            llm.clone(),
            tickets,
            notifications,
        ));
        let monitor = EventMonitor::new(copilot.clone(), config.monitor.clone());
        Self {
            copilot,
            monitor,
            llm,
            loop_handle: tokio::sync::Mutex::new(None),
        }
    }

    pub fn copilot(&self) -> &Arc<MaintenanceCopilot> {
        &self.copilot
    }

    pub fn monitor(&self) -> &EventMonitor {
        &self.monitor
    }

    /// Spawn the copilot loop. Idempotent: a second call while running is
    /// a logged no-op.
    pub async fn start(&self) {
        let mut handle = self.loop_handle.lock().await;
        if handle.is_some() {
            warn!("copilot service already started");
            return;
        }
        let copilot = self.copilot.clone();
        *handle = Some(tokio::spawn(async move { copilot.run().await }));
        info!("copilot service started");
    }

    /// Cooperative shutdown: flag the loop and wait for it to drain its
    /// current event.
    pub async fn stop(&self) {
        self.copilot.stop();
        if let Some(handle) = self.loop_handle.lock().await.take() {
            match handle.await {
                Ok(Ok(())) => info!("copilot service stopped"),
                Ok(Err(e)) => warn!(error = %e, "copilot loop exited with error"),
                Err(e) => warn!(error = %e, "copilot loop task panicked"),
            }
        }
    }

    /// Conversational entry point. Builds a memory-derived context for the
    /// question; without an LLM collaborator the reply is a deterministic
    /// summary of that context.
    pub async fn chat(
        &self,
        message: &str,
        tenant_id: &str,
        asset_id: Option<&str>,
    ) -> Result<String> {
        let context = self.chat_context(tenant_id, asset_id);
        match &self.llm {
            Some(llm) => llm.chat(message, &context).await,
            None => Ok(Self::fallback_reply(&context)),
        }
    }

    fn chat_context(&self, tenant_id: &str, asset_id: Option<&str>) -> Map<String, Value> {
        let memory = self.copilot.memory();
        let mut context = Map::new();
        context.insert("tenant_id".into(), json!(tenant_id));
        if let Some(asset_id) = asset_id {
            context.insert("asset_id".into(), json!(asset_id));
            context.insert(
                "asset_context".into(),
                Value::Object(memory.get_asset_context(asset_id)),
            );
        }

        let recent = memory.get_recent_events(
            tenant_id,
            asset_id,
            None,
            self.copilot.config().lookback_hours,
        );
        let tail: Vec<Value> = recent
            .iter()
            .rev()
            .take(5)
            .map(|e| {
                json!({
                    "type": e.kind.as_str(),
                    "severity": e.severity.as_str(),
                    "time": e.timestamp.to_rfc3339(),
                })
            })
            .collect();
        context.insert("recent_events".into(), Value::Array(tail));
        context
    }

    fn fallback_reply(context: &Map<String, Value>) -> String {
        let event_count = context
            .get("recent_events")
            .and_then(Value::as_array)
            .map_or(0, Vec::len);
        let scope = context
            .get("asset_id")
            .and_then(Value::as_str)
            .map(|a| format!("asset {a}"))
            .unwrap_or_else(|| "your fleet".to_string());
        format!(
            "No language model is configured. For {scope} I am tracking \
             {event_count} recent event(s); use the suggestions endpoint for \
             recorded recommendations."
        )
    }

    /// Suggestion history for one asset, most recent 10, with memory
    /// counts for context.
    pub fn get_suggestions(&self, tenant_id: &str, asset_id: &str) -> SuggestionsReport {
        let memory = self.copilot.memory();
        let suggestions = memory
            .recent_suggestions(asset_id, 10)
            .into_iter()
            .map(|a| SuggestionEntry {
                action: a
                    .detail_str("action")
                    .map(str::to_string)
                    .unwrap_or_else(|| a.description.clone()),
                recommendation: a.detail_str("recommendation").map(str::to_string),
                priority: a.priority,
            })
            .collect();

        SuggestionsReport {
            asset_id: asset_id.to_string(),
            suggestions,
            recent_event_count: memory
                .get_recent_events(
                    tenant_id,
                    Some(asset_id),
                    None,
                    self.copilot.config().lookback_hours,
                )
                .len(),
            similar_incident_count: memory
                .get_similar_incidents(tenant_id, asset_id, DEFAULT_SIMILAR_LIMIT)
                .len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use maintpilot_core::{Action, ActionKind, Event, EventKind, Severity};

    fn service() -> CopilotService {
        CopilotService::new(&Config::default(), None, None, None)
    }

    #[tokio::test]
    async fn test_start_stop_lifecycle() {
        let service = service();
        service.start().await;

        // second start is a no-op, not a second loop
        service.start().await;

        service
            .copilot()
            .observe_anomaly("t", "a", 0.9, "critical", None)
            .unwrap();

        for _ in 0..100 {
            if !service.copilot().memory().action_history().is_empty() {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
        assert!(!service.copilot().memory().action_history().is_empty());

        service.stop().await;
        assert!(!service.copilot().is_running());
    }

    #[tokio::test]
    async fn test_chat_fallback_reports_memory() {
        let service = service();
        let memory = service.copilot().memory();
        memory.add_event(Event::new(
            EventKind::DriftDetected,
            "t",
            "pump-1",
            Severity::Warning,
            Map::new(),
        ));

        let reply = service
            .chat("how is pump-1 doing?", "t", Some("pump-1"))
            .await
            .unwrap();
        assert!(reply.contains("asset pump-1"));
        assert!(reply.contains("1 recent event"));
    }

    #[tokio::test]
    async fn test_chat_context_is_tenant_scoped() {
        let service = service();
        let memory = service.copilot().memory();
        memory.add_event(Event::new(
            EventKind::AnomalyDetected,
            "other-tenant",
            "pump-1",
            Severity::Critical,
            Map::new(),
        ));

        let reply = service.chat("status?", "t", Some("pump-1")).await.unwrap();
        assert!(reply.contains("0 recent event"));
    }

    #[tokio::test]
    async fn test_get_suggestions_report() {
        let service = service();
        let memory = service.copilot().memory();

        for i in 0..3 {
            let mut details = Map::new();
            details.insert("action".into(), json!("retrain_model"));
            details.insert("recommendation".into(), json!(format!("retrain {i}")));
            memory.record_action(Action::new(
                ActionKind::SuggestAction,
                Priority::Medium,
                "t",
                "pump-1",
                "drift suggestion",
                details,
            ));
        }
        memory.add_event(Event::new(
            EventKind::DriftDetected,
            "t",
            "pump-1",
            Severity::Warning,
            Map::new(),
        ));

        let report = service.get_suggestions("t", "pump-1");
        assert_eq!(report.asset_id, "pump-1");
        assert_eq!(report.suggestions.len(), 3);
        assert_eq!(report.suggestions[0].action, "retrain_model");
        assert_eq!(
            report.suggestions[2].recommendation.as_deref(),
            Some("retrain 2")
        );
        assert_eq!(report.recent_event_count, 1);
        assert_eq!(report.similar_incident_count, 0);
    }
}
