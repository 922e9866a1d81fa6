//! The MaintenanceCopilot observe → reason → act loop.
//!
//! Two states: stopped and running. `observe` appends to memory and
//! enqueues on a single-consumer queue; `run` drains that queue one event
//! at a time, fully reasoning and acting on each event before the next is
//! dequeued. That ordering is load-bearing: volume escalation reads
//! "recent events so far" and must see fully-acted-upon history, not a
//! half-processed burst.
//!
//! The queue poll uses a short timeout so `stop()` is observed within one
//! tick.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde_json::{json, Map, Value};
use tokio::sync::mpsc;
use tokio::time::timeout;
use tracing::{debug, error, info, warn};

use maintpilot_core::config::CopilotConfig;
use maintpilot_core::{
    Action, Error, Event, EventKind, Payload, Result, Severity,
};

use crate::executors::ActionExecutor;
use crate::memory::{AgentMemory, DEFAULT_SIMILAR_LIMIT};
use crate::providers::{LlmProvider, NotificationProvider, TicketProvider};
use crate::reasoning;

pub struct MaintenanceCopilot {
    memory: Arc<AgentMemory>,
    llm: Option<Arc<dyn LlmProvider>>,
    executor: ActionExecutor,
    config: CopilotConfig,
    running: AtomicBool,
    tx: mpsc::UnboundedSender<Event>,
    rx: tokio::sync::Mutex<Option<mpsc::UnboundedReceiver<Event>>>,
}

impl MaintenanceCopilot {
    pub fn new(
        config: CopilotConfig,
        memory: Arc<AgentMemory>,
        llm: Option<Arc<dyn LlmProvider>>,
        tickets: Option<Arc<dyn TicketProvider>>,
        notifications: Option<Arc<dyn NotificationProvider>>,
    ) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            executor: ActionExecutor::new(memory.clone(), tickets, notifications),
            memory,
            llm,
            config,
            running: AtomicBool::new(false),
            tx,
            rx: tokio::sync::Mutex::new(Some(rx)),
        }
    }

    pub fn memory(&self) -> &Arc<AgentMemory> {
        &self.memory
    }

    pub fn config(&self) -> &CopilotConfig {
        &self.config
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Record an event and enqueue it for processing. Never blocks.
    pub fn observe(&self, event: Event) -> Result<()> {
        debug!(event_id = %event.id, kind = %event.kind, asset_id = %event.asset_id, "event observed");
        self.memory.add_event(event.clone());
        self.tx
            .send(event)
            .map_err(|_| Error::NotRunning)
    }

    /// Typed observer for anomaly scoring results.
    pub fn observe_anomaly(
        &self,
        tenant_id: &str,
        asset_id: &str,
        anomaly_score: f64,
        risk_level: &str,
        explanation: Option<Value>,
    ) -> Result<()> {
        let mut payload = Map::new();
        payload.insert("anomaly_score".into(), json!(anomaly_score));
        payload.insert("risk_level".into(), json!(risk_level));
        if let Some(explanation) = explanation {
            payload.insert("explanation".into(), explanation);
        }
        self.observe(Event::new(
            EventKind::AnomalyDetected,
            tenant_id,
            asset_id,
            Severity::parse(risk_level),
            payload,
        ))
    }

    /// Typed observer for drift detection results.
    pub fn observe_drift(
        &self,
        tenant_id: &str,
        asset_id: &str,
        drift_score: f64,
        drifted_features: Vec<String>,
    ) -> Result<()> {
        let mut payload = Map::new();
        payload.insert("drift_score".into(), json!(drift_score));
        payload.insert("drifted_features".into(), json!(drifted_features));
        self.observe(Event::new(
            EventKind::DriftDetected,
            tenant_id,
            asset_id,
            Severity::Warning,
            payload,
        ))
    }

    /// Typed observer for remaining-useful-life forecasts. Severity is
    /// reclassified from the hours themselves, and the kind is re-tagged
    /// as critical or merely due against `rul_critical_hours`.
    pub fn observe_rul(
        &self,
        tenant_id: &str,
        asset_id: &str,
        rul_hours: f64,
        confidence: Option<f64>,
    ) -> Result<()> {
        let kind = if rul_hours < self.config.rul_critical_hours {
            EventKind::RulCritical
        } else {
            EventKind::MaintenanceDue
        };
        let mut payload = Map::new();
        payload.insert("rul_hours".into(), json!(rul_hours));
        if let Some(confidence) = confidence {
            payload.insert("confidence".into(), json!(confidence));
        }
        self.observe(Event::new(
            kind,
            tenant_id,
            asset_id,
            reasoning::rul_severity(rul_hours),
            payload,
        ))
    }

    /// Map an event plus memory context to a list of actions. Reads memory,
    /// never mutates it; the optional LLM call only suspends this event's
    /// own progress.
    pub async fn reason(&self, event: &Event) -> Vec<Action> {
        let recent = self.memory.get_recent_events(
            &event.tenant_id,
            Some(&event.asset_id),
            None,
            self.config.lookback_hours,
        );
        let priority = reasoning::determine_priority(event, &recent);

        let mut actions = match event.kind {
            EventKind::AnomalyDetected => {
                if reasoning::anomaly_warrants_incident(event, self.config.anomaly_threshold) {
                    let draft = self.incident_draft(event).await;
                    reasoning::anomaly_actions(event, priority, &draft)
                } else {
                    debug!(event_id = %event.id, "anomaly below incident gate");
                    Vec::new()
                }
            }
            EventKind::DriftDetected => reasoning::drift_actions(event, priority),
            EventKind::RulCritical => {
                let recommendation = self.recommendation(event).await;
                reasoning::critical_rul_actions(event, &recommendation)
            }
            EventKind::MaintenanceDue => reasoning::maintenance_due_actions(event, priority),
            // routed into memory for context, but produce no actions
            EventKind::AlertTriggered | EventKind::LogPatternDetected => Vec::new(),
        };

        if reasoning::should_escalate(&recent, self.config.escalation_threshold) {
            let critical_count = recent
                .iter()
                .filter(|e| e.severity == Severity::Critical)
                .count();
            warn!(
                asset_id = %event.asset_id,
                critical_count,
                "critical event volume reached escalation threshold"
            );
            actions.push(reasoning::escalation_action(event, critical_count));
        }

        actions
    }

    async fn incident_draft(&self, event: &Event) -> crate::providers::IncidentDraft {
        if let Some(llm) = &self.llm {
            let similar = self.memory.get_similar_incidents(
                &event.tenant_id,
                &event.asset_id,
                DEFAULT_SIMILAR_LIMIT,
            );
            match llm.generate_incident(event, &similar).await {
                Ok(draft) => return draft,
                Err(e) => {
                    warn!(error = %e, "incident generation failed, using template")
                }
            }
        }
        reasoning::fallback_incident_draft(event)
    }

    async fn recommendation(&self, event: &Event) -> String {
        if let Some(llm) = &self.llm {
            match llm.generate_recommendation(event).await {
                Ok(text) => return text,
                Err(e) => {
                    warn!(error = %e, "recommendation generation failed, using template")
                }
            }
        }
        reasoning::fallback_recommendation(event)
    }

    /// Execute one action. Executor failures and timeouts become structured
    /// `{status: error, ...}` results so a failing action never stops the
    /// loop; the action transitions to executed exactly once either way.
    pub async fn act(&self, action: &mut Action) -> Result<Payload> {
        if action.executed {
            return Err(Error::AlreadyExecuted(action.id.clone()));
        }

        let budget = std::time::Duration::from_secs(self.config.executor_timeout_secs);
        let result = match timeout(budget, self.executor.execute(action)).await {
            Ok(Ok(payload)) => payload,
            Ok(Err(e)) => {
                error!(action_id = %action.id, kind = %action.kind, error = %e, "action failed");
                let mut result = Map::new();
                result.insert("status".into(), json!("error"));
                result.insert("error".into(), json!(e.to_string()));
                result
            }
            Err(_) => {
                let e = Error::ProviderTimeout(self.config.executor_timeout_secs);
                error!(action_id = %action.id, kind = %action.kind, error = %e, "action timed out");
                let mut result = Map::new();
                result.insert("status".into(), json!("error"));
                result.insert("error".into(), json!(e.to_string()));
                result
            }
        };

        action.executed = true;
        action.result = Some(result.clone());
        self.memory.record_action(action.clone());
        Ok(result)
    }

    /// Reason over one event and act on every produced action in order.
    pub async fn process_event(&self, event: &Event) {
        let mut actions = self.reason(event).await;
        if !actions.is_empty() {
            info!(
                event_id = %event.id,
                kind = %event.kind,
                action_count = actions.len(),
                "reasoning produced actions"
            );
        }
        for action in &mut actions {
            if let Err(e) = self.act(action).await {
                error!(action_id = %action.id, error = %e, "act failed");
            }
        }
        self.memory.mark_processed(&event.id);
    }

    /// Drive the loop until `stop()`. Returns an error if the loop is
    /// already running elsewhere.
    pub async fn run(&self) -> Result<()> {
        let mut rx = self
            .rx
            .lock()
            .await
            .take()
            .ok_or_else(|| Error::Config("copilot loop is already running".into()))?;

        self.running.store(true, Ordering::SeqCst);
        info!("copilot loop started");

        while self.running.load(Ordering::SeqCst) {
            match timeout(self.config.poll_interval(), rx.recv()).await {
                Ok(Some(event)) => self.process_event(&event).await,
                // all senders dropped, nothing will ever arrive
                Ok(None) => break,
                // poll tick, re-check the stop flag
                Err(_) => continue,
            }
        }

        self.running.store(false, Ordering::SeqCst);
        *self.rx.lock().await = Some(rx);
        info!("copilot loop stopped");
        Ok(())
    }

    /// Request loop exit; observed within one poll tick.
    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }
}
