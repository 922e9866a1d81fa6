//! Ingestion-side gates.
//!
//! The monitor decides what enters the agent at all; the copilot decides
//! what to do with what got in. The two threshold sets are independent
//! knobs and may legitimately disagree (a loose monitor with a strict
//! copilot floods memory with context events that never become
//! incidents).

use std::sync::Arc;

use serde_json::{json, Map, Value};
use tracing::debug;

use maintpilot_core::config::MonitorConfig;
use maintpilot_core::{Event, EventKind, Result, Severity};

use crate::copilot::MaintenanceCopilot;

pub struct EventMonitor {
    copilot: Arc<MaintenanceCopilot>,
    config: MonitorConfig,
}

impl EventMonitor {
    pub fn new(copilot: Arc<MaintenanceCopilot>, config: MonitorConfig) -> Self {
        Self { copilot, config }
    }

    /// Route a model prediction result. `prediction_kind` is the model
    /// family ("anomaly" or "rul"); anything else is dropped with a log
    /// line. Returns whether an event was forwarded.
    pub fn on_prediction(
        &self,
        tenant_id: &str,
        asset_id: &str,
        prediction_kind: &str,
        result: &Map<String, Value>,
    ) -> Result<bool> {
        match prediction_kind {
            "anomaly" => self.on_anomaly(tenant_id, asset_id, result),
            "rul" => self.on_rul(tenant_id, asset_id, result),
            other => {
                debug!(kind = other, "unrecognized prediction kind, dropping");
                Ok(false)
            }
        }
    }

    fn on_anomaly(
        &self,
        tenant_id: &str,
        asset_id: &str,
        result: &Map<String, Value>,
    ) -> Result<bool> {
        let score = result
            .get("anomaly_score")
            .and_then(Value::as_f64)
            .unwrap_or(0.0);
        let risk = result
            .get("risk_level")
            .and_then(Value::as_str)
            .unwrap_or("normal");

        if score < self.config.anomaly_threshold && !matches!(risk, "warning" | "critical") {
            return Ok(false);
        }

        self.copilot.observe_anomaly(
            tenant_id,
            asset_id,
            score,
            risk,
            result.get("explanation").cloned(),
        )?;
        Ok(true)
    }

    fn on_rul(&self, tenant_id: &str, asset_id: &str, result: &Map<String, Value>) -> Result<bool> {
        let rul = match result.get("rul_estimate").and_then(Value::as_f64) {
            Some(rul) => rul,
            None => return Ok(false),
        };
        if rul > self.config.rul_warning_hours {
            return Ok(false);
        }

        self.copilot.observe_rul(
            tenant_id,
            asset_id,
            rul,
            result.get("confidence").and_then(Value::as_f64),
        )?;
        Ok(true)
    }

    /// Route a drift analysis result: forwarded when the overall score
    /// clears the threshold or at least two features drifted.
    pub fn on_drift_detected(
        &self,
        tenant_id: &str,
        asset_id: &str,
        result: &Map<String, Value>,
    ) -> Result<bool> {
        let score = result
            .get("overall_drift_score")
            .and_then(Value::as_f64)
            .unwrap_or(0.0);
        let features: Vec<String> = result
            .get("drifted_features")
            .and_then(Value::as_array)
            .map(|a| {
                a.iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        if score < self.config.drift_threshold && features.len() < 2 {
            return Ok(false);
        }

        self.copilot
            .observe_drift(tenant_id, asset_id, score, features)?;
        Ok(true)
    }

    /// Wrap a significant log-analysis pattern into an event; always
    /// forwarded (significance was decided upstream).
    pub fn on_log_pattern(
        &self,
        tenant_id: &str,
        asset_id: &str,
        pattern: &str,
        occurrences: u64,
    ) -> Result<()> {
        let mut payload = Map::new();
        payload.insert("pattern".into(), json!(pattern));
        payload.insert("occurrences".into(), json!(occurrences));
        self.copilot.observe(Event::new(
            EventKind::LogPatternDetected,
            tenant_id,
            asset_id,
            Severity::Warning,
            payload,
        ))
    }
}
