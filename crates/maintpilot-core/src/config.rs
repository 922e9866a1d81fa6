//! Configuration for the copilot, the event monitor, and webhook delivery.
//!
//! Loaded from a YAML file with per-field environment overrides
//! (`MAINTPILOT_*`). Every field has a default so a missing file or empty
//! document yields a working configuration.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Default anomaly score threshold used by the reasoning rules.
pub const DEFAULT_ANOMALY_THRESHOLD: f64 = 0.7;

/// Default RUL hours below which an event is tagged `RulCritical`.
pub const DEFAULT_RUL_CRITICAL_HOURS: f64 = 24.0;

/// Default count of critical events in the lookback window that forces
/// escalation.
pub const DEFAULT_ESCALATION_THRESHOLD: usize = 3;

/// Default capacity of the in-memory event ring buffer.
pub const DEFAULT_MAX_EVENTS: usize = 1000;

/// Default lookback window for recency queries, in hours.
pub const DEFAULT_LOOKBACK_HOURS: i64 = 24;

/// Default ingestion-side RUL warning threshold, in hours.
pub const DEFAULT_RUL_WARNING_HOURS: f64 = 48.0;

/// Default ingestion-side drift score threshold.
pub const DEFAULT_DRIFT_THRESHOLD: f64 = 0.5;

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub copilot: CopilotConfig,
    pub monitor: MonitorConfig,
    pub delivery: DeliveryConfig,
}

impl Config {
    /// Load configuration from a YAML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let contents = std::fs::read_to_string(path.as_ref())?;
        let mut config: Config = serde_yaml::from_str(&contents)
            .map_err(|e| Error::Config(format!("invalid config file: {e}")))?;
        config.apply_env();
        Ok(config)
    }

    /// Default configuration with environment overrides applied.
    pub fn from_env() -> Self {
        let mut config = Config::default();
        config.apply_env();
        config
    }

    /// Apply `MAINTPILOT_*` environment overrides on top of loaded values.
    pub fn apply_env(&mut self) {
        override_from_env("MAINTPILOT_ANOMALY_THRESHOLD", &mut self.copilot.anomaly_threshold);
        override_from_env("MAINTPILOT_RUL_CRITICAL_HOURS", &mut self.copilot.rul_critical_hours);
        override_from_env("MAINTPILOT_ESCALATION_THRESHOLD", &mut self.copilot.escalation_threshold);
        override_from_env("MAINTPILOT_MAX_EVENTS", &mut self.copilot.max_events);
        override_from_env("MAINTPILOT_POLL_INTERVAL_MS", &mut self.copilot.poll_interval_ms);
        override_from_env("MAINTPILOT_MONITOR_ANOMALY_THRESHOLD", &mut self.monitor.anomaly_threshold);
        override_from_env("MAINTPILOT_RUL_WARNING_HOURS", &mut self.monitor.rul_warning_hours);
        override_from_env("MAINTPILOT_DRIFT_THRESHOLD", &mut self.monitor.drift_threshold);
        override_from_env("MAINTPILOT_RETRY_COUNT", &mut self.delivery.retry_count);
        override_from_env("MAINTPILOT_RETRY_DELAY_SECS", &mut self.delivery.retry_delay_secs);
        override_from_env("MAINTPILOT_REQUEST_TIMEOUT_SECS", &mut self.delivery.timeout_secs);
    }
}

fn override_from_env<T: std::str::FromStr>(var: &str, field: &mut T) {
    if let Some(value) = std::env::var(var).ok().and_then(|v| v.parse().ok()) {
        *field = value;
    }
}

/// Reasoning-side thresholds and loop tuning for the copilot.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CopilotConfig {
    /// Minimum anomaly score that triggers incident creation.
    pub anomaly_threshold: f64,
    /// RUL hours below which a RUL observation becomes `RulCritical`.
    pub rul_critical_hours: f64,
    /// Critical-severity event count in the lookback window that forces
    /// escalation.
    pub escalation_threshold: usize,
    /// Capacity of the bounded event ring buffer.
    pub max_events: usize,
    /// Lookback window for recency queries, in hours.
    pub lookback_hours: i64,
    /// Queue poll timeout; bounds stop() latency.
    pub poll_interval_ms: u64,
    /// Budget for any single collaborator call made by an executor.
    pub executor_timeout_secs: u64,
}

impl Default for CopilotConfig {
    fn default() -> Self {
        Self {
            anomaly_threshold: DEFAULT_ANOMALY_THRESHOLD,
            rul_critical_hours: DEFAULT_RUL_CRITICAL_HOURS,
            escalation_threshold: DEFAULT_ESCALATION_THRESHOLD,
            max_events: DEFAULT_MAX_EVENTS,
            lookback_hours: DEFAULT_LOOKBACK_HOURS,
            poll_interval_ms: 1000,
            executor_timeout_secs: 30,
        }
    }
}

impl CopilotConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

/// Ingestion-side gates applied by the EventMonitor.
///
/// Intentionally distinct from [`CopilotConfig`]: the monitor filters what
/// enters the agent at all, the copilot decides what to do with what got
/// in. The two thresholds may disagree.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    pub anomaly_threshold: f64,
    pub rul_warning_hours: f64,
    pub drift_threshold: f64,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            anomaly_threshold: DEFAULT_ANOMALY_THRESHOLD,
            rul_warning_hours: DEFAULT_RUL_WARNING_HOURS,
            drift_threshold: DEFAULT_DRIFT_THRESHOLD,
        }
    }
}

/// Defaults for webhook delivery endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DeliveryConfig {
    /// Maximum delivery attempts per endpoint.
    pub retry_count: u32,
    /// Base backoff in seconds; attempt N sleeps `retry_delay * N`.
    pub retry_delay_secs: u64,
    /// Per-request HTTP timeout.
    pub timeout_secs: u64,
    /// Response bodies recorded in delivery records are truncated to this
    /// many characters.
    pub response_body_limit: usize,
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            retry_count: 3,
            retry_delay_secs: 5,
            timeout_secs: 30,
            response_body_limit: 500,
        }
    }
}

impl DeliveryConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}
