//! Core enums shared across the agent and delivery crates.
//!
//! All of these are closed sets: adding a variant is a compile-time-checked
//! change everywhere they are matched.

use serde::{Deserialize, Serialize};

/// Severity of an observed event.
///
/// Ordered so that threshold comparisons (`>= Warning`) read naturally.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Info,
    Warning,
    Critical,
}

impl Severity {
    /// Parse a severity string, defaulting to `Info` for unknown values.
    pub fn parse(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "critical" => Severity::Critical,
            "warning" => Severity::Warning,
            _ => Severity::Info,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Info => "info",
            Severity::Warning => "warning",
            Severity::Critical => "critical",
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Priority assigned to an action. Totally ordered, `Critical` highest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low,
    Medium,
    High,
    Critical,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Low => "low",
            Priority::Medium => "medium",
            Priority::High => "high",
            Priority::Critical => "critical",
        }
    }
}

impl std::fmt::Display for Priority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The kinds of facts the agent observes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    AnomalyDetected,
    DriftDetected,
    RulCritical,
    AlertTriggered,
    MaintenanceDue,
    LogPatternDetected,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::AnomalyDetected => "anomaly_detected",
            EventKind::DriftDetected => "drift_detected",
            EventKind::RulCritical => "rul_critical",
            EventKind::AlertTriggered => "alert_triggered",
            EventKind::MaintenanceDue => "maintenance_due",
            EventKind::LogPatternDetected => "log_pattern_detected",
        }
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The directives the agent can produce. Each kind maps to exactly one
/// executor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    CreateIncident,
    SuggestAction,
    CreateTicket,
    SendNotification,
    ScheduleMaintenance,
    Escalate,
}

impl ActionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionKind::CreateIncident => "create_incident",
            ActionKind::SuggestAction => "suggest_action",
            ActionKind::CreateTicket => "create_ticket",
            ActionKind::SendNotification => "send_notification",
            ActionKind::ScheduleMaintenance => "schedule_maintenance",
            ActionKind::Escalate => "escalate",
        }
    }
}

impl std::fmt::Display for ActionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_severity_ordering() {
        assert!(Severity::Critical > Severity::Warning);
        assert!(Severity::Warning > Severity::Info);
    }

    #[test]
    fn test_severity_parse() {
        assert_eq!(Severity::parse("critical"), Severity::Critical);
        assert_eq!(Severity::parse("WARNING"), Severity::Warning);
        assert_eq!(Severity::parse("info"), Severity::Info);
        assert_eq!(Severity::parse("bogus"), Severity::Info);
    }

    #[test]
    fn test_priority_ordering() {
        assert!(Priority::Critical > Priority::High);
        assert!(Priority::High > Priority::Medium);
        assert!(Priority::Medium > Priority::Low);
    }

    #[test]
    fn test_kind_wire_names() {
        assert_eq!(
            serde_json::to_string(&EventKind::AnomalyDetected).unwrap(),
            "\"anomaly_detected\""
        );
        assert_eq!(
            serde_json::to_string(&ActionKind::ScheduleMaintenance).unwrap(),
            "\"schedule_maintenance\""
        );
    }
}
