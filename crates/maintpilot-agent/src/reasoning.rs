//! Pure reasoning rules.
//!
//! Everything in this module is a function of its arguments: event,
//! memory-derived context, and thresholds in. Actions out. No I/O, no
//! clocks beyond deadline arithmetic, no memory mutation. The copilot
//! calls these after fetching context and (optionally) LLM-generated
//! drafts.

use serde_json::{json, Map, Value};

use maintpilot_core::{Action, ActionKind, Event, Priority, Severity};

use crate::providers::IncidentDraft;

/// Cap on a scheduled-maintenance deadline, hours from now.
const MAX_MAINTENANCE_DEADLINE_HOURS: f64 = 24.0;

/// Base priority from event severity, overridden to Critical when the
/// recent window already holds three or more critical events. The volume
/// override is independent of this event's own severity.
pub fn determine_priority(event: &Event, recent_events: &[Event]) -> Priority {
    let critical_count = recent_events
        .iter()
        .filter(|e| e.severity == Severity::Critical)
        .count();
    if critical_count >= 3 {
        return Priority::Critical;
    }

    match event.severity {
        Severity::Critical => Priority::Critical,
        Severity::Warning => Priority::High,
        Severity::Info => Priority::Medium,
    }
}

/// Whether the recent window alone warrants escalation to management.
pub fn should_escalate(recent_events: &[Event], escalation_threshold: usize) -> bool {
    recent_events
        .iter()
        .filter(|e| e.severity == Severity::Critical)
        .count()
        >= escalation_threshold
}

/// The volume-triggered Escalate action, always Critical.
pub fn escalation_action(event: &Event, recent_event_count: usize) -> Action {
    let mut details = Map::new();
    details.insert("event_count".into(), json!(recent_event_count));
    Action::new(
        ActionKind::Escalate,
        Priority::Critical,
        &event.tenant_id,
        &event.asset_id,
        "Multiple critical events detected - escalating to management",
        details,
    )
}

/// Whether an anomaly observation clears the incident-creation gate.
pub fn anomaly_warrants_incident(event: &Event, anomaly_threshold: f64) -> bool {
    let score = event.payload_f64("anomaly_score").unwrap_or(0.0);
    let risk = event.payload_str("risk_level").unwrap_or("normal");
    score >= anomaly_threshold || matches!(risk, "warning" | "critical")
}

/// Actions for an anomaly event that passed the gate: incident +
/// notification, plus a ticket when the priority is High or Critical.
pub fn anomaly_actions(event: &Event, priority: Priority, draft: &IncidentDraft) -> Vec<Action> {
    let mut actions = Vec::new();

    let mut incident_details = Map::new();
    incident_details.insert("full_description".into(), json!(draft.description));
    incident_details.insert("root_cause".into(), json!(draft.root_cause));
    incident_details.insert("suggested_actions".into(), json!(draft.actions));
    incident_details.insert("event_id".into(), json!(event.id));
    if let Some(features) = event
        .payload
        .get("explanation")
        .and_then(|e| e.get("top_features"))
    {
        incident_details.insert("top_features".into(), features.clone());
    }
    actions.push(Action::new(
        ActionKind::CreateIncident,
        priority,
        &event.tenant_id,
        &event.asset_id,
        &draft.title,
        incident_details,
    ));

    let mut notify_details = Map::new();
    notify_details.insert("channels".into(), json!(["email", "slack"]));
    actions.push(Action::new(
        ActionKind::SendNotification,
        priority,
        &event.tenant_id,
        &event.asset_id,
        format!("Anomaly detected: {}", draft.title),
        notify_details,
    ));

    if priority >= Priority::High {
        let mut ticket_details = Map::new();
        ticket_details.insert("system".into(), json!("jira"));
        ticket_details.insert("project".into(), json!("MAINT"));
        ticket_details.insert("issue_type".into(), json!("Incident"));
        ticket_details.insert("description".into(), json!(draft.description));
        actions.push(Action::new(
            ActionKind::CreateTicket,
            priority,
            &event.tenant_id,
            &event.asset_id,
            &draft.title,
            ticket_details,
        ));
    }

    actions
}

/// A drift observation only ever suggests retraining; it never escalates
/// to an incident on its own.
pub fn drift_actions(event: &Event, priority: Priority) -> Vec<Action> {
    let drift_score = event.payload_f64("drift_score").unwrap_or(0.0);
    let features: Vec<String> = event
        .payload
        .get("drifted_features")
        .and_then(Value::as_array)
        .map(|a| {
            a.iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();

    let listed = features
        .iter()
        .take(5)
        .cloned()
        .collect::<Vec<_>>()
        .join(", ");

    let mut details = Map::new();
    details.insert("action".into(), json!("retrain_model"));
    details.insert("drift_score".into(), json!(drift_score));
    details.insert("affected_features".into(), json!(features));
    details.insert(
        "recommendation".into(),
        json!(format!(
            "Feature distributions have shifted for: {listed}. \
             Consider retraining the anomaly detection model."
        )),
    );

    vec![Action::new(
        ActionKind::SuggestAction,
        priority,
        &event.tenant_id,
        &event.asset_id,
        "Data drift detected - consider model retraining",
        details,
    )]
}

/// Critical RUL always yields incident + schedule + ticket, all Critical,
/// regardless of the computed base priority.
pub fn critical_rul_actions(event: &Event, recommendation: &str) -> Vec<Action> {
    let rul_hours = event.payload_f64("rul_hours").unwrap_or(0.0);
    let deadline_hours = (rul_hours * 0.8).min(MAX_MAINTENANCE_DEADLINE_HOURS);

    let mut incident_details = Map::new();
    incident_details.insert("rul_hours".into(), json!(rul_hours));
    incident_details.insert("recommendation".into(), json!(recommendation));
    incident_details.insert("urgency".into(), json!("immediate"));
    incident_details.insert("event_id".into(), json!(event.id));

    let mut schedule_details = Map::new();
    schedule_details.insert("type".into(), json!("preventive"));
    schedule_details.insert("deadline_hours".into(), json!(deadline_hours));

    let mut ticket_details = Map::new();
    ticket_details.insert("system".into(), json!("jira"));
    ticket_details.insert("issue_type".into(), json!("Incident"));
    ticket_details.insert("priority".into(), json!("Highest"));

    vec![
        Action::new(
            ActionKind::CreateIncident,
            Priority::Critical,
            &event.tenant_id,
            &event.asset_id,
            format!("Critical: Only {rul_hours:.0} hours of useful life remaining"),
            incident_details,
        ),
        Action::new(
            ActionKind::ScheduleMaintenance,
            Priority::Critical,
            &event.tenant_id,
            &event.asset_id,
            "Schedule immediate maintenance",
            schedule_details,
        ),
        Action::new(
            ActionKind::CreateTicket,
            Priority::Critical,
            &event.tenant_id,
            &event.asset_id,
            format!("URGENT: Asset requires immediate maintenance (RUL: {rul_hours:.0}h)"),
            ticket_details,
        ),
    ]
}

/// A non-critical maintenance-due observation yields one suggestion with
/// the recommended window.
pub fn maintenance_due_actions(event: &Event, priority: Priority) -> Vec<Action> {
    let rul_hours = event.payload_f64("rul_hours").unwrap_or(100.0);

    let mut details = Map::new();
    details.insert("action".into(), json!("schedule_maintenance"));
    details.insert("rul_hours".into(), json!(rul_hours));
    details.insert(
        "recommendation".into(),
        json!(format!(
            "Based on RUL prediction, plan maintenance within the next {rul_hours:.0} hours."
        )),
    );

    vec![Action::new(
        ActionKind::SuggestAction,
        priority,
        &event.tenant_id,
        &event.asset_id,
        format!("Maintenance recommended within {rul_hours:.0} hours"),
        details,
    )]
}

/// Deterministic incident draft used when no LLM collaborator is
/// configured.
pub fn fallback_incident_draft(event: &Event) -> IncidentDraft {
    let top_features: Vec<(String, f64)> = event
        .payload
        .get("explanation")
        .and_then(|e| e.get("top_features"))
        .and_then(Value::as_array)
        .map(|a| {
            a.iter()
                .filter_map(|f| {
                    let name = f.get("feature")?.as_str()?.to_string();
                    let contribution = f.get("contribution").and_then(Value::as_f64).unwrap_or(0.0);
                    Some((name, contribution))
                })
                .collect()
        })
        .unwrap_or_default();

    let feature_desc = if top_features.is_empty() {
        String::new()
    } else {
        let listed = top_features
            .iter()
            .take(3)
            .map(|(name, contribution)| format!("{name} ({contribution:.2})"))
            .collect::<Vec<_>>()
            .join(", ");
        format!("Contributing factors: {listed}")
    };

    let root_cause_features = if top_features.is_empty() {
        "undetermined".to_string()
    } else {
        top_features
            .iter()
            .take(3)
            .map(|(name, _)| name.clone())
            .collect::<Vec<_>>()
            .join(", ")
    };

    IncidentDraft {
        title: format!("Anomaly detected on asset {}", event.asset_id),
        description: format!(
            "An anomaly was detected with score {:.2}.\n\n\
             Risk Level: {}\n\
             Time: {}\n\n\
             {}\n\n\
             Please investigate and take appropriate action.",
            event.payload_f64("anomaly_score").unwrap_or(0.0),
            event
                .payload_str("risk_level")
                .unwrap_or("unknown")
                .to_uppercase(),
            event.timestamp.to_rfc3339(),
            feature_desc,
        ),
        root_cause: format!(
            "Analysis indicates the primary contributing factors are: {root_cause_features}."
        ),
        actions: vec![
            "Review recent operational changes".to_string(),
            "Check sensor calibration status".to_string(),
            "Compare with historical baseline".to_string(),
            "Inspect physical components if accessible".to_string(),
        ],
    }
}

/// Deterministic maintenance recommendation used when no LLM collaborator
/// is configured.
pub fn fallback_recommendation(event: &Event) -> String {
    let rul = event.payload_f64("rul_hours").unwrap_or(0.0);
    format!(
        "Based on current predictions, this asset has approximately {rul:.0} hours \
         of remaining useful life. Recommend scheduling preventive maintenance within \
         the next {:.0} hours to avoid unplanned downtime.",
        (rul * 0.5).min(MAX_MAINTENANCE_DEADLINE_HOURS)
    )
}

/// Classify RUL hours into a severity band.
pub fn rul_severity(rul_hours: f64) -> Severity {
    if rul_hours < 10.0 {
        Severity::Critical
    } else if rul_hours < 50.0 {
        Severity::Warning
    } else {
        Severity::Info
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use maintpilot_core::EventKind;

    fn event_with(kind: EventKind, severity: Severity, payload: Map<String, Value>) -> Event {
        Event::new(kind, "tenant-1", "asset-1", severity, payload)
    }

    fn critical_events(n: usize) -> Vec<Event> {
        (0..n)
            .map(|_| {
                event_with(
                    EventKind::AnomalyDetected,
                    Severity::Critical,
                    Map::new(),
                )
            })
            .collect()
    }

    fn anomaly_payload(score: f64, risk: &str) -> Map<String, Value> {
        let mut payload = Map::new();
        payload.insert("anomaly_score".into(), json!(score));
        payload.insert("risk_level".into(), json!(risk));
        payload
    }

    #[test]
    fn test_base_priority_from_severity() {
        let recent = vec![];
        assert_eq!(
            determine_priority(
                &event_with(EventKind::AnomalyDetected, Severity::Critical, Map::new()),
                &recent
            ),
            Priority::Critical
        );
        assert_eq!(
            determine_priority(
                &event_with(EventKind::AnomalyDetected, Severity::Warning, Map::new()),
                &recent
            ),
            Priority::High
        );
        assert_eq!(
            determine_priority(
                &event_with(EventKind::AnomalyDetected, Severity::Info, Map::new()),
                &recent
            ),
            Priority::Medium
        );
    }

    #[test]
    fn test_volume_override_is_independent_of_event_severity() {
        let info_event = event_with(EventKind::AnomalyDetected, Severity::Info, Map::new());
        assert_eq!(
            determine_priority(&info_event, &critical_events(3)),
            Priority::Critical
        );
        assert_eq!(
            determine_priority(&info_event, &critical_events(2)),
            Priority::Medium
        );
    }

    #[test]
    fn test_should_escalate_threshold() {
        assert!(should_escalate(&critical_events(3), 3));
        assert!(should_escalate(&critical_events(4), 3));
        assert!(!should_escalate(&critical_events(2), 3));

        // non-critical events never count
        let mut mixed = critical_events(2);
        mixed.push(event_with(
            EventKind::AnomalyDetected,
            Severity::Warning,
            Map::new(),
        ));
        assert!(!should_escalate(&mixed, 3));
    }

    #[test]
    fn test_anomaly_gate() {
        let high_score = event_with(
            EventKind::AnomalyDetected,
            Severity::Info,
            anomaly_payload(0.9, "normal"),
        );
        assert!(anomaly_warrants_incident(&high_score, 0.7));

        let risky = event_with(
            EventKind::AnomalyDetected,
            Severity::Warning,
            anomaly_payload(0.2, "critical"),
        );
        assert!(anomaly_warrants_incident(&risky, 0.7));

        let benign = event_with(
            EventKind::AnomalyDetected,
            Severity::Info,
            anomaly_payload(0.2, "normal"),
        );
        assert!(!anomaly_warrants_incident(&benign, 0.7));
    }

    #[test]
    fn test_anomaly_actions_composition() {
        let event = event_with(
            EventKind::AnomalyDetected,
            Severity::Critical,
            anomaly_payload(0.9, "critical"),
        );
        let draft = fallback_incident_draft(&event);

        let critical = anomaly_actions(&event, Priority::Critical, &draft);
        let kinds: Vec<ActionKind> = critical.iter().map(|a| a.kind).collect();
        assert_eq!(
            kinds,
            vec![
                ActionKind::CreateIncident,
                ActionKind::SendNotification,
                ActionKind::CreateTicket
            ]
        );

        let medium = anomaly_actions(&event, Priority::Medium, &draft);
        assert_eq!(medium.len(), 2);
        assert!(medium.iter().all(|a| a.kind != ActionKind::CreateTicket));
    }

    #[test]
    fn test_drift_never_creates_incident() {
        let mut payload = Map::new();
        payload.insert("drift_score".into(), json!(0.8));
        payload.insert(
            "drifted_features".into(),
            json!(["temp", "vibration", "pressure"]),
        );
        let event = event_with(EventKind::DriftDetected, Severity::Warning, payload);

        let actions = drift_actions(&event, Priority::High);
        assert_eq!(actions.len(), 1);
        assert_eq!(actions[0].kind, ActionKind::SuggestAction);
        let rec = actions[0].detail_str("recommendation").unwrap();
        assert!(rec.contains("temp, vibration, pressure"));
    }

    #[test]
    fn test_critical_rul_yields_three_critical_actions() {
        let mut payload = Map::new();
        payload.insert("rul_hours".into(), json!(12.0));
        let event = event_with(EventKind::RulCritical, Severity::Critical, payload);

        let actions = critical_rul_actions(&event, "rec");
        let kinds: Vec<ActionKind> = actions.iter().map(|a| a.kind).collect();
        assert_eq!(
            kinds,
            vec![
                ActionKind::CreateIncident,
                ActionKind::ScheduleMaintenance,
                ActionKind::CreateTicket
            ]
        );
        assert!(actions.iter().all(|a| a.priority == Priority::Critical));

        // deadline = min(12 * 0.8, 24) = 9.6h
        let deadline = actions[1].detail_f64("deadline_hours").unwrap();
        assert!((deadline - 9.6).abs() < 1e-9);
    }

    #[test]
    fn test_rul_deadline_is_capped() {
        let mut payload = Map::new();
        payload.insert("rul_hours".into(), json!(40.0));
        let event = event_with(EventKind::RulCritical, Severity::Warning, payload);

        let actions = critical_rul_actions(&event, "rec");
        assert_eq!(actions[1].detail_f64("deadline_hours").unwrap(), 24.0);
    }

    #[test]
    fn test_maintenance_due_single_suggestion() {
        let mut payload = Map::new();
        payload.insert("rul_hours".into(), json!(40.0));
        let event = event_with(EventKind::MaintenanceDue, Severity::Warning, payload);

        let actions = maintenance_due_actions(&event, Priority::High);
        assert_eq!(actions.len(), 1);
        assert_eq!(actions[0].kind, ActionKind::SuggestAction);
        assert!(actions[0].description.contains("40 hours"));
    }

    #[test]
    fn test_rul_severity_bands() {
        assert_eq!(rul_severity(5.0), Severity::Critical);
        assert_eq!(rul_severity(30.0), Severity::Warning);
        assert_eq!(rul_severity(100.0), Severity::Info);
    }

    #[test]
    fn test_fallback_draft_with_features() {
        let mut payload = anomaly_payload(0.85, "critical");
        payload.insert(
            "explanation".into(),
            json!({"top_features": [
                {"feature": "bearing_temp", "contribution": 0.4},
                {"feature": "vibration_rms", "contribution": 0.3},
            ]}),
        );
        let event = event_with(EventKind::AnomalyDetected, Severity::Critical, payload);

        let draft = fallback_incident_draft(&event);
        assert!(draft.title.contains("asset-1"));
        assert!(draft.description.contains("0.85"));
        assert!(draft.description.contains("CRITICAL"));
        assert!(draft.root_cause.contains("bearing_temp"));
        assert_eq!(draft.actions.len(), 4);
    }

    #[test]
    fn test_fallback_draft_without_features() {
        let event = event_with(
            EventKind::AnomalyDetected,
            Severity::Warning,
            anomaly_payload(0.75, "warning"),
        );
        let draft = fallback_incident_draft(&event);
        assert!(draft.root_cause.contains("undetermined"));
    }
}
