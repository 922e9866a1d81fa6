//! Event, Action, and Incident records.
//!
//! These are the immutable facts and directives exchanged between the
//! monitor, the copilot loop, the executors, and the delivery substrate.
//! Apart from `Event::processed` and `Action::{executed, result}`, records
//! are never mutated after creation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::types::{ActionKind, EventKind, Priority, Severity};

/// Opaque key-value payload carried by events and actions.
pub type Payload = Map<String, Value>;

/// An immutable fact observed by the agent.
///
/// An event belongs to exactly one tenant and one asset; every memory read
/// filters on `tenant_id` first, so cross-tenant visibility is impossible
/// downstream of construction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub id: String,
    pub kind: EventKind,
    pub tenant_id: String,
    pub asset_id: String,
    pub timestamp: DateTime<Utc>,
    pub severity: Severity,
    #[serde(default)]
    pub payload: Payload,
    /// Set exactly once, after the event has been routed through the loop.
    #[serde(default)]
    pub processed: bool,
}

impl Event {
    /// Create a new event stamped with the current time and a fresh id.
    pub fn new(
        kind: EventKind,
        tenant_id: impl Into<String>,
        asset_id: impl Into<String>,
        severity: Severity,
        payload: Payload,
    ) -> Self {
        Self {
            id: format!("{}_{}", kind.as_str(), Uuid::new_v4()),
            kind,
            tenant_id: tenant_id.into(),
            asset_id: asset_id.into(),
            timestamp: Utc::now(),
            severity,
            payload,
            processed: false,
        }
    }

    /// Read a numeric payload field, tolerating both integer and float JSON.
    pub fn payload_f64(&self, key: &str) -> Option<f64> {
        self.payload.get(key).and_then(Value::as_f64)
    }

    /// Read a string payload field.
    pub fn payload_str(&self, key: &str) -> Option<&str> {
        self.payload.get(key).and_then(Value::as_str)
    }
}

/// A directive produced by reasoning, to be executed at most once.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Action {
    pub id: String,
    pub kind: ActionKind,
    pub priority: Priority,
    pub tenant_id: String,
    pub asset_id: String,
    pub description: String,
    #[serde(default)]
    pub details: Payload,
    pub created_at: DateTime<Utc>,
    /// Transitions false -> true exactly once, inside `act()`.
    #[serde(default)]
    pub executed: bool,
    /// Set iff `executed` is true; holds the structured execution outcome,
    /// success or failure.
    #[serde(default)]
    pub result: Option<Payload>,
}

impl Action {
    pub fn new(
        kind: ActionKind,
        priority: Priority,
        tenant_id: impl Into<String>,
        asset_id: impl Into<String>,
        description: impl Into<String>,
        details: Payload,
    ) -> Self {
        Self {
            id: format!("{}_{}", kind.as_str(), Uuid::new_v4()),
            kind,
            priority,
            tenant_id: tenant_id.into(),
            asset_id: asset_id.into(),
            description: description.into(),
            details,
            created_at: Utc::now(),
            executed: false,
            result: None,
        }
    }

    pub fn detail_str(&self, key: &str) -> Option<&str> {
        self.details.get(key).and_then(Value::as_str)
    }

    pub fn detail_f64(&self, key: &str) -> Option<f64> {
        self.details.get(key).and_then(Value::as_f64)
    }
}

/// Lifecycle status of an incident.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IncidentStatus {
    Open,
    Resolved,
}

/// A durable summary of a remediation episode.
///
/// Created only by the create-incident executor and kept in agent memory
/// for similarity lookups; the system of record lives outside this process.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Incident {
    pub id: String,
    pub tenant_id: String,
    pub asset_id: String,
    pub title: String,
    pub description: String,
    pub severity: Priority,
    pub root_cause_analysis: String,
    pub suggested_actions: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub related_event_ids: Vec<String>,
    pub status: IncidentStatus,
    pub ticket_id: Option<String>,
}

impl Incident {
    /// Time-based incident id: `INC-YYYYmmddHHMMSS-xxxxxxxx`.
    ///
    /// The short uuid suffix disambiguates incidents created within the
    /// same second.
    pub fn generate_id(now: DateTime<Utc>) -> String {
        let suffix = Uuid::new_v4().simple().to_string();
        format!("INC-{}-{}", now.format("%Y%m%d%H%M%S"), &suffix[..8])
    }
}
