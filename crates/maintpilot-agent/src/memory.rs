//! AgentMemory: the copilot's bounded working set.
//!
//! Events live in a FIFO ring buffer (capacity `max_events`); eviction is
//! lossy by design and only used for recency heuristics — the incident
//! system of record lives outside this process. Every read filters by
//! tenant first, and all reads are total: unknown tenants, assets, or ids
//! yield empty collections, never errors.
//!
//! Producers append from many tasks while the single copilot loop reads;
//! each store sits behind its own lock so appends and the capacity
//! eviction are atomic.

use std::collections::VecDeque;
use std::sync::RwLock;

use chrono::{Duration, Utc};
use dashmap::DashMap;
use serde_json::{Map, Value};
use tracing::debug;

use maintpilot_core::config::DEFAULT_MAX_EVENTS;
use maintpilot_core::{Action, ActionKind, Event, EventKind, Incident};

/// Default limit for similar-incident lookups.
pub const DEFAULT_SIMILAR_LIMIT: usize = 5;

#[derive(Debug)]
pub struct AgentMemory {
    max_events: usize,
    events: RwLock<VecDeque<Event>>,
    incidents: RwLock<Vec<Incident>>,
    asset_context: DashMap<String, Map<String, Value>>,
    action_history: RwLock<Vec<Action>>,
}

impl Default for AgentMemory {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_EVENTS)
    }
}

impl AgentMemory {
    pub fn new(max_events: usize) -> Self {
        Self {
            max_events: max_events.max(1),
            events: RwLock::new(VecDeque::with_capacity(max_events.min(1024))),
            incidents: RwLock::new(Vec::new()),
            asset_context: DashMap::new(),
            action_history: RwLock::new(Vec::new()),
        }
    }

    /// Append an event, evicting the oldest entries beyond capacity.
    pub fn add_event(&self, event: Event) {
        let mut events = self.events.write().unwrap();
        events.push_back(event);
        while events.len() > self.max_events {
            events.pop_front();
        }
    }

    /// Events in the trailing `hours` window for a tenant, optionally
    /// narrowed by asset and kind. Insertion order, oldest first.
    pub fn get_recent_events(
        &self,
        tenant_id: &str,
        asset_id: Option<&str>,
        kind: Option<EventKind>,
        hours: i64,
    ) -> Vec<Event> {
        let cutoff = Utc::now() - Duration::hours(hours);
        self.events
            .read()
            .unwrap()
            .iter()
            .filter(|e| e.tenant_id == tenant_id)
            .filter(|e| e.timestamp >= cutoff)
            .filter(|e| asset_id.map_or(true, |a| e.asset_id == a))
            .filter(|e| kind.map_or(true, |k| e.kind == k))
            .cloned()
            .collect()
    }

    /// Flip the `processed` flag on the stored copy of an event.
    pub fn mark_processed(&self, event_id: &str) {
        let mut events = self.events.write().unwrap();
        if let Some(event) = events.iter_mut().find(|e| e.id == event_id) {
            event.processed = true;
        }
    }

    pub fn event_count(&self) -> usize {
        self.events.read().unwrap().len()
    }

    pub fn add_incident(&self, incident: Incident) {
        debug!(incident_id = %incident.id, asset_id = %incident.asset_id, "incident cached");
        let mut incidents = self.incidents.write().unwrap();
        if let Some(existing) = incidents.iter_mut().find(|i| i.id == incident.id) {
            *existing = incident;
        } else {
            incidents.push(incident);
        }
    }

    pub fn get_incident(&self, incident_id: &str) -> Option<Incident> {
        self.incidents
            .read()
            .unwrap()
            .iter()
            .find(|i| i.id == incident_id)
            .cloned()
    }

    /// Historical incidents for the same tenant and asset, insertion
    /// order, truncated to `limit`.
    ///
    /// Deliberately no similarity ranking: an upstream collaborator may
    /// substitute real similarity search, but this store must not reorder
    /// behind its back.
    pub fn get_similar_incidents(
        &self,
        tenant_id: &str,
        asset_id: &str,
        limit: usize,
    ) -> Vec<Incident> {
        self.incidents
            .read()
            .unwrap()
            .iter()
            .filter(|i| i.tenant_id == tenant_id && i.asset_id == asset_id)
            .take(limit)
            .cloned()
            .collect()
    }

    pub fn incident_count(&self) -> usize {
        self.incidents.read().unwrap().len()
    }

    /// Shallow-merge `context` into an asset's context overlay. Existing
    /// keys not present in `context` are kept.
    pub fn update_asset_context(&self, asset_id: &str, context: Map<String, Value>) {
        let mut entry = self
            .asset_context
            .entry(asset_id.to_string())
            .or_default();
        for (key, value) in context {
            entry.insert(key, value);
        }
    }

    pub fn get_asset_context(&self, asset_id: &str) -> Map<String, Value> {
        self.asset_context
            .get(asset_id)
            .map(|c| c.clone())
            .unwrap_or_default()
    }

    pub fn record_action(&self, action: Action) {
        self.action_history.write().unwrap().push(action);
    }

    /// The most recent `limit` suggestion actions recorded for an asset,
    /// oldest first.
    pub fn recent_suggestions(&self, asset_id: &str, limit: usize) -> Vec<Action> {
        let history = self.action_history.read().unwrap();
        let matching: Vec<Action> = history
            .iter()
            .filter(|a| a.asset_id == asset_id && a.kind == ActionKind::SuggestAction)
            .cloned()
            .collect();
        let skip = matching.len().saturating_sub(limit);
        matching.into_iter().skip(skip).collect()
    }

    pub fn action_history(&self) -> Vec<Action> {
        self.action_history.read().unwrap().clone()
    }
}
