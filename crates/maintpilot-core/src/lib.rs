//! maintpilot-core
//!
//! Shared value types for the maintpilot decision agent:
//!
//! - [`types`]: severity, priority, and event/action kind enums
//! - [`events`]: the Event / Action / Incident records exchanged between
//!   the agent loop, its executors, and the delivery substrate
//! - [`config`]: workspace-wide configuration with YAML + env loading
//! - [`error`]: the crate-wide error type and `Result` alias

pub mod config;
pub mod error;
pub mod events;
pub mod types;

pub use config::{Config, CopilotConfig, DeliveryConfig, MonitorConfig};
pub use error::{Error, Result};
pub use events::{Action, Event, Incident, IncidentStatus, Payload};
pub use types::{ActionKind, EventKind, Priority, Severity};
