//! maintpilot-agent
//!
//! The autonomous decision core: an observe → reason → act loop over
//! asset-health events.
//!
//! - [`memory`]: bounded in-process working set (events, incidents,
//!   per-asset context, action history)
//! - [`reasoning`]: pure rule functions mapping an event plus memory
//!   context to a list of actions
//! - [`providers`]: collaborator traits (LLM, ticketing, notification);
//!   all optional, with deterministic fallbacks
//! - [`executors`]: one executor per action kind
//! - [`copilot`]: the MaintenanceCopilot single-consumer loop
//! - [`monitor`]: ingestion-side gates turning raw prediction results into
//!   events
//! - [`service`]: explicit dependency-injected lifecycle wrapper

pub mod copilot;
pub mod executors;
pub mod memory;
pub mod monitor;
pub mod providers;
pub mod reasoning;
pub mod service;

pub use copilot::MaintenanceCopilot;
pub use memory::AgentMemory;
pub use monitor::EventMonitor;
pub use providers::{
    IncidentDraft, LlmProvider, MockLlm, MockNotifier, MockTicketing, Notification,
    NotificationProvider, TicketProvider, TicketReceipt, TicketRequest,
};
pub use service::{CopilotService, SuggestionEntry, SuggestionsReport};
