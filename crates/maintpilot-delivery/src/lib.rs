//! maintpilot-delivery
//!
//! Outbound webhook substrate: per-endpoint event filtering, HMAC-SHA256
//! payload signing, linear-backoff retries, and an in-memory delivery audit
//! log.
//!
//! Delivery here is at-least-once and best-effort: a failed delivery is a
//! terminal, recorded outcome, never an error surfaced to the caller.
//! Callers that need guaranteed hand-off must inspect the returned statuses
//! and compensate through another channel.

pub mod endpoint;
pub mod service;
pub mod signature;

pub use endpoint::{DeliveryRecord, DeliveryStatus, WebhookEndpoint, WebhookEvent};
pub use service::{DeliveryResult, DeliveryService, WebhookManager};
pub use signature::{sign, signature_header, verify_signature};
