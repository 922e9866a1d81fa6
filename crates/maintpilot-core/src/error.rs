//! Error types for the maintpilot workspace.

use thiserror::Error;

/// Workspace-wide error type.
#[derive(Debug, Error)]
pub enum Error {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("collaborator error: {0}")]
    Provider(String),

    #[error("collaborator call timed out after {0}s")]
    ProviderTimeout(u64),

    #[error("delivery error: {0}")]
    Delivery(String),

    #[error("action {0} was already executed")]
    AlreadyExecuted(String),

    #[error("agent is not running")]
    NotRunning,

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Convenience alias used across the workspace.
pub type Result<T> = std::result::Result<T, Error>;
