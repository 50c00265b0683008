//! Daemon error types.

use thiserror::Error;

use boxoffice_clients::ClientError;
use boxoffice_orchestrator::OrchestratorError;
use boxoffice_store::StoreError;

/// Daemon-level errors.
#[derive(Debug, Error)]
pub enum DaemonError {
    /// Orchestration error
    #[error("Orchestrator error: {0}")]
    Orchestrator(#[from] OrchestratorError),

    /// Store error
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Client construction error
    #[error("Client error: {0}")]
    Client(#[from] ClientError),

    /// Metrics registration error
    #[error("Metrics error: {0}")]
    Metrics(#[from] prometheus::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Result type for daemon operations.
pub type DaemonResult<T> = Result<T, DaemonError>;
