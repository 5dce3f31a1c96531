//! Error types for the orchestrator.

use fleetsync_state::StoreError;
use thiserror::Error;

/// Result type alias for orchestrator operations.
pub type OrchestrateResult<T> = Result<T, OrchestrateError>;

/// Errors surfaced by the version coordinator and status tracker.
#[derive(Debug, Error)]
pub enum OrchestrateError {
    /// A key or resource that callers must handle explicitly is absent.
    #[error("not found: {0}")]
    NotFound(String),

    /// The shared store could not be reached or answered badly.
    #[error(transparent)]
    Unreachable(#[from] StoreError),

    /// Caller bug: unknown check type, malformed input.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Local version marker storage failed for a reason other than absence.
    #[error("local version marker: {0}")]
    Io(#[from] std::io::Error),

    #[error("config error: {0}")]
    Config(String),
}
