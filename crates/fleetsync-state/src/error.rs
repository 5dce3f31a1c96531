//! Error types for the fleetsync store boundary.

use thiserror::Error;

/// Result type alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors that can occur while talking to a key-value store.
///
/// A missing key is never an error here: lookups return `Option` so
/// callers can tell "absent" apart from "could not ask".
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to open database: {0}")]
    Open(String),

    #[error("transaction error: {0}")]
    Transaction(String),

    #[error("table error: {0}")]
    Table(String),

    #[error("read error: {0}")]
    Read(String),

    #[error("write error: {0}")]
    Write(String),

    #[error("serialization error: {0}")]
    Serialize(String),

    #[error("deserialization error: {0}")]
    Deserialize(String),

    /// The store could not be reached (connect, handshake, timeout).
    #[error("store unreachable: {0}")]
    Unreachable(String),

    /// The store answered, but not in a way we understand.
    #[error("protocol error: {0}")]
    Protocol(String),
}

impl StoreError {
    /// Whether the failure is about connectivity rather than data.
    pub fn is_unreachable(&self) -> bool {
        matches!(self, StoreError::Unreachable(_))
    }
}
