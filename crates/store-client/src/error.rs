//! Store error types

use thiserror::Error;

/// Errors returned by store collaborators
///
/// The split mirrors how callers react: write failures are surfaced to the
/// user and leave local state unchanged, read failures are logged and retried
/// on the next scheduled refresh.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A create or mark-read call failed (storage or network)
    #[error("write failed: {0}")]
    Write(String),

    /// A list or count call failed (storage or network)
    #[error("read failed: {0}")]
    Read(String),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Client configuration was invalid
    #[error("invalid client config: {0}")]
    Config(String),
}

impl StoreError {
    /// Whether this error came from a write-path call
    pub fn is_write(&self) -> bool {
        matches!(self, StoreError::Write(_))
    }

    /// Whether this error came from a read-path call
    pub fn is_read(&self) -> bool {
        matches!(self, StoreError::Read(_))
    }
}

/// Result type for store operations
pub type Result<T> = std::result::Result<T, StoreError>;
