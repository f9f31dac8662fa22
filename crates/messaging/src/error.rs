//! Messaging error types

use app_state::SessionError;
use store_client::StoreError;
use thiserror::Error;

/// Errors surfaced by the messaging core
///
/// Store write failures are surfaced to the user with local state unchanged;
/// store read failures during background refreshes are logged and retried on
/// the next tick rather than shown.
#[derive(Debug, Error)]
pub enum MessagingError {
    /// Store collaborator failed
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Attempted to send an empty or whitespace-only message
    #[error("message is empty")]
    EmptyMessage,

    /// No signed-in viewer
    #[error(transparent)]
    Session(#[from] SessionError),
}

impl MessagingError {
    /// Whether this is a write-path failure (surfaced to the user)
    pub fn is_write(&self) -> bool {
        matches!(self, MessagingError::Store(e) if e.is_write())
    }

    /// Whether this is a read-path failure (logged, retried next tick)
    pub fn is_read(&self) -> bool {
        matches!(self, MessagingError::Store(e) if e.is_read())
    }
}

/// Result type for messaging operations
pub type Result<T> = std::result::Result<T, MessagingError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_error_classification() {
        let write: MessagingError = StoreError::Write("boom".into()).into();
        assert!(write.is_write());
        assert!(!write.is_read());

        let read: MessagingError = StoreError::Read("boom".into()).into();
        assert!(read.is_read());

        assert!(!MessagingError::EmptyMessage.is_write());
        assert!(!MessagingError::EmptyMessage.is_read());
    }
}
