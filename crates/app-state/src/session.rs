//! Viewer session state
//!
//! Tracks which user, if any, is signed in. Messaging views require a viewer
//! id at construction; when no viewer is present the messaging UI is simply
//! not built (suppression, not an error toast).

use thiserror::Error;
use tokio::sync::watch;

/// Session errors
#[derive(Debug, Error)]
pub enum SessionError {
    /// No viewer id available
    #[error("not authenticated")]
    NotAuthenticated,
}

/// Reactive holder of the current viewer id
pub struct SessionState {
    tx: watch::Sender<Option<String>>,
}

impl SessionState {
    /// Create a signed-out session
    pub fn new() -> Self {
        let (tx, _) = watch::channel(None);
        Self { tx }
    }

    /// Set the signed-in viewer
    pub fn set_viewer(&self, user_id: impl Into<String>) {
        let _ = self.tx.send(Some(user_id.into()));
    }

    /// Sign out
    pub fn clear(&self) {
        let _ = self.tx.send(None);
    }

    /// Current viewer id, if signed in
    pub fn viewer(&self) -> Option<String> {
        self.tx.borrow().clone()
    }

    /// Current viewer id, or [`SessionError::NotAuthenticated`]
    pub fn require_viewer(&self) -> Result<String, SessionError> {
        self.viewer().ok_or(SessionError::NotAuthenticated)
    }

    /// Whether a viewer is signed in
    pub fn is_authenticated(&self) -> bool {
        self.tx.borrow().is_some()
    }

    /// Subscribe to sign-in/sign-out transitions
    pub fn subscribe(&self) -> watch::Receiver<Option<String>> {
        self.tx.subscribe()
    }
}

impl Default for SessionState {
    fn default() -> Self {
        Self::new()
    }
}
