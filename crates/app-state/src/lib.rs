//! Reactive client state for Reelhouse views
//!
//! Polling schedulers, cache invalidation, unread badge state and the viewer
//! session. Nothing here knows about messages or profiles; the messaging core
//! plugs its refresh logic into these primitives.

pub mod invalidation;
pub mod scheduler;
pub mod session;
pub mod unread;

pub use invalidation::{forward_invalidations, Invalidation, InvalidationBus};
pub use scheduler::{
    RefreshHandle, RefreshNotifier, ViewTimer, CONVERSATION_LIST_INTERVAL, TRANSCRIPT_INTERVAL,
    UNREAD_BADGE_INTERVAL,
};
pub use session::{SessionError, SessionState};
pub use unread::{BadgeDisplay, UnreadBadge, MAX_BADGE_COUNT};
