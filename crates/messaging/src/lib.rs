//! Direct messaging core
//!
//! Derives per-counterpart conversation threads from the flat append-only
//! message log, tracks read/unread state, and keeps the client view
//! approximately fresh by polling. Features include:
//! - Conversation list aggregation with unread counts
//! - Automatic read-marking when a conversation is opened
//! - Per-view refresh timers with clean mount/unmount lifecycle
//! - Chat transcripts with day separators, sender runs and read receipts
//! - Provisional conversations for newly started chats

pub mod badge;
pub mod chat;
pub mod conversations;
pub mod error;
pub mod read_state;

pub use badge::UnreadBadgeView;
pub use chat::{
    build_transcript, ChatSession, MessageGroup, Receipt, TranscriptEntry, TranscriptItem,
};
pub use conversations::{aggregate, Conversation, ConversationListView, ConversationStats};
pub use error::{MessagingError, Result};
pub use read_state::ReadStateTracker;
