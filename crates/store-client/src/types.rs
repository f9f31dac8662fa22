//! Core data types for direct messaging

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Subject line stamped on every direct message created by this subsystem
pub const DIRECT_MESSAGE_SUBJECT: &str = "Direct Message";

/// Display name substituted when a profile id cannot be resolved
pub const UNKNOWN_USER_NAME: &str = "Unknown User";

/// A direct message in the append-only log
///
/// Immutable except for `is_read`, which only ever transitions `false → true`.
/// Messages are never deleted or edited by this subsystem.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    /// Message id
    pub id: String,
    /// Sender user id
    pub sender_id: String,
    /// Receiver user id
    pub receiver_id: String,
    /// Message body
    pub content: String,
    /// Subject line (always [`DIRECT_MESSAGE_SUBJECT`] for chat messages)
    pub subject: String,
    /// Whether the receiver has seen this message
    pub is_read: bool,
    /// When the message was created
    pub created_at: DateTime<Utc>,
}

impl Message {
    /// The other participant's id, relative to `self_id`
    pub fn counterpart_of(&self, self_id: &str) -> &str {
        if self.sender_id == self_id {
            &self.receiver_id
        } else {
            &self.sender_id
        }
    }

    /// Whether this message is addressed to `self_id` and still unread
    pub fn is_unread_for(&self, self_id: &str) -> bool {
        self.receiver_id == self_id && !self.is_read
    }

    /// Whether `self_id` sent this message
    pub fn is_from(&self, self_id: &str) -> bool {
        self.sender_id == self_id
    }
}

/// A user profile as resolved by [`crate::ProfileLookup`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    /// User id
    pub id: String,
    /// Display name
    pub display_name: String,
    /// Avatar URL, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
}

impl Profile {
    /// Create a new profile
    pub fn new(id: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            display_name: display_name.into(),
            avatar_url: None,
        }
    }

    /// Set the avatar URL
    pub fn with_avatar(mut self, url: impl Into<String>) -> Self {
        self.avatar_url = Some(url.into());
        self
    }

    /// Placeholder profile for an id that could not be resolved
    pub fn placeholder(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            display_name: UNKNOWN_USER_NAME.to_string(),
            avatar_url: None,
        }
    }
}
