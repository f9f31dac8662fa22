//! Collaborator contracts consumed by the messaging core
//!
//! Persistent storage, authentication and the rest of the CRUD application
//! live behind these two traits. The messaging core only ever awaits them
//! request/response style; nothing here is streamed.

use async_trait::async_trait;
use std::collections::HashMap;

use crate::error::Result;
use crate::types::{Message, Profile};

/// Durable append-only log of direct messages
#[async_trait]
pub trait MessageStore: Send + Sync {
    /// Append a new message to the log
    ///
    /// Fails with [`crate::StoreError::Write`] on storage or network failure.
    async fn create(
        &self,
        sender_id: &str,
        receiver_id: &str,
        content: &str,
        subject: &str,
    ) -> Result<Message>;

    /// All messages where `user_id` is sender or receiver, newest-first
    async fn list_for_user(&self, user_id: &str) -> Result<Vec<Message>>;

    /// Messages between the pair, oldest-first
    async fn list_between(&self, user_id: &str, counterpart_id: &str) -> Result<Vec<Message>>;

    /// Set `is_read = true` for the given message ids
    ///
    /// Idempotent: ids that are already read (or unknown) match nothing and
    /// do not error.
    async fn mark_read(&self, ids: &[String]) -> Result<()>;

    /// Count of messages where `receiver_id = user_id` and `is_read = false`
    async fn count_unread(&self, user_id: &str) -> Result<u64>;
}

/// Resolves user ids to display profiles
#[async_trait]
pub trait ProfileLookup: Send + Sync {
    /// Resolve a batch of ids
    ///
    /// Ids that cannot be resolved are simply absent from the map; callers
    /// substitute [`Profile::placeholder`].
    async fn get_many(&self, ids: &[String]) -> Result<HashMap<String, Profile>>;

    /// Search profiles by display name, excluding `excluding` (usually self)
    async fn search_by_name(
        &self,
        query: &str,
        excluding: &str,
        limit: usize,
    ) -> Result<Vec<Profile>>;
}
