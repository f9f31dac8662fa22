//! In-memory store implementation
//!
//! Backs tests and local development with the exact ordering contracts of the
//! hosted API: `list_for_user` newest-first, `list_between` oldest-first.
//! Write and read failures can be injected to exercise error paths.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use tokio::sync::RwLock;

use crate::error::{Result, StoreError};
use crate::store::{MessageStore, ProfileLookup};
use crate::types::{Message, Profile};

/// In-memory [`MessageStore`] and [`ProfileLookup`]
#[derive(Default)]
pub struct MemoryStore {
    messages: RwLock<Vec<Message>>,
    profiles: RwLock<HashMap<String, Profile>>,
    next_id: AtomicU64,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
}

impl MemoryStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a profile for lookup and search
    pub async fn add_profile(&self, profile: Profile) {
        self.profiles
            .write()
            .await
            .insert(profile.id.clone(), profile);
    }

    /// Insert a pre-built message (test setup)
    pub async fn insert_message(&self, message: Message) {
        self.messages.write().await.push(message);
    }

    /// Make all read-path calls fail until cleared
    pub fn set_fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    /// Make all write-path calls fail until cleared
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Look up a message by id
    pub async fn get(&self, id: &str) -> Option<Message> {
        self.messages
            .read()
            .await
            .iter()
            .find(|m| m.id == id)
            .cloned()
    }

    /// Total number of stored messages
    pub async fn len(&self) -> usize {
        self.messages.read().await.len()
    }

    /// Whether the store holds no messages
    pub async fn is_empty(&self) -> bool {
        self.messages.read().await.is_empty()
    }

    fn check_read(&self) -> Result<()> {
        if self.fail_reads.load(Ordering::SeqCst) {
            Err(StoreError::Read("simulated network error".to_string()))
        } else {
            Ok(())
        }
    }

    fn check_write(&self) -> Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            Err(StoreError::Write("simulated network error".to_string()))
        } else {
            Ok(())
        }
    }

    /// Build a message with an allocated id and the given timestamp
    pub fn build_message(
        &self,
        sender_id: &str,
        receiver_id: &str,
        content: &str,
        subject: &str,
        created_at: DateTime<Utc>,
    ) -> Message {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        Message {
            id: format!("msg-{}", id),
            sender_id: sender_id.to_string(),
            receiver_id: receiver_id.to_string(),
            content: content.to_string(),
            subject: subject.to_string(),
            is_read: false,
            created_at,
        }
    }
}

#[async_trait]
impl MessageStore for MemoryStore {
    async fn create(
        &self,
        sender_id: &str,
        receiver_id: &str,
        content: &str,
        subject: &str,
    ) -> Result<Message> {
        self.check_write()?;
        let message = self.build_message(sender_id, receiver_id, content, subject, Utc::now());
        self.messages.write().await.push(message.clone());
        Ok(message)
    }

    async fn list_for_user(&self, user_id: &str) -> Result<Vec<Message>> {
        self.check_read()?;
        let mut messages: Vec<Message> = self
            .messages
            .read()
            .await
            .iter()
            .filter(|m| m.sender_id == user_id || m.receiver_id == user_id)
            .cloned()
            .collect();
        messages.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(messages)
    }

    async fn list_between(&self, user_id: &str, counterpart_id: &str) -> Result<Vec<Message>> {
        self.check_read()?;
        let mut messages: Vec<Message> = self
            .messages
            .read()
            .await
            .iter()
            .filter(|m| {
                (m.sender_id == user_id && m.receiver_id == counterpart_id)
                    || (m.sender_id == counterpart_id && m.receiver_id == user_id)
            })
            .cloned()
            .collect();
        messages.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(messages)
    }

    async fn mark_read(&self, ids: &[String]) -> Result<()> {
        self.check_write()?;
        let mut messages = self.messages.write().await;
        for message in messages.iter_mut() {
            if !message.is_read && ids.contains(&message.id) {
                message.is_read = true;
            }
        }
        Ok(())
    }

    async fn count_unread(&self, user_id: &str) -> Result<u64> {
        self.check_read()?;
        let count = self
            .messages
            .read()
            .await
            .iter()
            .filter(|m| m.receiver_id == user_id && !m.is_read)
            .count();
        Ok(count as u64)
    }
}

#[async_trait]
impl ProfileLookup for MemoryStore {
    async fn get_many(&self, ids: &[String]) -> Result<HashMap<String, Profile>> {
        self.check_read()?;
        let profiles = self.profiles.read().await;
        Ok(ids
            .iter()
            .filter_map(|id| profiles.get(id).map(|p| (id.clone(), p.clone())))
            .collect())
    }

    async fn search_by_name(
        &self,
        query: &str,
        excluding: &str,
        limit: usize,
    ) -> Result<Vec<Profile>> {
        self.check_read()?;
        let query_lower = query.to_lowercase();
        let mut matches: Vec<Profile> = self
            .profiles
            .read()
            .await
            .values()
            .filter(|p| p.id != excluding)
            .filter(|p| p.display_name.to_lowercase().contains(&query_lower))
            .cloned()
            .collect();
        matches.sort_by(|a, b| a.display_name.cmp(&b.display_name));
        matches.truncate(limit);
        Ok(matches)
    }
}
