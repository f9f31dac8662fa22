//! Conversation list aggregation
//!
//! A conversation is never stored: it is a derived view over the viewer's
//! slice of the message log, grouped by the other participant. This module
//! provides the aggregation itself, profile decoration, provisional
//! conversations for chats started from people search, and the polling
//! conversation-list view.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use app_state::{
    forward_invalidations, Invalidation, InvalidationBus, RefreshHandle, SessionState, ViewTimer,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use store_client::{Message, MessageStore, Profile, ProfileLookup};
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::error::Result;

/// A derived conversation summary, keyed by the other participant
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Conversation {
    /// The other participant's id
    pub counterpart_id: String,
    /// The other participant's display name
    pub counterpart_display: String,
    /// The other participant's avatar URL, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub counterpart_avatar: Option<String>,
    /// Text of the most recent message in the conversation
    pub last_message_text: String,
    /// Timestamp of the most recent message (absent for provisional entries)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_message_time: Option<DateTime<Utc>>,
    /// Count of messages addressed to the viewer that are still unread
    pub unread_count: u32,
    /// Whether this is a client-side placeholder with no backing messages
    #[serde(default)]
    pub provisional: bool,
}

impl Conversation {
    /// Client-side placeholder for a chat started from people search,
    /// before any message has been exchanged
    pub fn provisional(profile: &Profile) -> Self {
        Self {
            counterpart_id: profile.id.clone(),
            counterpart_display: profile.display_name.clone(),
            counterpart_avatar: profile.avatar_url.clone(),
            last_message_text: String::new(),
            last_message_time: None,
            unread_count: 0,
            provisional: true,
        }
    }

    /// Whether this conversation has unread messages
    pub fn has_unread(&self) -> bool {
        self.unread_count > 0
    }
}

/// Group the viewer's messages into one summary per counterpart
///
/// `messages` is the viewer's full message slice as fetched from the store,
/// newest-first. The first message seen for a counterpart is its most recent
/// one and seeds the summary; later messages for the same counterpart only
/// contribute to the unread count.
///
/// The newest-first fetch means first-seen order already matches recency,
/// but the result is sorted explicitly by `last_message_time` descending
/// rather than relying on traversal order of the fetch.
pub fn aggregate(self_id: &str, messages: &[Message]) -> Vec<Conversation> {
    let mut summaries: Vec<Conversation> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();

    for message in messages {
        let counterpart = message.counterpart_of(self_id);
        let unread = message.is_unread_for(self_id);

        match index.get(counterpart) {
            Some(&i) => {
                if unread {
                    summaries[i].unread_count += 1;
                }
            }
            None => {
                index.insert(counterpart.to_string(), summaries.len());
                summaries.push(Conversation {
                    counterpart_id: counterpart.to_string(),
                    counterpart_display: counterpart.to_string(),
                    counterpart_avatar: None,
                    last_message_text: message.content.clone(),
                    last_message_time: Some(message.created_at),
                    unread_count: u32::from(unread),
                    provisional: false,
                });
            }
        }
    }

    summaries.sort_by(|a, b| b.last_message_time.cmp(&a.last_message_time));
    summaries
}

/// Fill in counterpart display names and avatars via one batch lookup
///
/// Ids the lookup cannot resolve fall back to the placeholder profile.
pub async fn decorate(
    conversations: &mut [Conversation],
    lookup: &dyn ProfileLookup,
) -> Result<()> {
    if conversations.is_empty() {
        return Ok(());
    }

    let ids: Vec<String> = conversations
        .iter()
        .map(|c| c.counterpart_id.clone())
        .collect();
    let profiles = lookup.get_many(&ids).await?;

    for conversation in conversations.iter_mut() {
        match profiles.get(&conversation.counterpart_id) {
            Some(profile) => {
                conversation.counterpart_display = profile.display_name.clone();
                conversation.counterpart_avatar = profile.avatar_url.clone();
            }
            None => {
                let placeholder = Profile::placeholder(&conversation.counterpart_id);
                conversation.counterpart_display = placeholder.display_name;
                conversation.counterpart_avatar = None;
            }
        }
    }

    Ok(())
}

/// Merge aggregated conversations with client-side provisional entries
///
/// Identity is the counterpart id: once a real conversation exists for a
/// counterpart, its provisional placeholder is dropped. Surviving
/// placeholders are listed first, since they have no recency to sort by.
pub fn reconcile(aggregated: Vec<Conversation>, provisional: &[Conversation]) -> Vec<Conversation> {
    let mut merged: Vec<Conversation> = provisional
        .iter()
        .filter(|p| {
            !aggregated
                .iter()
                .any(|c| c.counterpart_id == p.counterpart_id)
        })
        .cloned()
        .collect();
    merged.extend(aggregated);
    merged
}

/// Summary counters for the conversation list
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConversationStats {
    /// Total number of conversations
    pub total: usize,
    /// Number of conversations with unread messages
    pub unread_conversations: usize,
    /// Total unread message count across all conversations
    pub total_unread: u32,
}

/// The polling conversation-list view
///
/// Owns the cached list and its refresh lifecycle: mounting starts the
/// 5-second timer plus an invalidation forwarder, unmounting cancels both.
/// A failed refresh leaves the previously fetched list visible.
pub struct ConversationListView {
    self_id: String,
    store: Arc<dyn MessageStore>,
    profiles: Arc<dyn ProfileLookup>,
    bus: InvalidationBus,
    conversations: Arc<RwLock<Vec<Conversation>>>,
    provisional: Arc<RwLock<Vec<Conversation>>>,
    loaded: Arc<AtomicBool>,
    active: Arc<AtomicBool>,
    handle: Option<RefreshHandle>,
    forwarder: Option<JoinHandle<()>>,
}

impl ConversationListView {
    /// Create a view for an explicit viewer id
    pub fn new(
        self_id: impl Into<String>,
        store: Arc<dyn MessageStore>,
        profiles: Arc<dyn ProfileLookup>,
        bus: InvalidationBus,
    ) -> Self {
        Self {
            self_id: self_id.into(),
            store,
            profiles,
            bus,
            conversations: Arc::new(RwLock::new(Vec::new())),
            provisional: Arc::new(RwLock::new(Vec::new())),
            loaded: Arc::new(AtomicBool::new(false)),
            active: Arc::new(AtomicBool::new(false)),
            handle: None,
            forwarder: None,
        }
    }

    /// Create a view for the signed-in viewer
    ///
    /// Fails with `NotAuthenticated` when no viewer is signed in; callers
    /// suppress the messaging UI in that case.
    pub fn for_session(
        session: &SessionState,
        store: Arc<dyn MessageStore>,
        profiles: Arc<dyn ProfileLookup>,
        bus: InvalidationBus,
    ) -> Result<Self> {
        let viewer = session.require_viewer()?;
        Ok(Self::new(viewer, store, profiles, bus))
    }

    /// The viewer this list belongs to
    pub fn self_id(&self) -> &str {
        &self.self_id
    }

    /// Start the refresh timer; the first tick fires immediately
    pub fn mount(&mut self) {
        if self.handle.is_some() {
            return;
        }
        self.active.store(true, Ordering::SeqCst);

        let self_id = self.self_id.clone();
        let store = Arc::clone(&self.store);
        let profiles = Arc::clone(&self.profiles);
        let conversations = Arc::clone(&self.conversations);
        let provisional = Arc::clone(&self.provisional);
        let loaded = Arc::clone(&self.loaded);
        let active = Arc::clone(&self.active);

        let handle = ViewTimer::conversation_list().start(move || {
            refresh_conversation_list(
                self_id.clone(),
                Arc::clone(&store),
                Arc::clone(&profiles),
                Arc::clone(&conversations),
                Arc::clone(&provisional),
                Arc::clone(&loaded),
                Arc::clone(&active),
            )
        });
        let forwarder = forward_invalidations(
            &self.bus,
            |event| matches!(event, Invalidation::ConversationList),
            handle.notifier(),
        );

        self.handle = Some(handle);
        self.forwarder = Some(forwarder);
    }

    /// Cancel the refresh timer; late-arriving results are discarded
    pub fn unmount(&mut self) {
        self.active.store(false, Ordering::SeqCst);
        self.handle = None;
        if let Some(forwarder) = self.forwarder.take() {
            forwarder.abort();
        }
    }

    /// Whether the view is currently mounted
    pub fn is_mounted(&self) -> bool {
        self.handle.is_some()
    }

    /// Whether at least one refresh has completed
    pub fn is_loaded(&self) -> bool {
        self.loaded.load(Ordering::SeqCst)
    }

    /// Refresh once, outside the timer (initial fetches in tests, pull to
    /// refresh). Requires the view to be active or never mounted.
    pub async fn refresh(&self) -> Result<()> {
        refresh_conversation_list(
            self.self_id.clone(),
            Arc::clone(&self.store),
            Arc::clone(&self.profiles),
            Arc::clone(&self.conversations),
            Arc::clone(&self.provisional),
            Arc::clone(&self.loaded),
            Arc::new(AtomicBool::new(true)),
        )
        .await
    }

    /// Snapshot of the current conversation list
    pub async fn conversations(&self) -> Vec<Conversation> {
        self.conversations.read().await.clone()
    }

    /// Summary counters over the current list
    pub async fn stats(&self) -> ConversationStats {
        let conversations = self.conversations.read().await;
        ConversationStats {
            total: conversations.len(),
            unread_conversations: conversations.iter().filter(|c| c.has_unread()).count(),
            total_unread: conversations.iter().map(|c| c.unread_count).sum(),
        }
    }

    /// Insert a provisional conversation for a user picked from search
    ///
    /// No-op if a conversation (real or provisional) already exists for that
    /// counterpart; the entry shows up at the top of the list on the next
    /// snapshot.
    pub async fn start_conversation(&self, profile: &Profile) {
        {
            let mut pending = self.provisional.write().await;
            let exists = pending.iter().any(|c| c.counterpart_id == profile.id);
            if exists {
                return;
            }
            pending.push(Conversation::provisional(profile));
        }

        // Fold the new entry into the visible list without waiting a tick
        let mut conversations = self.conversations.write().await;
        if !conversations
            .iter()
            .any(|c| c.counterpart_id == profile.id)
        {
            conversations.insert(0, Conversation::provisional(profile));
        }
    }

    /// Search people to start a conversation with, excluding the viewer
    pub async fn search_people(&self, query: &str, limit: usize) -> Result<Vec<Profile>> {
        let results = self
            .profiles
            .search_by_name(query, &self.self_id, limit)
            .await?;
        Ok(results)
    }
}

impl Drop for ConversationListView {
    fn drop(&mut self) {
        if let Some(forwarder) = self.forwarder.take() {
            forwarder.abort();
        }
    }
}

/// One full conversation-list refresh: fetch, aggregate, decorate, reconcile
async fn refresh_conversation_list(
    self_id: String,
    store: Arc<dyn MessageStore>,
    profiles: Arc<dyn ProfileLookup>,
    conversations: Arc<RwLock<Vec<Conversation>>>,
    provisional: Arc<RwLock<Vec<Conversation>>>,
    loaded: Arc<AtomicBool>,
    active: Arc<AtomicBool>,
) -> Result<()> {
    let messages = store.list_for_user(&self_id).await?;
    let mut aggregated = aggregate(&self_id, &messages);
    decorate(&mut aggregated, profiles.as_ref()).await?;

    // Drop provisional entries that now have a real conversation
    {
        let mut pending = provisional.write().await;
        pending.retain(|p| {
            !aggregated
                .iter()
                .any(|c| c.counterpart_id == p.counterpart_id)
        });
    }

    // The view may have unmounted while the fetch was in flight
    if !active.load(Ordering::SeqCst) {
        debug!(view = "conversation-list", "discarding refresh for inactive view");
        return Ok(());
    }

    let merged = reconcile(aggregated, &provisional.read().await.clone());
    *conversations.write().await = merged;
    loaded.store(true, Ordering::SeqCst);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use store_client::{MemoryStore, StoreError, DIRECT_MESSAGE_SUBJECT};

    fn message(
        id: &str,
        sender: &str,
        receiver: &str,
        is_read: bool,
        minutes_ago: i64,
    ) -> Message {
        Message {
            id: id.to_string(),
            sender_id: sender.to_string(),
            receiver_id: receiver.to_string(),
            content: format!("content of {}", id),
            subject: DIRECT_MESSAGE_SUBJECT.to_string(),
            is_read,
            created_at: Utc::now() - Duration::minutes(minutes_ago),
        }
    }

    #[test]
    fn test_aggregate_empty() {
        assert!(aggregate("alice", &[]).is_empty());
    }

    #[test]
    fn test_aggregate_groups_by_counterpart() {
        // Newest-first, as the store returns them
        let messages = vec![
            message("m4", "carol", "alice", false, 1),
            message("m3", "alice", "bob", false, 2),
            message("m2", "bob", "alice", false, 3),
            message("m1", "bob", "alice", true, 4),
        ];

        let conversations = aggregate("alice", &messages);
        assert_eq!(conversations.len(), 2);

        assert_eq!(conversations[0].counterpart_id, "carol");
        assert_eq!(conversations[0].last_message_text, "content of m4");
        assert_eq!(conversations[0].unread_count, 1);

        assert_eq!(conversations[1].counterpart_id, "bob");
        // First encounter in newest-first order is the latest message
        assert_eq!(conversations[1].last_message_text, "content of m3");
        // m3 was sent by alice, m1 is read: only m2 counts
        assert_eq!(conversations[1].unread_count, 1);
    }

    #[test]
    fn test_aggregate_unread_only_counts_messages_to_self() {
        let messages = vec![
            message("m3", "alice", "bob", false, 1),
            message("m2", "alice", "bob", false, 2),
            message("m1", "bob", "alice", false, 3),
        ];

        let conversations = aggregate("alice", &messages);
        assert_eq!(conversations.len(), 1);
        assert_eq!(conversations[0].unread_count, 1);

        // Same log viewed from bob's side
        let conversations = aggregate("bob", &messages);
        assert_eq!(conversations[0].unread_count, 2);
    }

    #[test]
    fn test_aggregate_sorts_by_recency_even_if_fetch_is_unsorted() {
        // Deliberately not newest-first
        let messages = vec![
            message("m1", "bob", "alice", true, 60),
            message("m2", "carol", "alice", true, 5),
        ];

        let conversations = aggregate("alice", &messages);
        assert_eq!(conversations[0].counterpart_id, "carol");
        assert_eq!(conversations[1].counterpart_id, "bob");
    }

    #[tokio::test]
    async fn test_decorate_with_placeholder_for_missing() {
        let store = MemoryStore::new();
        store
            .add_profile(Profile::new("bob", "Bob Rainer").with_avatar("https://cdn/a.png"))
            .await;

        let messages = vec![
            message("m2", "bob", "alice", false, 1),
            message("m1", "ghost", "alice", false, 2),
        ];
        let mut conversations = aggregate("alice", &messages);
        decorate(&mut conversations, &store).await.unwrap();

        assert_eq!(conversations[0].counterpart_display, "Bob Rainer");
        assert_eq!(
            conversations[0].counterpart_avatar,
            Some("https://cdn/a.png".to_string())
        );
        assert_eq!(conversations[1].counterpart_display, "Unknown User");
        assert!(conversations[1].counterpart_avatar.is_none());
    }

    #[test]
    fn test_reconcile_drops_superseded_provisional() {
        let aggregated = aggregate("alice", &[message("m1", "bob", "alice", false, 1)]);
        let provisional = vec![
            Conversation::provisional(&Profile::new("bob", "Bob Rainer")),
            Conversation::provisional(&Profile::new("dana", "Dana Wen")),
        ];

        let merged = reconcile(aggregated, &provisional);
        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0].counterpart_id, "dana");
        assert!(merged[0].provisional);
        assert_eq!(merged[1].counterpart_id, "bob");
        assert!(!merged[1].provisional);
    }

    #[test]
    fn test_provisional_shape() {
        let conversation = Conversation::provisional(&Profile::new("dana", "Dana Wen"));
        assert_eq!(conversation.unread_count, 0);
        assert_eq!(conversation.last_message_text, "");
        assert!(conversation.last_message_time.is_none());
        assert!(conversation.provisional);
        assert!(!conversation.has_unread());
    }

    #[tokio::test]
    async fn test_view_refresh_and_stats() {
        let store = Arc::new(MemoryStore::new());
        store.add_profile(Profile::new("bob", "Bob Rainer")).await;
        store
            .insert_message(message("m1", "bob", "alice", false, 2))
            .await;
        store
            .insert_message(message("m2", "bob", "alice", false, 1))
            .await;

        let view = ConversationListView::new(
            "alice",
            store.clone() as Arc<dyn MessageStore>,
            store.clone() as Arc<dyn ProfileLookup>,
            InvalidationBus::new(),
        );
        assert!(!view.is_loaded());

        view.refresh().await.unwrap();
        assert!(view.is_loaded());

        let conversations = view.conversations().await;
        assert_eq!(conversations.len(), 1);
        assert_eq!(conversations[0].counterpart_display, "Bob Rainer");
        assert_eq!(conversations[0].unread_count, 2);

        let stats = view.stats().await;
        assert_eq!(stats.total, 1);
        assert_eq!(stats.unread_conversations, 1);
        assert_eq!(stats.total_unread, 2);
    }

    #[tokio::test]
    async fn test_view_failed_refresh_keeps_previous_list() {
        let store = Arc::new(MemoryStore::new());
        store
            .insert_message(message("m1", "bob", "alice", false, 1))
            .await;

        let view = ConversationListView::new(
            "alice",
            store.clone() as Arc<dyn MessageStore>,
            store.clone() as Arc<dyn ProfileLookup>,
            InvalidationBus::new(),
        );
        view.refresh().await.unwrap();
        assert_eq!(view.conversations().await.len(), 1);

        store.set_fail_reads(true);
        let err = view.refresh().await.unwrap_err();
        assert!(matches!(
            err,
            crate::MessagingError::Store(StoreError::Read(_))
        ));
        // Stale-but-present beats blank
        assert_eq!(view.conversations().await.len(), 1);
    }

    #[tokio::test]
    async fn test_start_conversation_dedupes() {
        let store = Arc::new(MemoryStore::new());
        let view = ConversationListView::new(
            "alice",
            store.clone() as Arc<dyn MessageStore>,
            store.clone() as Arc<dyn ProfileLookup>,
            InvalidationBus::new(),
        );

        let dana = Profile::new("dana", "Dana Wen");
        view.start_conversation(&dana).await;
        view.start_conversation(&dana).await;

        let conversations = view.conversations().await;
        assert_eq!(conversations.len(), 1);
        assert!(conversations[0].provisional);
    }

    #[tokio::test]
    async fn test_for_session_requires_viewer() {
        let store = Arc::new(MemoryStore::new());
        let session = SessionState::new();

        let denied = ConversationListView::for_session(
            &session,
            store.clone() as Arc<dyn MessageStore>,
            store.clone() as Arc<dyn ProfileLookup>,
            InvalidationBus::new(),
        );
        assert!(denied.is_err());

        session.set_viewer("alice");
        let view = ConversationListView::for_session(
            &session,
            store.clone() as Arc<dyn MessageStore>,
            store.clone() as Arc<dyn ProfileLookup>,
            InvalidationBus::new(),
        )
        .unwrap();
        assert_eq!(view.self_id(), "alice");
    }

    #[tokio::test(start_paused = true)]
    async fn test_mount_polls_and_unmount_stops() {
        let store = Arc::new(MemoryStore::new());
        store
            .insert_message(message("m1", "bob", "alice", false, 1))
            .await;

        let mut view = ConversationListView::new(
            "alice",
            store.clone() as Arc<dyn MessageStore>,
            store.clone() as Arc<dyn ProfileLookup>,
            InvalidationBus::new(),
        );

        view.mount();
        assert!(view.is_mounted());
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        assert_eq!(view.conversations().await.len(), 1);

        view.unmount();
        assert!(!view.is_mounted());

        // New messages no longer picked up after unmount
        store
            .insert_message(message("m2", "carol", "alice", false, 0))
            .await;
        tokio::time::sleep(std::time::Duration::from_secs(30)).await;
        assert_eq!(view.conversations().await.len(), 1);
    }
}
