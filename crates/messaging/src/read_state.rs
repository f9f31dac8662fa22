//! Read-state tracking
//!
//! Opening a conversation marks the counterpart's unread messages as read.
//! The store write happens first; dependent views (conversation list, unread
//! badge) are then invalidated and refetch on their next tick rather than
//! being patched in place.

use std::sync::Arc;

use app_state::{Invalidation, InvalidationBus};
use store_client::{Message, MessageStore};
use tracing::debug;

use crate::error::Result;

/// Marks messages read and invalidates the views that display unread state
#[derive(Clone)]
pub struct ReadStateTracker {
    store: Arc<dyn MessageStore>,
    bus: InvalidationBus,
}

impl ReadStateTracker {
    /// Create a tracker over the given store and invalidation bus
    pub fn new(store: Arc<dyn MessageStore>, bus: InvalidationBus) -> Self {
        Self { store, bus }
    }

    /// Mark the counterpart's unread messages in `messages` as read
    ///
    /// Only messages sent by `counterpart_id` and still unread for `self_id`
    /// are included; the viewer's own outgoing messages are never touched.
    /// When nothing qualifies this is a complete no-op: no store call, no
    /// invalidation events. Returns the number of messages marked.
    pub async fn mark_read(
        &self,
        self_id: &str,
        counterpart_id: &str,
        messages: &[Message],
    ) -> Result<usize> {
        let ids: Vec<String> = messages
            .iter()
            .filter(|m| m.is_unread_for(self_id) && m.sender_id == counterpart_id)
            .map(|m| m.id.clone())
            .collect();

        if ids.is_empty() {
            return Ok(0);
        }

        self.store.mark_read(&ids).await?;
        debug!(
            counterpart = %counterpart_id,
            count = ids.len(),
            "marked messages read"
        );

        // Unread counts changed in two places the viewer can see
        self.bus.publish(Invalidation::ConversationList);
        self.bus.publish(Invalidation::UnreadBadge);

        Ok(ids.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use store_client::{MemoryStore, StoreError, DIRECT_MESSAGE_SUBJECT};

    async fn store_with_thread() -> (Arc<MemoryStore>, Vec<Message>) {
        let store = Arc::new(MemoryStore::new());
        let base = Utc::now() - Duration::minutes(10);

        for (i, (from, to)) in [("bob", "alice"), ("alice", "bob"), ("bob", "alice")]
            .iter()
            .enumerate()
        {
            let msg = store.build_message(
                from,
                to,
                &format!("message {}", i),
                DIRECT_MESSAGE_SUBJECT,
                base + Duration::minutes(i as i64),
            );
            store.insert_message(msg).await;
        }

        let messages = store.list_between("alice", "bob").await.unwrap();
        (store, messages)
    }

    #[tokio::test]
    async fn test_marks_only_counterpart_unread() {
        let (store, messages) = store_with_thread().await;
        let bus = InvalidationBus::new();
        let mut rx = bus.subscribe();
        let tracker = ReadStateTracker::new(store.clone(), bus);

        let marked = tracker.mark_read("alice", "bob", &messages).await.unwrap();
        assert_eq!(marked, 2);
        assert_eq!(store.count_unread("alice").await.unwrap(), 0);

        // Alice's own message to bob stays unread on bob's side
        assert_eq!(store.count_unread("bob").await.unwrap(), 1);

        assert_eq!(rx.recv().await.unwrap(), Invalidation::ConversationList);
        assert_eq!(rx.recv().await.unwrap(), Invalidation::UnreadBadge);
    }

    #[tokio::test]
    async fn test_noop_when_nothing_unread() {
        let (store, messages) = store_with_thread().await;
        let bus = InvalidationBus::new();
        let tracker = ReadStateTracker::new(store.clone(), bus.clone());

        tracker.mark_read("alice", "bob", &messages).await.unwrap();

        // Second pass over the refreshed thread finds nothing to mark
        let refreshed = store.list_between("alice", "bob").await.unwrap();
        let mut rx = bus.subscribe();
        let marked = tracker.mark_read("alice", "bob", &refreshed).await.unwrap();
        assert_eq!(marked, 0);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_noop_avoids_store_call() {
        let (store, _) = store_with_thread().await;
        let bus = InvalidationBus::new();
        let tracker = ReadStateTracker::new(store.clone(), bus);

        // With no qualifying messages, an injected write failure is never hit
        store.set_fail_writes(true);
        let marked = tracker.mark_read("alice", "bob", &[]).await.unwrap();
        assert_eq!(marked, 0);
    }

    #[tokio::test]
    async fn test_write_failure_propagates_without_events() {
        let (store, messages) = store_with_thread().await;
        let bus = InvalidationBus::new();
        let mut rx = bus.subscribe();
        let tracker = ReadStateTracker::new(store.clone(), bus);

        store.set_fail_writes(true);
        let err = tracker.mark_read("alice", "bob", &messages).await.unwrap_err();
        assert!(matches!(
            err,
            crate::MessagingError::Store(StoreError::Write(_))
        ));
        assert!(rx.try_recv().is_err());
        assert_eq!(store.count_unread("alice").await.unwrap(), 2);
    }
}
