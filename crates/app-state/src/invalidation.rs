//! Cache invalidation events
//!
//! Mutations never patch view caches directly. They publish an invalidation
//! and the affected views refetch on their next (possibly forced) tick. This
//! is the send-then-invalidate model: one code path for all updates, no
//! optimistic/server reconciliation.

use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::scheduler::RefreshNotifier;

/// Events that mark a cached view as stale
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Invalidation {
    /// The conversation list needs refetching
    ConversationList,
    /// One open transcript needs refetching
    Transcript {
        /// Counterpart whose transcript changed
        counterpart_id: String,
    },
    /// The global unread badge needs refetching
    UnreadBadge,
}

/// Broadcast bus for invalidation events
///
/// Publishing with no live subscribers is a no-op, not an error: a mutation
/// does not care whether the dependent view is currently mounted.
#[derive(Clone)]
pub struct InvalidationBus {
    tx: broadcast::Sender<Invalidation>,
}

impl InvalidationBus {
    /// Create a new bus
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(32);
        Self { tx }
    }

    /// Publish an invalidation event
    pub fn publish(&self, event: Invalidation) {
        let _ = self.tx.send(event);
    }

    /// Subscribe to invalidation events
    pub fn subscribe(&self) -> broadcast::Receiver<Invalidation> {
        self.tx.subscribe()
    }
}

impl Default for InvalidationBus {
    fn default() -> Self {
        Self::new()
    }
}

/// Forward matching invalidation events into a view's forced-refresh path
///
/// The returned task runs until the bus is dropped; views abort it on
/// unmount together with their timer. A lagged receiver forces a refresh
/// unconditionally, since the skipped events may have matched.
pub fn forward_invalidations<F>(
    bus: &InvalidationBus,
    mut matches: F,
    notifier: RefreshNotifier,
) -> JoinHandle<()>
where
    F: FnMut(&Invalidation) -> bool + Send + 'static,
{
    let mut rx = bus.subscribe();
    tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(event) => {
                    if matches(&event) {
                        notifier.notify();
                    }
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    debug!(skipped, "invalidation receiver lagged, forcing refresh");
                    notifier.notify();
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    })
}
