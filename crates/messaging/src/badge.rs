//! Global unread badge view
//!
//! Polls the viewer's total unread count and feeds it into the shared
//! [`UnreadBadge`] watch channel, which the navigation chrome observes.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use app_state::{
    forward_invalidations, BadgeDisplay, Invalidation, InvalidationBus, RefreshHandle,
    UnreadBadge, ViewTimer,
};
use store_client::MessageStore;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::error::Result;

/// The polling unread-badge view
pub struct UnreadBadgeView {
    self_id: String,
    store: Arc<dyn MessageStore>,
    bus: InvalidationBus,
    badge: Arc<UnreadBadge>,
    active: Arc<AtomicBool>,
    handle: Option<RefreshHandle>,
    forwarder: Option<JoinHandle<()>>,
}

impl UnreadBadgeView {
    /// Create a badge view for the given viewer
    pub fn new(
        self_id: impl Into<String>,
        store: Arc<dyn MessageStore>,
        bus: InvalidationBus,
        badge: Arc<UnreadBadge>,
    ) -> Self {
        Self {
            self_id: self_id.into(),
            store,
            bus,
            badge,
            active: Arc::new(AtomicBool::new(false)),
            handle: None,
            forwarder: None,
        }
    }

    /// The badge channel this view feeds
    pub fn badge(&self) -> &Arc<UnreadBadge> {
        &self.badge
    }

    /// Current badge display
    pub fn display(&self) -> BadgeDisplay {
        self.badge.current()
    }

    /// Start the 10-second badge timer; the first tick fires immediately
    pub fn mount(&mut self) {
        if self.handle.is_some() {
            return;
        }
        self.active.store(true, Ordering::SeqCst);

        let self_id = self.self_id.clone();
        let store = Arc::clone(&self.store);
        let badge = Arc::clone(&self.badge);
        let active = Arc::clone(&self.active);

        let handle = ViewTimer::unread_badge().start(move || {
            refresh_badge(
                self_id.clone(),
                Arc::clone(&store),
                Arc::clone(&badge),
                Arc::clone(&active),
            )
        });
        let forwarder = forward_invalidations(
            &self.bus,
            |event| matches!(event, Invalidation::UnreadBadge),
            handle.notifier(),
        );

        self.handle = Some(handle);
        self.forwarder = Some(forwarder);
    }

    /// Stop the badge timer; late-arriving counts are discarded
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

    /// Refresh once, outside the timer
    pub async fn refresh(&self) -> Result<()> {
        refresh_badge(
            self.self_id.clone(),
            Arc::clone(&self.store),
            Arc::clone(&self.badge),
            Arc::new(AtomicBool::new(true)),
        )
        .await
    }
}

impl Drop for UnreadBadgeView {
    fn drop(&mut self) {
        if let Some(forwarder) = self.forwarder.take() {
            forwarder.abort();
        }
    }
}

async fn refresh_badge(
    self_id: String,
    store: Arc<dyn MessageStore>,
    badge: Arc<UnreadBadge>,
    active: Arc<AtomicBool>,
) -> Result<()> {
    let count = store.count_unread(&self_id).await?;

    if !active.load(Ordering::SeqCst) {
        debug!(view = "unread-badge", "discarding refresh for inactive view");
        return Ok(());
    }

    badge.set_count(count);
    Ok(())
}
