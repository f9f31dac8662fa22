//! Open chat sessions and transcript rendering
//!
//! A [`ChatSession`] is the model behind one open conversation: it polls the
//! pair's thread, marks incoming messages read on arrival, holds the draft,
//! and sends. Rendering is a pure function from the fetched thread to a
//! transcript of day separators and consecutive-sender message groups with
//! read receipts.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use app_state::{
    forward_invalidations, Invalidation, InvalidationBus, RefreshHandle, ViewTimer,
};
use chrono::NaiveDate;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use store_client::{Message, MessageStore, DIRECT_MESSAGE_SUBJECT};

use crate::error::{MessagingError, Result};
use crate::read_state::ReadStateTracker;

/// Delivery state shown next to the viewer's own messages
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Receipt {
    /// Delivered, not yet read by the counterpart
    Sent,
    /// Read by the counterpart
    Read,
}

impl Receipt {
    /// Receipt for a message, or `None` for incoming messages
    ///
    /// Receipts only make sense on the viewer's own outgoing messages.
    pub fn of(message: &Message, self_id: &str) -> Option<Receipt> {
        if !message.is_from(self_id) {
            return None;
        }
        if message.is_read {
            Some(Receipt::Read)
        } else {
            Some(Receipt::Sent)
        }
    }

    /// Check-mark glyph for display
    pub fn glyph(&self) -> &'static str {
        match self {
            Receipt::Sent => "✓",
            Receipt::Read => "✓✓",
        }
    }
}

/// One message in the transcript with its receipt, if any
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranscriptEntry {
    /// The message itself
    pub message: Message,
    /// Receipt for the viewer's own messages; `None` for incoming
    pub receipt: Option<Receipt>,
}

/// A run of consecutive messages from one sender within one day
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageGroup {
    /// Sender of every message in the run
    pub sender_id: String,
    /// Whether the viewer sent this run
    pub from_self: bool,
    /// Messages in the run, oldest first
    pub entries: Vec<TranscriptEntry>,
}

/// One rendered item of a chat transcript
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TranscriptItem {
    /// Calendar-day boundary
    DaySeparator(NaiveDate),
    /// A consecutive-sender message group
    Group(MessageGroup),
}

/// Render a thread into day separators and sender groups
///
/// The thread is sorted oldest-first before rendering rather than trusting
/// fetch order. Every day with at least one message gets a separator, and a
/// sender run never spans a day boundary.
pub fn build_transcript(self_id: &str, messages: &[Message]) -> Vec<TranscriptItem> {
    let mut sorted: Vec<&Message> = messages.iter().collect();
    sorted.sort_by(|a, b| a.created_at.cmp(&b.created_at));

    let mut items: Vec<TranscriptItem> = Vec::new();
    let mut current_day: Option<NaiveDate> = None;
    let mut group: Option<MessageGroup> = None;

    for message in sorted {
        let day = message.created_at.date_naive();
        if current_day != Some(day) {
            if let Some(done) = group.take() {
                items.push(TranscriptItem::Group(done));
            }
            items.push(TranscriptItem::DaySeparator(day));
            current_day = Some(day);
        }

        let entry = TranscriptEntry {
            message: message.clone(),
            receipt: Receipt::of(message, self_id),
        };

        match group.as_mut() {
            Some(run) if run.sender_id == message.sender_id => run.entries.push(entry),
            _ => {
                if let Some(done) = group.take() {
                    items.push(TranscriptItem::Group(done));
                }
                group = Some(MessageGroup {
                    sender_id: message.sender_id.clone(),
                    from_self: message.is_from(self_id),
                    entries: vec![entry],
                });
            }
        }
    }

    if let Some(done) = group.take() {
        items.push(TranscriptItem::Group(done));
    }
    items
}

/// Model for one open conversation
///
/// Mounting starts a 3-second transcript timer plus an invalidation
/// forwarder scoped to this counterpart. Incoming unread messages are marked
/// read as part of every successful refresh; a failed mark is logged and
/// retried on the next tick.
pub struct ChatSession {
    self_id: String,
    counterpart_id: String,
    store: Arc<dyn MessageStore>,
    tracker: ReadStateTracker,
    bus: InvalidationBus,
    messages: Arc<RwLock<Vec<Message>>>,
    draft: RwLock<String>,
    loaded: Arc<AtomicBool>,
    active: Arc<AtomicBool>,
    handle: Option<RefreshHandle>,
    forwarder: Option<JoinHandle<()>>,
}

impl ChatSession {
    /// Open a session between the viewer and one counterpart
    pub fn new(
        self_id: impl Into<String>,
        counterpart_id: impl Into<String>,
        store: Arc<dyn MessageStore>,
        bus: InvalidationBus,
    ) -> Self {
        let tracker = ReadStateTracker::new(Arc::clone(&store), bus.clone());
        Self {
            self_id: self_id.into(),
            counterpart_id: counterpart_id.into(),
            store,
            tracker,
            bus,
            messages: Arc::new(RwLock::new(Vec::new())),
            draft: RwLock::new(String::new()),
            loaded: Arc::new(AtomicBool::new(false)),
            active: Arc::new(AtomicBool::new(false)),
            handle: None,
            forwarder: None,
        }
    }

    /// The counterpart this session is with
    pub fn counterpart_id(&self) -> &str {
        &self.counterpart_id
    }

    /// Whether at least one refresh has completed
    pub fn is_loaded(&self) -> bool {
        self.loaded.load(Ordering::SeqCst)
    }

    /// Start the transcript timer; the first tick fires immediately
    pub fn mount(&mut self) {
        if self.handle.is_some() {
            return;
        }
        self.active.store(true, Ordering::SeqCst);

        let self_id = self.self_id.clone();
        let counterpart_id = self.counterpart_id.clone();
        let store = Arc::clone(&self.store);
        let tracker = self.tracker.clone();
        let messages = Arc::clone(&self.messages);
        let loaded = Arc::clone(&self.loaded);
        let active = Arc::clone(&self.active);

        let handle = ViewTimer::transcript(&self.counterpart_id).start(move || {
            refresh_transcript(
                self_id.clone(),
                counterpart_id.clone(),
                Arc::clone(&store),
                tracker.clone(),
                Arc::clone(&messages),
                Arc::clone(&loaded),
                Arc::clone(&active),
            )
        });

        let scope = self.counterpart_id.clone();
        let forwarder = forward_invalidations(
            &self.bus,
            move |event| {
                matches!(event, Invalidation::Transcript { counterpart_id } if *counterpart_id == scope)
            },
            handle.notifier(),
        );

        self.handle = Some(handle);
        self.forwarder = Some(forwarder);
    }

    /// Stop the transcript timer; late-arriving results are discarded
    pub fn unmount(&mut self) {
        self.active.store(false, Ordering::SeqCst);
        self.handle = None;
        if let Some(forwarder) = self.forwarder.take() {
            forwarder.abort();
        }
    }

    /// Whether the session is currently mounted
    pub fn is_mounted(&self) -> bool {
        self.handle.is_some()
    }

    /// Refresh once, outside the timer
    pub async fn refresh(&self) -> Result<()> {
        refresh_transcript(
            self.self_id.clone(),
            self.counterpart_id.clone(),
            Arc::clone(&self.store),
            self.tracker.clone(),
            Arc::clone(&self.messages),
            Arc::clone(&self.loaded),
            Arc::new(AtomicBool::new(true)),
        )
        .await
    }

    /// Snapshot of the raw thread, oldest first
    pub async fn messages(&self) -> Vec<Message> {
        self.messages.read().await.clone()
    }

    /// Rendered transcript over the current thread snapshot
    pub async fn transcript(&self) -> Vec<TranscriptItem> {
        build_transcript(&self.self_id, &self.messages.read().await)
    }

    /// Replace the draft text
    pub async fn set_draft(&self, text: impl Into<String>) {
        *self.draft.write().await = text.into();
    }

    /// Current draft text
    pub async fn draft(&self) -> String {
        self.draft.read().await.clone()
    }

    /// Send a message to the counterpart
    ///
    /// The content is trimmed; empty or whitespace-only content is rejected
    /// before any store call. On success the transcript and conversation list
    /// are invalidated rather than patched, so the sent message appears via
    /// the same refetch path as everything else.
    pub async fn send(&self, content: &str) -> Result<Message> {
        let trimmed = content.trim();
        if trimmed.is_empty() {
            return Err(MessagingError::EmptyMessage);
        }

        let message = self
            .store
            .create(
                &self.self_id,
                &self.counterpart_id,
                trimmed,
                DIRECT_MESSAGE_SUBJECT,
            )
            .await?;
        debug!(counterpart = %self.counterpart_id, id = %message.id, "sent message");

        self.bus.publish(Invalidation::Transcript {
            counterpart_id: self.counterpart_id.clone(),
        });
        self.bus.publish(Invalidation::ConversationList);

        Ok(message)
    }

    /// Send the current draft, clearing it only on success
    ///
    /// A failed send leaves the draft intact so the user can retry.
    pub async fn send_draft(&self) -> Result<Message> {
        let content = self.draft().await;
        let message = self.send(&content).await?;
        self.draft.write().await.clear();
        Ok(message)
    }
}

impl Drop for ChatSession {
    fn drop(&mut self) {
        if let Some(forwarder) = self.forwarder.take() {
            forwarder.abort();
        }
    }
}

/// One transcript refresh: fetch the thread, apply it, mark incoming read
async fn refresh_transcript(
    self_id: String,
    counterpart_id: String,
    store: Arc<dyn MessageStore>,
    tracker: ReadStateTracker,
    messages: Arc<RwLock<Vec<Message>>>,
    loaded: Arc<AtomicBool>,
    active: Arc<AtomicBool>,
) -> Result<()> {
    let thread = store.list_between(&self_id, &counterpart_id).await?;

    // The session may have unmounted while the fetch was in flight
    if !active.load(Ordering::SeqCst) {
        debug!(counterpart = %counterpart_id, "discarding refresh for inactive session");
        return Ok(());
    }

    *messages.write().await = thread.clone();
    loaded.store(true, Ordering::SeqCst);

    // Viewing a conversation is what marks it read. The thread is already
    // applied at this point, so a failed mark does not hide messages.
    if let Err(e) = tracker.mark_read(&self_id, &counterpart_id, &thread).await {
        warn!(counterpart = %counterpart_id, error = %e, "failed to mark messages read");
    }

    Ok(())
}
