//! Per-view refresh scheduling
//!
//! Each visible view owns one periodic timer that re-issues its query and
//! replaces the cached result. Timers start on mount, stop deterministically
//! on unmount (or handle drop), and never overlap: ticks are awaited serially
//! inside a single task, and missed ticks are skipped rather than queued.

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{oneshot, Notify};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::warn;

/// Poll interval for the conversation list view
pub const CONVERSATION_LIST_INTERVAL: Duration = Duration::from_secs(5);

/// Poll interval for an open chat transcript
pub const TRANSCRIPT_INTERVAL: Duration = Duration::from_secs(3);

/// Poll interval for the global unread badge
pub const UNREAD_BADGE_INTERVAL: Duration = Duration::from_secs(10);

/// A named periodic refresh timer for one view
#[derive(Debug, Clone)]
pub struct ViewTimer {
    name: String,
    interval: Duration,
}

impl ViewTimer {
    /// Create a timer with an explicit name and interval
    pub fn new(name: impl Into<String>, interval: Duration) -> Self {
        Self {
            name: name.into(),
            interval,
        }
    }

    /// Timer for the conversation list view
    pub fn conversation_list() -> Self {
        Self::new("conversation-list", CONVERSATION_LIST_INTERVAL)
    }

    /// Timer for an open chat transcript
    pub fn transcript(counterpart_id: &str) -> Self {
        Self::new(format!("transcript:{}", counterpart_id), TRANSCRIPT_INTERVAL)
    }

    /// Timer for the global unread badge
    pub fn unread_badge() -> Self {
        Self::new("unread-badge", UNREAD_BADGE_INTERVAL)
    }

    /// Start the timer, running `tick` once immediately and then once per
    /// interval until the returned handle is stopped or dropped.
    ///
    /// A failed tick is logged and retried on the next scheduled tick; it
    /// never cancels the timer. A forced refresh
    /// ([`RefreshHandle::refresh_now`]) resets the interval so the view is
    /// not refreshed twice back to back.
    pub fn start<F, Fut, E>(self, mut tick: F) -> RefreshHandle
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = Result<(), E>> + Send,
        E: fmt::Display,
    {
        let notify = Arc::new(Notify::new());
        let (stop_tx, mut stop_rx) = oneshot::channel::<()>();
        let task_notify = Arc::clone(&notify);
        let name = self.name;

        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(self.interval);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    _ = interval.tick() => {}
                    _ = task_notify.notified() => {
                        interval.reset();
                    }
                    _ = &mut stop_rx => break,
                }

                if let Err(e) = tick().await {
                    warn!(view = %name, error = %e, "refresh tick failed, retrying on next tick");
                }
            }
        });

        RefreshHandle {
            notify,
            stop_tx: Some(stop_tx),
            _handle: handle,
        }
    }
}

/// Handle controlling a running [`ViewTimer`]
///
/// Dropping the handle cancels the timer, so a view that unmounts cannot
/// leak its refresh task.
pub struct RefreshHandle {
    notify: Arc<Notify>,
    stop_tx: Option<oneshot::Sender<()>>,
    _handle: JoinHandle<()>,
}

impl RefreshHandle {
    /// Force an immediate out-of-band refresh tick
    ///
    /// If a tick is already in flight, at most one extra refresh is queued.
    pub fn refresh_now(&self) {
        self.notify.notify_one();
    }

    /// A cloneable notifier for wiring invalidation events to this timer
    pub fn notifier(&self) -> RefreshNotifier {
        RefreshNotifier {
            notify: Arc::clone(&self.notify),
        }
    }

    /// Stop the timer explicitly
    pub fn stop(mut self) {
        if let Some(tx) = self.stop_tx.take() {
            let _ = tx.send(());
        }
    }
}

impl Drop for RefreshHandle {
    fn drop(&mut self) {
        if let Some(tx) = self.stop_tx.take() {
            let _ = tx.send(());
        }
    }
}

/// Cloneable trigger for a timer's forced-refresh path
#[derive(Clone)]
pub struct RefreshNotifier {
    notify: Arc<Notify>,
}

impl RefreshNotifier {
    /// Request an immediate refresh of the owning view
    pub fn notify(&self) {
        self.notify.notify_one();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counting_tick(
        counter: &Arc<AtomicUsize>,
    ) -> impl FnMut() -> std::future::Ready<Result<(), String>> + Send + 'static {
        let counter = Arc::clone(counter);
        move || {
            counter.fetch_add(1, Ordering::SeqCst);
            std::future::ready(Ok(()))
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_initial_tick_and_interval() {
        let counter = Arc::new(AtomicUsize::new(0));
        let _handle =
            ViewTimer::new("test", Duration::from_secs(5)).start(counting_tick(&counter));

        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(counter.load(Ordering::SeqCst), 1);

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(counter.load(Ordering::SeqCst), 2);

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(counter.load(Ordering::SeqCst), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_drop_cancels_timer() {
        let counter = Arc::new(AtomicUsize::new(0));
        let handle = ViewTimer::new("test", Duration::from_secs(5)).start(counting_tick(&counter));

        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(counter.load(Ordering::SeqCst), 1);

        drop(handle);
        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_cancels_timer() {
        let counter = Arc::new(AtomicUsize::new(0));
        let handle = ViewTimer::new("test", Duration::from_secs(5)).start(counting_tick(&counter));

        tokio::time::sleep(Duration::from_millis(10)).await;
        handle.stop();

        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_refresh_now_forces_tick() {
        let counter = Arc::new(AtomicUsize::new(0));
        let handle =
            ViewTimer::new("test", Duration::from_secs(60)).start(counting_tick(&counter));

        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(counter.load(Ordering::SeqCst), 1);

        handle.refresh_now();
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(counter.load(Ordering::SeqCst), 2);

        // Forced refresh resets the interval: no scheduled tick right after
        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(counter.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_tick_does_not_cancel() {
        let counter = Arc::new(AtomicUsize::new(0));
        let tick_counter = Arc::clone(&counter);
        let _handle = ViewTimer::new("test", Duration::from_secs(5)).start(move || {
            tick_counter.fetch_add(1, Ordering::SeqCst);
            std::future::ready(Err::<(), String>("simulated network error".to_string()))
        });

        tokio::time::sleep(Duration::from_secs(11)).await;
        assert_eq!(counter.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_tick_does_not_overlap() {
        let active = Arc::new(AtomicUsize::new(0));
        let max_seen = Arc::new(AtomicUsize::new(0));
        let ticks = Arc::new(AtomicUsize::new(0));

        let tick_active = Arc::clone(&active);
        let tick_max = Arc::clone(&max_seen);
        let tick_count = Arc::clone(&ticks);
        let _handle = ViewTimer::new("slow", Duration::from_secs(1)).start(move || {
            let active = Arc::clone(&tick_active);
            let max_seen = Arc::clone(&tick_max);
            let ticks = Arc::clone(&tick_count);
            async move {
                let now = active.fetch_add(1, Ordering::SeqCst) + 1;
                max_seen.fetch_max(now, Ordering::SeqCst);
                // Refresh takes three intervals to complete
                tokio::time::sleep(Duration::from_secs(3)).await;
                active.fetch_sub(1, Ordering::SeqCst);
                ticks.fetch_add(1, Ordering::SeqCst);
                Ok::<(), String>(())
            }
        });

        tokio::time::sleep(Duration::from_secs(13)).await;
        assert_eq!(max_seen.load(Ordering::SeqCst), 1);
        assert!(ticks.load(Ordering::SeqCst) >= 2);
    }
}
