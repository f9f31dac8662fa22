//! Global unread message badge
//!
//! Holds the single unread-count badge shown in the app chrome. The count is
//! replaced wholesale by the badge view's poll; there is no local arithmetic
//! on it.

use tokio::sync::watch;

/// Maximum count the badge renders numerically (displays as "99+")
pub const MAX_BADGE_COUNT: u64 = 99;

/// Badge display value
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum BadgeDisplay {
    /// No unread messages
    #[default]
    None,
    /// Specific count (1-98)
    Count(u64),
    /// 99 or more unread messages
    Many,
}

impl BadgeDisplay {
    /// Create from a numeric count
    pub fn from_count(count: u64) -> Self {
        if count == 0 {
            BadgeDisplay::None
        } else if count >= MAX_BADGE_COUNT {
            BadgeDisplay::Many
        } else {
            BadgeDisplay::Count(count)
        }
    }

    /// Convert to display string
    pub fn as_display_string(&self) -> String {
        match self {
            BadgeDisplay::None => String::new(),
            BadgeDisplay::Count(n) => n.to_string(),
            BadgeDisplay::Many => format!("{}+", MAX_BADGE_COUNT),
        }
    }

    /// Check if there are any unread messages
    pub fn has_unread(&self) -> bool {
        !matches!(self, BadgeDisplay::None)
    }

    /// Get the numeric count (capped at [`MAX_BADGE_COUNT`])
    pub fn count(&self) -> u64 {
        match self {
            BadgeDisplay::None => 0,
            BadgeDisplay::Count(n) => *n,
            BadgeDisplay::Many => MAX_BADGE_COUNT,
        }
    }
}

impl std::fmt::Display for BadgeDisplay {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_display_string())
    }
}

/// Reactive unread badge state
pub struct UnreadBadge {
    tx: watch::Sender<BadgeDisplay>,
}

impl UnreadBadge {
    /// Create a badge with no unread messages
    pub fn new() -> Self {
        let (tx, _) = watch::channel(BadgeDisplay::None);
        Self { tx }
    }

    /// Replace the badge count; subscribers are only notified on change
    pub fn set_count(&self, count: u64) {
        let display = BadgeDisplay::from_count(count);
        self.tx.send_if_modified(|current| {
            if *current != display {
                *current = display;
                true
            } else {
                false
            }
        });
    }

    /// Current badge value
    pub fn current(&self) -> BadgeDisplay {
        self.tx.borrow().clone()
    }

    /// Subscribe to badge changes
    pub fn subscribe(&self) -> watch::Receiver<BadgeDisplay> {
        self.tx.subscribe()
    }

    /// Reset the badge (e.g., on logout)
    pub fn reset(&self) {
        self.set_count(0);
    }
}

impl Default for UnreadBadge {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_badge_display_from_count() {
        assert_eq!(BadgeDisplay::from_count(0), BadgeDisplay::None);
        assert_eq!(BadgeDisplay::from_count(1), BadgeDisplay::Count(1));
        assert_eq!(BadgeDisplay::from_count(98), BadgeDisplay::Count(98));
        assert_eq!(BadgeDisplay::from_count(99), BadgeDisplay::Many);
        assert_eq!(BadgeDisplay::from_count(500), BadgeDisplay::Many);
    }

    #[test]
    fn test_badge_display_strings() {
        assert_eq!(BadgeDisplay::None.as_display_string(), "");
        assert_eq!(BadgeDisplay::Count(7).as_display_string(), "7");
        assert_eq!(BadgeDisplay::Many.as_display_string(), "99+");
        assert_eq!(format!("{}", BadgeDisplay::Count(7)), "7");
    }

    #[test]
    fn test_badge_set_and_reset() {
        let badge = UnreadBadge::new();
        assert_eq!(badge.current(), BadgeDisplay::None);

        badge.set_count(3);
        assert_eq!(badge.current(), BadgeDisplay::Count(3));
        assert!(badge.current().has_unread());

        badge.reset();
        assert_eq!(badge.current(), BadgeDisplay::None);
    }

    #[tokio::test]
    async fn test_badge_subscription_on_change_only() {
        let badge = UnreadBadge::new();
        let mut rx = badge.subscribe();

        badge.set_count(5);
        rx.changed().await.unwrap();
        assert_eq!(*rx.borrow(), BadgeDisplay::Count(5));

        // Same count again does not wake subscribers
        badge.set_count(5);
        assert!(!rx.has_changed().unwrap());

        badge.set_count(6);
        assert!(rx.has_changed().unwrap());
    }
}
