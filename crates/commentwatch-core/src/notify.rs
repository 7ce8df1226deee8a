//! Dismissible alerts raised by the tracker.
//!
//! The engine only knows the [`Notifier`] trait; how an alert is presented
//! (toast, desktop notification, plain print) is the consumer's business.
//! [`NotificationQueue`] is the bundled in-process implementation: one
//! visible notification at a time, priority replacement, auto-dismiss and a
//! short dedupe window for repeated messages.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

/// Raised when a subscribed thread has gained comments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewCommentAlert {
    /// Thread id, so the presenter can attach an unsubscribe action to the
    /// alert.
    pub thread_id: String,
    pub title: String,
    pub url: String,
}

/// Sink for tracker alerts.
pub trait Notifier {
    fn new_comments(&mut self, alert: NewCommentAlert);
}

/// Notification priority levels (higher = more important).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum NotificationLevel {
    Info,
    Warning,
    Error,
}

/// A single dismissible notification.
#[derive(Debug, Clone)]
pub struct Notification {
    pub message: String,
    pub level: NotificationLevel,
    /// How long the notification stays visible before auto-dismissing.
    pub duration: Duration,
    pub shown_at: Option<Instant>,
    /// Thread id for new-comment alerts; enables an unsubscribe control on
    /// the notification itself.
    pub thread_id: Option<String>,
}

impl Notification {
    pub fn info(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            level: NotificationLevel::Info,
            duration: Duration::from_secs(3),
            shown_at: None,
            thread_id: None,
        }
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            level: NotificationLevel::Warning,
            duration: Duration::from_secs(4),
            shown_at: None,
            thread_id: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            level: NotificationLevel::Error,
            duration: Duration::from_secs(5),
            shown_at: None,
            thread_id: None,
        }
    }

    /// A new-comments alert for a tracked thread (10 second duration, kept
    /// long so the unsubscribe control is actually reachable).
    pub fn new_comments(alert: &NewCommentAlert) -> Self {
        Self {
            message: format!("New comments on \"{}\" ({})", alert.title, alert.url),
            level: NotificationLevel::Warning,
            duration: Duration::from_secs(10),
            shown_at: None,
            thread_id: Some(alert.thread_id.clone()),
        }
    }

    /// Override the display duration.
    pub fn duration(mut self, duration: Duration) -> Self {
        self.duration = duration;
        self
    }

    pub fn is_expired(&self) -> bool {
        self.shown_at
            .map(|shown| shown.elapsed() >= self.duration)
            .unwrap_or(false)
    }

    fn mark_shown(&mut self) {
        if self.shown_at.is_none() {
            self.shown_at = Some(Instant::now());
        }
    }
}

/// Queue of notifications with priority handling.
#[derive(Debug, Default)]
pub struct NotificationQueue {
    /// Pending notifications, front = next to show.
    queue: VecDeque<Notification>,
    /// Currently displayed notification.
    current: Option<Notification>,
    /// Recently shown message hashes, for deduplication.
    recent_messages: Vec<(u64, Instant)>,
}

impl NotificationQueue {
    /// Window within which an identical message is considered a duplicate.
    const DEDUPE_WINDOW: Duration = Duration::from_secs(2);

    pub fn new() -> Self {
        Self::default()
    }

    /// Add a notification. A duplicate of a recently shown message is
    /// dropped; a higher-priority notification replaces the current one
    /// (the replaced one is not re-queued, it was already shown).
    pub fn push(&mut self, notification: Notification) {
        let hash = Self::hash_message(&notification.message);
        let now = Instant::now();

        self.recent_messages.retain(|(_, expiry)| *expiry > now);
        if self.recent_messages.iter().any(|(h, _)| *h == hash) {
            return;
        }
        self.recent_messages.push((hash, now + Self::DEDUPE_WINDOW));

        if let Some(ref current) = self.current {
            if notification.level > current.level {
                let mut n = notification;
                n.mark_shown();
                self.current = Some(n);
                return;
            }
        }

        if self.current.is_none() {
            let mut n = notification;
            n.mark_shown();
            self.current = Some(n);
        } else {
            let pos = self
                .queue
                .iter()
                .position(|n| n.level < notification.level)
                .unwrap_or(self.queue.len());
            self.queue.insert(pos, notification);
        }
    }

    pub fn current(&self) -> Option<&Notification> {
        self.current.as_ref()
    }

    /// Dismiss the current notification and advance the queue.
    pub fn dismiss(&mut self) {
        self.current = None;
        self.advance();
    }

    /// Advance past an expired notification. Call once per UI tick.
    pub fn tick(&mut self) {
        if let Some(ref current) = self.current {
            if current.is_expired() {
                self.current = None;
                self.advance();
            }
        }
    }

    fn advance(&mut self) {
        if self.current.is_none() {
            if let Some(mut next) = self.queue.pop_front() {
                next.mark_shown();
                self.current = Some(next);
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.current.is_none() && self.queue.is_empty()
    }

    pub fn clear(&mut self) {
        self.current = None;
        self.queue.clear();
    }

    fn hash_message(message: &str) -> u64 {
        use std::collections::hash_map::DefaultHasher;
        use std::hash::{Hash, Hasher};
        let mut hasher = DefaultHasher::new();
        message.hash(&mut hasher);
        hasher.finish()
    }
}

impl Notifier for NotificationQueue {
    fn new_comments(&mut self, alert: NewCommentAlert) {
        self.push(Notification::new_comments(&alert));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn alert(id: &str) -> NewCommentAlert {
        NewCommentAlert {
            thread_id: id.to_string(),
            title: format!("thread {id}"),
            url: format!("https://example.com/t/{id}"),
        }
    }

    #[test]
    fn test_new_comments_carries_thread_id() {
        let n = Notification::new_comments(&alert("abc"));
        assert_eq!(n.thread_id.as_deref(), Some("abc"));
        assert!(n.message.contains("thread abc"));
    }

    #[test]
    fn test_queue_basic() {
        let mut q = NotificationQueue::new();
        assert!(q.is_empty());

        q.push(Notification::info("first"));
        assert!(!q.is_empty());
        assert_eq!(q.current().unwrap().message, "first");

        q.dismiss();
        assert!(q.is_empty());
    }

    #[test]
    fn test_duplicate_messages_dropped() {
        let mut q = NotificationQueue::new();
        q.new_comments(alert("abc"));
        q.new_comments(alert("abc"));

        q.dismiss();
        assert!(q.is_empty());
    }

    #[test]
    fn test_priority_replaces_current() {
        let mut q = NotificationQueue::new();

        q.push(Notification::info("low"));
        q.push(Notification::error("high"));
        assert_eq!(q.current().unwrap().message, "high");

        // The replaced notification was dropped, not re-queued.
        q.dismiss();
        assert!(q.current().is_none());
    }

    #[test]
    fn test_lower_priority_waits_in_queue() {
        let mut q = NotificationQueue::new();

        q.push(Notification::warning("first"));
        q.push(Notification::info("second"));
        assert_eq!(q.current().unwrap().message, "first");

        q.dismiss();
        assert_eq!(q.current().unwrap().message, "second");
    }

    #[test]
    fn test_level_ordering() {
        assert!(NotificationLevel::Error > NotificationLevel::Warning);
        assert!(NotificationLevel::Warning > NotificationLevel::Info);
    }
}
