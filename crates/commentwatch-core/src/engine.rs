//! Subscription reconciliation over the persisted count store.
//!
//! [`CommentTracker`] owns the store and the tracker options and exposes the
//! operations the host UI drives: recording visits, toggling subscriptions,
//! the once-per-load reconciliation pass, and the retention sweep. Remote
//! fetching and alert presentation stay behind the [`FetchCommentCount`] and
//! [`Notifier`] seams.
//!
//! Everything runs on a single task: the scan-and-decide phase of a pass
//! never awaits, so two passes in the same process cannot interleave their
//! decisions. Across processes the only coordination is the persisted
//! `last_check` timestamp, which bounds (but does not strictly prevent)
//! duplicate remote checks inside the check interval.

use crate::config::TrackerConfig;
use crate::constants::{CHECK_INTERVAL, CLEAN_INTERVAL};
use crate::fetcher::FetchCommentCount;
use crate::models::ThreadPatch;
use crate::notify::{NewCommentAlert, Notifier};
use crate::store::CountStore;

pub struct CommentTracker {
    store: CountStore,
    config: TrackerConfig,
}

/// Sort key for the subscription management table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscriptionSort {
    Title,
    Updated,
    Expires,
}

/// One row of the subscription management table.
#[derive(Debug, Clone)]
pub struct SubscriptionRow {
    pub id: String,
    pub title: String,
    pub url: String,
    /// When the count was last refreshed (unix ms).
    pub update_time: u64,
    pub subscribed_at: u64,
    /// When the subscription will expire (unix ms).
    pub expires_at: u64,
}

impl CommentTracker {
    pub fn new(store: CountStore, config: TrackerConfig) -> Self {
        Self { store, config }
    }

    pub fn store(&self) -> &CountStore {
        &self.store
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    // ----- page-visit bookkeeping -----

    /// Record a visit to a thread's comments page, creating or refreshing
    /// its record. Returns whether the visit was recorded (monitoring can be
    /// disabled entirely, or for private browsing only).
    pub fn record_visit(
        &mut self,
        id: &str,
        url: &str,
        title: &str,
        count: u64,
        now: u64,
        incognito: bool,
    ) -> bool {
        if !self.config.monitor_posts_visited {
            return false;
        }
        if incognito && !self.config.monitor_posts_visited_incognito {
            return false;
        }

        self.store.patch(id, ThreadPatch::visit(url, title, count, now));
        true
    }

    /// Bump the stored count by one when the user's own freshly posted
    /// comment is observed, so it is not later reported back as "new".
    /// Subject to the same monitoring gates as `record_visit`, and only
    /// applies to threads that already have a record.
    pub fn record_own_comment(&mut self, id: &str, now: u64, incognito: bool) -> bool {
        if !self.config.monitor_posts_visited {
            return false;
        }
        if incognito && !self.config.monitor_posts_visited_incognito {
            return false;
        }

        let Some(record) = self.store.get(id) else {
            return false;
        };
        let next = record.count + 1;
        self.store.patch(id, ThreadPatch::default().count(next).update_time(now));
        true
    }

    /// Comment delta for the "(n new)" badge on listing pages:
    /// how many comments the thread has gained since it was last opened.
    /// `None` when the thread is not tracked or nothing changed.
    pub fn new_comment_delta(&self, id: &str, current_count: u64) -> Option<u64> {
        let record = self.store.get(id)?;
        let delta = current_count.saturating_sub(record.count);
        (delta > 0).then_some(delta)
    }

    // ----- subscription lifecycle -----

    /// Subscribe to a thread, starting the subscription clock at `now`.
    /// Only threads that already have a record can be subscribed, so an
    /// unknown id never turns into an empty record that a later pass would
    /// fetch and alert on. Renewing is the same operation: the clock simply
    /// restarts. Returns whether the thread was subscribed.
    pub fn subscribe(&mut self, id: &str, now: u64) -> bool {
        if self.store.get(id).is_none() {
            return false;
        }
        self.store
            .patch(id, ThreadPatch::default().subscription_date(now));
        true
    }

    pub fn renew(&mut self, id: &str, now: u64) -> bool {
        self.subscribe(id, now)
    }

    /// Drop the subscription but keep watching the thread's count.
    pub fn unsubscribe(&mut self, id: &str) {
        self.store.clear_subscription(id);
    }

    /// Delete the thread's record entirely. Destructive; callers are
    /// expected to confirm with the user first. Returns whether a record
    /// existed.
    pub fn stop_tracking(&mut self, id: &str) -> bool {
        self.store.remove(id)
    }

    /// Rows for the subscription management table, subscribed threads only.
    pub fn subscriptions(&self, sort: SubscriptionSort, descending: bool) -> Vec<SubscriptionRow> {
        let window = self.config.subscription_window();

        let mut rows: Vec<SubscriptionRow> = self
            .store
            .all()
            .iter()
            .filter_map(|(id, record)| {
                let subscribed_at = record.subscription_date?;
                Some(SubscriptionRow {
                    id: id.clone(),
                    title: record.title.clone(),
                    url: record.url.clone(),
                    update_time: record.update_time,
                    subscribed_at,
                    expires_at: subscribed_at.saturating_add(window),
                })
            })
            .collect();

        match sort {
            SubscriptionSort::Title => rows.sort_by(|a, b| a.title.cmp(&b.title)),
            SubscriptionSort::Updated => rows.sort_by(|a, b| a.update_time.cmp(&b.update_time)),
            SubscriptionSort::Expires => rows.sort_by(|a, b| a.expires_at.cmp(&b.expires_at)),
        }
        if descending {
            rows.reverse();
        }

        rows
    }

    // ----- reconciliation pass -----

    /// One reconciliation pass over all subscribed threads. Expected to run
    /// once per host page load, not on a timer.
    ///
    /// Expired subscriptions are cleared locally first; the remaining
    /// subscribed threads are checked remotely unless they were already
    /// checked within the last check interval. The mutated set is written
    /// back before any fetch is awaited. Returns the number of remote
    /// checks issued.
    pub async fn check_subscriptions<F, N>(
        &mut self,
        fetcher: &F,
        notifier: &mut N,
        now: u64,
    ) -> usize
    where
        F: FetchCommentCount,
        N: Notifier,
    {
        let subscription_window = self.config.subscription_window();

        let mut counts = self.store.all().clone();
        let mut due: Vec<String> = Vec::new();

        for (id, record) in counts.iter_mut() {
            let Some(subscribed_at) = record.subscription_date else {
                continue;
            };

            if now.saturating_sub(subscribed_at) > subscription_window {
                tracing::debug!("subscription expired for thread {id}");
                record.subscription_date = None;
                continue;
            }

            let last_check = record.last_check.unwrap_or(0);
            if now.saturating_sub(last_check) > CHECK_INTERVAL {
                record.last_check = Some(now);
                due.push(id.clone());
            }
        }

        self.store.replace_all(counts);

        for id in &due {
            match fetcher.fetch(id).await {
                Ok(remote_count) => self.apply_remote_count(notifier, id, remote_count, now),
                // Dropped on the floor on purpose: last_check stays set, so
                // the next pass at least one check interval later retries.
                Err(e) => tracing::debug!("remote check failed for thread {id}: {e:#}"),
            }
        }

        due.len()
    }

    /// Fold a fetched count into the store. Remote counts only ever raise
    /// the stored value; a lower count from upstream (comment removal) is
    /// ignored until the next increase, and an unchanged count does
    /// nothing. Only an actual increase mutates the record and raises an
    /// alert.
    fn apply_remote_count<N: Notifier>(
        &mut self,
        notifier: &mut N,
        id: &str,
        remote_count: u64,
        now: u64,
    ) {
        let Some(record) = self.store.get(id) else {
            return;
        };
        if remote_count <= record.count {
            return;
        }

        let previous = record.count;
        let alert = NewCommentAlert {
            thread_id: id.to_string(),
            title: record.title.clone(),
            url: record.url.clone(),
        };

        self.store
            .patch(id, ThreadPatch::default().count(remote_count).update_time(now));

        tracing::info!("thread {id} gained comments ({previous} -> {remote_count})");
        notifier.new_comments(alert);
    }

    // ----- retention sweep -----

    /// Run the retention sweep unless one already ran within the clean
    /// interval. Returns whether it ran.
    pub fn maybe_clean(&mut self, now: u64) -> bool {
        if now.saturating_sub(self.store.last_clean()) <= CLEAN_INTERVAL {
            return false;
        }
        self.clean_old_counts(now);
        true
    }

    /// Delete every non-subscribed record whose count has not been updated
    /// within the retention window. Subscribed records always survive,
    /// whatever their age.
    pub fn clean_old_counts(&mut self, now: u64) {
        self.store.set_last_clean(now);
        let window = self.config.retention_window();

        let stale: Vec<String> = self
            .store
            .all()
            .iter()
            .filter(|(_, record)| {
                !record.is_subscribed() && now.saturating_sub(record.update_time) > window
            })
            .map(|(id, _)| id.clone())
            .collect();

        for id in stale {
            tracing::debug!("retention sweep dropping thread {id}");
            self.store.remove(&id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::DAY;
    use crate::notify::NotificationQueue;
    use crate::store::CountStore;
    use anyhow::Result;
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};

    /// Serves canned counts and records which threads were asked for.
    #[derive(Default, Clone)]
    struct FakeFetcher {
        counts: HashMap<String, u64>,
        calls: Arc<Mutex<Vec<String>>>,
    }

    impl FakeFetcher {
        fn with_count(id: &str, count: u64) -> Self {
            let mut counts = HashMap::new();
            counts.insert(id.to_string(), count);
            Self {
                counts,
                calls: Arc::default(),
            }
        }

        fn failing() -> Self {
            Self::default()
        }

        fn call_count(&self) -> usize {
            self.calls.lock().unwrap().len()
        }
    }

    impl FetchCommentCount for FakeFetcher {
        async fn fetch(&self, thread_id: &str) -> Result<u64> {
            self.calls.lock().unwrap().push(thread_id.to_string());
            self.counts
                .get(thread_id)
                .copied()
                .ok_or_else(|| anyhow::anyhow!("no metadata for {thread_id}"))
        }
    }

    #[derive(Default)]
    struct RecordingNotifier {
        alerts: Vec<NewCommentAlert>,
    }

    impl Notifier for RecordingNotifier {
        fn new_comments(&mut self, alert: NewCommentAlert) {
            self.alerts.push(alert);
        }
    }

    const T0: u64 = 1_700_000_000_000;

    fn tracker(dir: &std::path::Path) -> CommentTracker {
        CommentTracker::new(CountStore::open(dir), TrackerConfig::default())
    }

    fn subscribed_thread(tracker: &mut CommentTracker, id: &str, count: u64, subscribed_at: u64) {
        tracker.record_visit(
            id,
            &format!("https://example.com/t/{id}"),
            &format!("thread {id}"),
            count,
            subscribed_at,
            false,
        );
        assert!(tracker.subscribe(id, subscribed_at));
    }

    #[tokio::test]
    async fn test_active_subscription_is_checked() {
        let dir = tempfile::tempdir().unwrap();
        let mut tracker = tracker(dir.path());
        subscribed_thread(&mut tracker, "abc", 10, T0);

        let fetcher = FakeFetcher::with_count("abc", 10);
        let mut notifier = RecordingNotifier::default();

        // One day in, with a two-day subscription window.
        let now = T0 + DAY;
        let issued = tracker.check_subscriptions(&fetcher, &mut notifier, now).await;

        assert_eq!(issued, 1);
        let record = tracker.store().get("abc").unwrap();
        assert_eq!(record.subscription_date, Some(T0));
        assert_eq!(record.last_check, Some(now));
    }

    #[tokio::test]
    async fn test_expired_subscription_cleared_without_fetch() {
        let dir = tempfile::tempdir().unwrap();
        let mut tracker = tracker(dir.path());
        subscribed_thread(&mut tracker, "abc", 10, T0);

        let fetcher = FakeFetcher::with_count("abc", 99);
        let mut notifier = RecordingNotifier::default();

        // Three days in: past the two-day window, expired before any check.
        let issued = tracker
            .check_subscriptions(&fetcher, &mut notifier, T0 + 3 * DAY)
            .await;

        assert_eq!(issued, 0);
        assert_eq!(fetcher.call_count(), 0);
        let record = tracker.store().get("abc").unwrap();
        assert!(record.subscription_date.is_none());
        assert!(record.last_check.is_none());
        assert!(notifier.alerts.is_empty());
    }

    #[tokio::test]
    async fn test_debounce_window_limits_checks() {
        let dir = tempfile::tempdir().unwrap();
        let mut tracker = tracker(dir.path());
        subscribed_thread(&mut tracker, "abc", 10, T0);

        let fetcher = FakeFetcher::with_count("abc", 10);
        let mut notifier = RecordingNotifier::default();

        tracker
            .check_subscriptions(&fetcher, &mut notifier, T0 + 1000)
            .await;
        // Two minutes later: still inside the five-minute window.
        tracker
            .check_subscriptions(&fetcher, &mut notifier, T0 + 1000 + 2 * 60 * 1000)
            .await;

        assert_eq!(fetcher.call_count(), 1);
    }

    #[tokio::test]
    async fn test_fetch_failure_retries_after_window() {
        let dir = tempfile::tempdir().unwrap();
        let mut tracker = tracker(dir.path());
        subscribed_thread(&mut tracker, "abc", 10, T0);

        let fetcher = FakeFetcher::failing();
        let mut notifier = RecordingNotifier::default();

        tracker
            .check_subscriptions(&fetcher, &mut notifier, T0 + 1000)
            .await;
        assert_eq!(fetcher.call_count(), 1);

        // The failure left last_check set; six minutes later the window has
        // passed and the thread is checked again.
        tracker
            .check_subscriptions(&fetcher, &mut notifier, T0 + 1000 + 6 * 60 * 1000)
            .await;
        assert_eq!(fetcher.call_count(), 2);
        assert!(notifier.alerts.is_empty());
    }

    #[tokio::test]
    async fn test_count_increase_updates_and_notifies() {
        let dir = tempfile::tempdir().unwrap();
        let mut tracker = tracker(dir.path());
        subscribed_thread(&mut tracker, "abc", 5, T0);

        let fetcher = FakeFetcher::with_count("abc", 8);
        let mut notifier = RecordingNotifier::default();

        let now = T0 + 1000;
        tracker.check_subscriptions(&fetcher, &mut notifier, now).await;

        let record = tracker.store().get("abc").unwrap();
        assert_eq!(record.count, 8);
        assert_eq!(record.update_time, now);
        assert_eq!(notifier.alerts.len(), 1);
        assert_eq!(notifier.alerts[0].thread_id, "abc");
        assert_eq!(notifier.alerts[0].title, "thread abc");
    }

    #[tokio::test]
    async fn test_equal_or_lower_count_is_ignored() {
        for remote in [5u64, 3] {
            let dir = tempfile::tempdir().unwrap();
            let mut tracker = tracker(dir.path());
            subscribed_thread(&mut tracker, "abc", 5, T0);

            let fetcher = FakeFetcher::with_count("abc", remote);
            let mut notifier = RecordingNotifier::default();

            tracker
                .check_subscriptions(&fetcher, &mut notifier, T0 + 1000)
                .await;

            let record = tracker.store().get("abc").unwrap();
            assert_eq!(record.count, 5, "remote={remote}");
            assert_eq!(record.update_time, T0, "remote={remote}");
            assert!(notifier.alerts.is_empty(), "remote={remote}");
        }
    }

    #[tokio::test]
    async fn test_alert_flows_into_notification_queue() {
        let dir = tempfile::tempdir().unwrap();
        let mut tracker = tracker(dir.path());
        subscribed_thread(&mut tracker, "abc", 5, T0);

        let fetcher = FakeFetcher::with_count("abc", 8);
        let mut queue = NotificationQueue::new();

        tracker
            .check_subscriptions(&fetcher, &mut queue, T0 + 1000)
            .await;

        let current = queue.current().expect("alert should be queued");
        assert_eq!(current.thread_id.as_deref(), Some("abc"));
        assert!(current.message.contains("thread abc"));
    }

    #[tokio::test]
    async fn test_unsubscribed_threads_never_checked() {
        let dir = tempfile::tempdir().unwrap();
        let mut tracker = tracker(dir.path());
        tracker.record_visit("abc", "u", "t", 10, T0, false);

        let fetcher = FakeFetcher::with_count("abc", 99);
        let mut notifier = RecordingNotifier::default();

        let issued = tracker
            .check_subscriptions(&fetcher, &mut notifier, T0 + 1000)
            .await;

        assert_eq!(issued, 0);
        assert_eq!(fetcher.call_count(), 0);
    }

    #[test]
    fn test_retention_sweep() {
        let dir = tempfile::tempdir().unwrap();
        let mut tracker = tracker(dir.path());

        // Stale but subscribed: survives.
        subscribed_thread(&mut tracker, "subscribed", 1, T0);
        // Stale and unsubscribed: swept.
        tracker.record_visit("stale", "u", "t", 1, T0, false);
        // Fresh and unsubscribed: kept.
        tracker.record_visit("fresh", "u", "t", 1, T0 + 8 * DAY, false);

        // Default retention is seven days.
        tracker.clean_old_counts(T0 + 8 * DAY);

        assert!(tracker.store().get("subscribed").is_some());
        assert!(tracker.store().get("stale").is_none());
        assert!(tracker.store().get("fresh").is_some());
    }

    #[test]
    fn test_maybe_clean_gated_by_last_clean() {
        let dir = tempfile::tempdir().unwrap();
        let mut tracker = tracker(dir.path());
        tracker.record_visit("stale", "u", "t", 1, 0, false);

        assert!(tracker.maybe_clean(T0));
        assert!(tracker.store().get("stale").is_none());

        // An hour later the six-hour gate holds.
        tracker.record_visit("stale2", "u", "t", 1, 0, false);
        assert!(!tracker.maybe_clean(T0 + 60 * 60 * 1000));
        assert!(tracker.store().get("stale2").is_some());

        // Seven hours later it runs again.
        assert!(tracker.maybe_clean(T0 + 7 * 60 * 60 * 1000));
        assert!(tracker.store().get("stale2").is_none());
    }

    #[test]
    fn test_record_visit_monitoring_gates() {
        let dir = tempfile::tempdir().unwrap();

        let mut tracker = CommentTracker::new(
            CountStore::open(dir.path()),
            TrackerConfig {
                monitor_posts_visited: false,
                ..Default::default()
            },
        );
        assert!(!tracker.record_visit("abc", "u", "t", 1, T0, false));
        assert!(tracker.store().get("abc").is_none());

        let dir = tempfile::tempdir().unwrap();
        let mut tracker = tracker_with_incognito(dir.path(), false);
        assert!(!tracker.record_visit("abc", "u", "t", 1, T0, true));
        assert!(tracker.record_visit("abc", "u", "t", 1, T0, false));

        let dir = tempfile::tempdir().unwrap();
        let mut tracker = tracker_with_incognito(dir.path(), true);
        assert!(tracker.record_visit("abc", "u", "t", 1, T0, true));
    }

    fn tracker_with_incognito(dir: &std::path::Path, incognito: bool) -> CommentTracker {
        CommentTracker::new(
            CountStore::open(dir),
            TrackerConfig {
                monitor_posts_visited_incognito: incognito,
                ..Default::default()
            },
        )
    }

    #[test]
    fn test_record_own_comment() {
        let dir = tempfile::tempdir().unwrap();
        let mut tracker = tracker(dir.path());

        // Unknown thread: nothing to bump.
        assert!(!tracker.record_own_comment("abc", T0, false));

        tracker.record_visit("abc", "u", "t", 5, T0, false);
        assert!(tracker.record_own_comment("abc", T0 + 1000, false));

        let record = tracker.store().get("abc").unwrap();
        assert_eq!(record.count, 6);
        assert_eq!(record.update_time, T0 + 1000);
    }

    #[test]
    fn test_record_own_comment_respects_monitoring_gates() {
        // Monitoring disabled: the bump is refused even for a known thread.
        let dir = tempfile::tempdir().unwrap();
        let mut tracker = CommentTracker::new(
            CountStore::open(dir.path()),
            TrackerConfig {
                monitor_posts_visited: false,
                ..Default::default()
            },
        );
        tracker.store.patch("abc", ThreadPatch::visit("u", "t", 5, T0));
        assert!(!tracker.record_own_comment("abc", T0 + 1000, false));
        assert_eq!(tracker.store().get("abc").unwrap().count, 5);

        // Private browsing follows the incognito option, like record_visit.
        let dir = tempfile::tempdir().unwrap();
        let mut tracker = tracker_with_incognito(dir.path(), false);
        tracker.record_visit("abc", "u", "t", 5, T0, false);
        assert!(!tracker.record_own_comment("abc", T0 + 1000, true));
        assert_eq!(tracker.store().get("abc").unwrap().count, 5);

        let dir = tempfile::tempdir().unwrap();
        let mut tracker = tracker_with_incognito(dir.path(), true);
        tracker.record_visit("abc", "u", "t", 5, T0, false);
        assert!(tracker.record_own_comment("abc", T0 + 1000, true));
        assert_eq!(tracker.store().get("abc").unwrap().count, 6);
    }

    #[test]
    fn test_new_comment_delta() {
        let dir = tempfile::tempdir().unwrap();
        let mut tracker = tracker(dir.path());

        assert_eq!(tracker.new_comment_delta("abc", 10), None);

        tracker.record_visit("abc", "u", "t", 10, T0, false);
        assert_eq!(tracker.new_comment_delta("abc", 10), None);
        assert_eq!(tracker.new_comment_delta("abc", 13), Some(3));
        // Clamped: fewer comments than last seen reports no delta.
        assert_eq!(tracker.new_comment_delta("abc", 7), None);
    }

    #[test]
    fn test_subscribe_unsubscribe_renew() {
        let dir = tempfile::tempdir().unwrap();
        let mut tracker = tracker(dir.path());
        tracker.record_visit("abc", "u", "t", 5, T0, false);

        assert!(tracker.subscribe("abc", T0));
        assert_eq!(tracker.store().get("abc").unwrap().subscription_date, Some(T0));

        assert!(tracker.renew("abc", T0 + DAY));
        assert_eq!(
            tracker.store().get("abc").unwrap().subscription_date,
            Some(T0 + DAY)
        );

        tracker.unsubscribe("abc");
        assert!(!tracker.store().get("abc").unwrap().is_subscribed());
        // Still watched after unsubscribing.
        assert_eq!(tracker.store().get("abc").unwrap().count, 5);
    }

    #[test]
    fn test_subscribe_requires_tracked_thread() {
        let dir = tempfile::tempdir().unwrap();
        let mut tracker = tracker(dir.path());

        // No record yet: refused, and no empty record is created.
        assert!(!tracker.subscribe("abc", T0));
        assert!(!tracker.renew("abc", T0));
        assert!(tracker.store().get("abc").is_none());

        tracker.record_visit("abc", "u", "t", 5, T0, false);
        assert!(tracker.subscribe("abc", T0));
    }

    #[test]
    fn test_stop_tracking() {
        let dir = tempfile::tempdir().unwrap();
        let mut tracker = tracker(dir.path());
        tracker.record_visit("abc", "u", "t", 5, T0, false);

        assert!(tracker.stop_tracking("abc"));
        assert!(tracker.store().get("abc").is_none());
        assert!(!tracker.stop_tracking("abc"));
    }

    #[test]
    fn test_subscriptions_table_rows() {
        let dir = tempfile::tempdir().unwrap();
        let mut tracker = tracker(dir.path());

        subscribed_thread(&mut tracker, "b", 1, T0 + 1000);
        subscribed_thread(&mut tracker, "a", 1, T0);
        // Watched-only threads are not listed.
        tracker.record_visit("c", "u", "t", 1, T0, false);

        let rows = tracker.subscriptions(SubscriptionSort::Title, false);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].title, "thread a");
        assert_eq!(rows[1].title, "thread b");
        assert_eq!(rows[0].expires_at, T0 + 2 * DAY);

        let rows = tracker.subscriptions(SubscriptionSort::Expires, true);
        assert_eq!(rows[0].id, "b");
    }
}
