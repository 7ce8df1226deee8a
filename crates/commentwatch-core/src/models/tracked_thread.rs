use serde::{Deserialize, Serialize};

/// A discussion thread whose comment count is being tracked.
///
/// A record exists for every thread the user has visited while monitoring is
/// enabled. Whether the thread is merely watched or actively subscribed is
/// determined by the presence of `subscription_date`; removing the record
/// altogether stops tracking.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackedThread {
    /// Last known comment count.
    pub count: u64,
    pub url: String,
    pub title: String,
    /// When `count` was last refreshed from any source (unix ms).
    pub update_time: u64,
    /// Present while the thread has an active notification subscription.
    /// No skip attribute: the snapshot encoding is not self-describing, so
    /// every field must be written even when absent.
    #[serde(default)]
    pub subscription_date: Option<u64>,
    /// When a remote check was last attempted for this thread (unix ms).
    #[serde(default)]
    pub last_check: Option<u64>,
}

impl TrackedThread {
    pub fn is_subscribed(&self) -> bool {
        self.subscription_date.is_some()
    }
}

/// A partial record merged into an existing [`TrackedThread`] by
/// [`CountStore::patch`](crate::store::CountStore::patch).
///
/// Only fields that are `Some` are written; a patch cannot clear an optional
/// field (use the store's `clear_subscription` for that), so applying the
/// same patch twice is a no-op.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ThreadPatch {
    pub count: Option<u64>,
    pub url: Option<String>,
    pub title: Option<String>,
    pub update_time: Option<u64>,
    pub subscription_date: Option<u64>,
    pub last_check: Option<u64>,
}

impl ThreadPatch {
    pub fn count(mut self, count: u64) -> Self {
        self.count = Some(count);
        self
    }

    pub fn url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn update_time(mut self, update_time: u64) -> Self {
        self.update_time = Some(update_time);
        self
    }

    pub fn subscription_date(mut self, subscription_date: u64) -> Self {
        self.subscription_date = Some(subscription_date);
        self
    }

    pub fn last_check(mut self, last_check: u64) -> Self {
        self.last_check = Some(last_check);
        self
    }

    /// A visit patch: everything the page itself can tell us about a thread.
    pub fn visit(url: impl Into<String>, title: impl Into<String>, count: u64, now: u64) -> Self {
        Self::default()
            .count(count)
            .url(url)
            .title(title)
            .update_time(now)
    }

    /// Merge this patch into `record`, overwriting only the present fields.
    pub fn apply(self, record: &mut TrackedThread) {
        if let Some(count) = self.count {
            record.count = count;
        }
        if let Some(url) = self.url {
            record.url = url;
        }
        if let Some(title) = self.title {
            record.title = title;
        }
        if let Some(update_time) = self.update_time {
            record.update_time = update_time;
        }
        if let Some(subscription_date) = self.subscription_date {
            record.subscription_date = Some(subscription_date);
        }
        if let Some(last_check) = self.last_check {
            record.last_check = Some(last_check);
        }
    }
}
