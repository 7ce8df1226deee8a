pub mod config;
pub mod constants;
pub mod engine;
pub mod fetcher;
pub mod models;
pub mod notify;
pub mod store;

// Re-export the main types at the crate root for convenience
pub use config::TrackerConfig;
pub use engine::{CommentTracker, SubscriptionRow, SubscriptionSort};
pub use fetcher::{FetchCommentCount, MetadataClient};
pub use models::{ThreadPatch, TrackedThread};
pub use notify::{NewCommentAlert, Notification, NotificationQueue, Notifier};
pub use store::CountStore;
