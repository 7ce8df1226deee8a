pub mod count_store;
pub mod snapshot;

pub use count_store::CountStore;
pub use snapshot::{Snapshot, SNAPSHOT_SCHEMA_VERSION};

/// Errors from the explicit persist/load paths of the count store.
///
/// Routine mutations persist best-effort and only log on failure; this type
/// is surfaced by [`CountStore::persist`] for callers that want to know.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("snapshot io: {0}")]
    Io(#[from] std::io::Error),
    #[error("snapshot encode: {0}")]
    Encode(#[from] bincode::Error),
}
