//! Disk snapshot for the count store.
//!
//! The whole record map is serialized to a single binary file inside the
//! data directory. On startup the snapshot is loaded back into memory and
//! every subsequent read is served from the in-memory map; the file exists
//! for durability only.
//!
//! # Invalidation
//! The snapshot is silently discarded (and the store starts empty) when:
//! - `SNAPSHOT_SCHEMA_VERSION` does not match (a code change altered the
//!   stored types)
//! - the file is missing or fails to deserialize

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use super::StoreError;
use crate::constants::now_ms;
use crate::models::TrackedThread;

/// Increment whenever the schema of [`Snapshot`] or [`TrackedThread`]
/// changes in a way that would make old files unreadable.
pub const SNAPSHOT_SCHEMA_VERSION: u32 = 1;

/// Versioned binary envelope wrapping the actual payload.
#[derive(Serialize, Deserialize)]
struct SnapshotEnvelope {
    schema_version: u32,
    /// Unix ms when this snapshot was written.
    saved_at: u64,
    snapshot: Snapshot,
}

/// The persisted state of the count store.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Snapshot {
    /// Tracked records keyed by thread id.
    pub counts: HashMap<String, TrackedThread>,
    /// When the retention sweep last ran (unix ms). Gates the sweep to at
    /// most once per clean interval.
    pub last_clean: u64,
}

/// Returns the path of the snapshot file inside `data_dir`.
pub fn snapshot_path(data_dir: &Path) -> PathBuf {
    data_dir.join("comment_counts.bin")
}

/// Serialize `snapshot` and write it atomically to
/// `<data_dir>/comment_counts.bin`.
///
/// Uses a write-to-temp-then-rename pattern so an unexpected shutdown
/// mid-write cannot leave a truncated file behind.
pub fn save_snapshot(data_dir: &Path, snapshot: &Snapshot) -> Result<(), StoreError> {
    let envelope = SnapshotEnvelope {
        schema_version: SNAPSHOT_SCHEMA_VERSION,
        saved_at: now_ms(),
        snapshot: snapshot.clone(),
    };

    let bytes = bincode::serialize(&envelope)?;

    std::fs::create_dir_all(data_dir)?;
    let snapshot_file = snapshot_path(data_dir);
    let temp_file = snapshot_file.with_extension("bin.tmp");

    std::fs::write(&temp_file, &bytes)?;
    std::fs::rename(&temp_file, &snapshot_file)?;

    Ok(())
}

/// Attempt to load the snapshot from `<data_dir>/comment_counts.bin`.
///
/// Returns `None` on any failure (missing file, corrupt data, schema
/// version mismatch); the caller starts from an empty store.
pub fn load_snapshot(data_dir: &Path) -> Option<Snapshot> {
    let bytes = std::fs::read(snapshot_path(data_dir)).ok()?;

    let envelope: SnapshotEnvelope = bincode::deserialize(&bytes).ok()?;

    if envelope.schema_version != SNAPSHOT_SCHEMA_VERSION {
        tracing::info!(
            "snapshot: schema version mismatch (stored={} current={}), discarding",
            envelope.schema_version,
            SNAPSHOT_SCHEMA_VERSION
        );
        return None;
    }

    Some(envelope.snapshot)
}
