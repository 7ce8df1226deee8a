//! Persisted key/value store of tracked thread records.
//!
//! The in-memory map is the source of truth for all reads. Every mutation
//! updates the map first and then rewrites the disk snapshot best-effort:
//! a persist failure is logged as a warning and never propagated, so the
//! live state and the durable copy cannot diverge fatally.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use super::snapshot::{self, Snapshot};
use super::StoreError;
use crate::models::{ThreadPatch, TrackedThread};

pub struct CountStore {
    data_dir: PathBuf,
    counts: HashMap<String, TrackedThread>,
    /// When the retention sweep last ran (unix ms).
    last_clean: u64,
}

impl CountStore {
    /// Open the store at `data_dir`, loading the existing snapshot when one
    /// is present and readable. A missing, corrupt or incompatible snapshot
    /// starts an empty store.
    pub fn open<P: AsRef<Path>>(data_dir: P) -> Self {
        let data_dir = data_dir.as_ref().to_path_buf();
        let Snapshot { counts, last_clean } =
            snapshot::load_snapshot(&data_dir).unwrap_or_default();

        Self {
            data_dir,
            counts,
            last_clean,
        }
    }

    pub fn all(&self) -> &HashMap<String, TrackedThread> {
        &self.counts
    }

    pub fn get(&self, id: &str) -> Option<&TrackedThread> {
        self.counts.get(id)
    }

    pub fn len(&self) -> usize {
        self.counts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    /// Shallow-merge `patch` into the record for `id`, creating the record
    /// (with default fields) if it does not exist yet.
    pub fn patch(&mut self, id: &str, patch: ThreadPatch) {
        let record = self.counts.entry(id.to_string()).or_default();
        patch.apply(record);
        self.persist_soft();
    }

    /// Delete the whole record for `id`. Returns whether it existed.
    pub fn remove(&mut self, id: &str) -> bool {
        let removed = self.counts.remove(id).is_some();
        if removed {
            self.persist_soft();
        }
        removed
    }

    /// Delete only the subscription field, leaving the rest of the record
    /// (count history, display metadata) in place.
    pub fn clear_subscription(&mut self, id: &str) {
        if let Some(record) = self.counts.get_mut(id) {
            record.subscription_date = None;
            self.persist_soft();
        }
    }

    /// Replace the entire record map. Used by the reconciliation pass to
    /// write back its mutated working set in one go.
    pub fn replace_all(&mut self, counts: HashMap<String, TrackedThread>) {
        self.counts = counts;
        self.persist_soft();
    }

    pub fn last_clean(&self) -> u64 {
        self.last_clean
    }

    pub fn set_last_clean(&mut self, now: u64) {
        self.last_clean = now;
        self.persist_soft();
    }

    /// Write the current state to disk, surfacing the error to the caller.
    pub fn persist(&self) -> Result<(), StoreError> {
        let snapshot = Snapshot {
            counts: self.counts.clone(),
            last_clean: self.last_clean,
        };
        snapshot::save_snapshot(&self.data_dir, &snapshot)
    }

    /// Fire-and-forget persist used by all routine mutations. The in-memory
    /// state is already updated when this runs; a write failure only costs
    /// durability, so it is logged and swallowed.
    fn persist_soft(&self) {
        if let Err(e) = self.persist() {
            tracing::warn!(
                "count store: failed to persist snapshot to {}: {}",
                self.data_dir.display(),
                e
            );
        }
    }
}
