//! Application-wide constants
//!
//! All durations are in unix milliseconds, matching the timestamps stored on
//! tracked thread records.

use std::time::{SystemTime, UNIX_EPOCH};

/// One day in milliseconds.
pub const DAY: u64 = 24 * 60 * 60 * 1000;

/// Minimum gap between two remote checks of the same thread (5 minutes).
/// A pass that runs inside this window skips the thread instead of
/// re-fetching it.
pub const CHECK_INTERVAL: u64 = 5 * 60 * 1000;

/// Minimum gap between two retention sweeps (six hours).
pub const CLEAN_INTERVAL: u64 = DAY / 4;

/// Current wall-clock time in unix milliseconds.
pub fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
