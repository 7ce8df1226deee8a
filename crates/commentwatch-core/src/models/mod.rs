pub mod tracked_thread;

pub use tracked_thread::{ThreadPatch, TrackedThread};
