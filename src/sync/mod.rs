//! Remote synchronization: queue draining, retry policy, note formatting.

pub mod formatter;
pub mod worker;

pub use worker::{CaptureOutcome, DrainReport, SyncWorker, MAX_RETRIES};
