//! tuyet - Local-first voice note capture and vault sync
//!
//! Voice notes are stored durably on the device first; a background worker
//! transcribes them and appends the result to an Obsidian-style vault.
//!
//! # Architecture
//!
//! The system is built local-first:
//! - Every capture lands in SQLite before any network call
//! - Offline captures wait in an append-only queue log (state by replay)
//! - The sync worker drains the queue with bounded retries
//! - A retention sweep deletes old notes unless they are bookmarked
//!
//! # Modules
//!
//! - `store`: SQLite record store (audio + transcripts)
//! - `queue`: durable offline queue (JSONL event log)
//! - `bridge`: HTTP collaborators (transcription backend, vault bridge)
//! - `sync`: the sync worker and markdown formatting
//! - `retention`: expiry sweep
//! - `corrections`: user edits to low-confidence spans
//! - `cli`: command-line interface
//!
//! # Usage
//!
//! ```bash
//! # Capture a recording
//! tuyet capture note.m4a --duration 4.2
//!
//! # Drain the offline queue once
//! tuyet process --once
//!
//! # Correct a low-confidence span
//! tuyet correct <transcript-id> 0 "mua hai hop sua"
//! ```

pub mod bridge;
pub mod cli;
pub mod config;
pub mod corrections;
pub mod domain;
pub mod queue;
pub mod retention;
pub mod store;
pub mod sync;

// Re-export main types at crate root for convenience
pub use bridge::{BridgeError, Transcriber, Transcription, VaultBridge};
pub use config::Config;
pub use corrections::CorrectionError;
pub use domain::{AudioRecord, AudioStatus, ConfidenceSpan, TranscriptRecord};
pub use queue::{OfflineQueue, OfflineQueueItem, QueueError};
pub use store::{RecordStore, StoreError};
pub use sync::{CaptureOutcome, DrainReport, SyncWorker};
