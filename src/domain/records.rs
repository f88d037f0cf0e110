//! Record types for the local store.
//!
//! The store is the single source of truth: audio captures own their raw
//! bytes, transcripts own the derived text. The offline queue only holds
//! references into these records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Spans below this confidence are kept for user review.
pub const LOW_CONFIDENCE_THRESHOLD: f64 = 0.7;

/// Lifecycle of a raw audio capture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AudioStatus {
    /// Captured online, transcription in flight
    Processing,
    /// Transcribed and stored locally
    Saved,
    /// Captured while the bridge was unreachable, waiting in the queue
    OfflinePending,
    /// Terminal failure, requires user attention
    Error,
}

impl AudioStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AudioStatus::Processing => "processing",
            AudioStatus::Saved => "saved",
            AudioStatus::OfflinePending => "offline_pending",
            AudioStatus::Error => "error",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "processing" => Some(AudioStatus::Processing),
            "saved" => Some(AudioStatus::Saved),
            "offline_pending" => Some(AudioStatus::OfflinePending),
            "error" => Some(AudioStatus::Error),
            _ => None,
        }
    }
}

impl std::fmt::Display for AudioStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One raw capture. The audio bytes live alongside this record in the store
/// but are fetched separately; the core never inspects them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudioRecord {
    pub id: String,

    /// Capture length in seconds
    pub duration_secs: f64,

    /// Mime type of the stored bytes, forwarded to the transcription backend
    pub mime_type: String,

    pub captured_at: DateTime<Utc>,

    pub status: AudioStatus,

    /// Back-reference set once transcription completes
    pub transcript_id: Option<String>,
}

impl AudioRecord {
    pub fn new(duration_secs: f64, mime_type: &str, status: AudioStatus) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            duration_secs,
            mime_type: mime_type.to_string(),
            captured_at: Utc::now(),
            status,
            transcript_id: None,
        }
    }
}

/// A time-bounded stretch of transcript text with its recognition confidence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfidenceSpan {
    pub start_ms: u64,
    pub end_ms: u64,
    pub text: String,
    /// In [0, 1]
    pub confidence: f64,
}

/// The text artifact derived from one audio capture (1:1).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptRecord {
    pub id: String,

    /// Owning audio record
    pub audio_id: String,

    /// Full transcript text; corrections mutate this
    pub text: String,

    pub detected_language: String,

    /// Spans flagged for user review, ordered by start time.
    /// Invariant: after a correction, a span's text was substituted into
    /// `text` (first occurrence) or was already absent from it.
    pub low_confidence_spans: Vec<ConfidenceSpan>,

    pub tags: Vec<String>,

    /// True only once the vault confirmed the append; implies a non-empty
    /// `vault_path`.
    pub saved_to_vault: bool,

    pub vault_path: String,

    pub created_at: DateTime<Utc>,

    /// Bookmarked transcripts are exempt from retention
    pub bookmarked: bool,

    /// Set when a vault append fails; drives manual re-sync
    pub last_sync_attempt: Option<DateTime<Utc>>,
}

impl TranscriptRecord {
    pub fn new(
        audio_id: &str,
        text: String,
        detected_language: String,
        low_confidence_spans: Vec<ConfidenceSpan>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            audio_id: audio_id.to_string(),
            text,
            detected_language,
            low_confidence_spans,
            tags: Vec::new(),
            saved_to_vault: false,
            vault_path: String::new(),
            created_at: Utc::now(),
            bookmarked: false,
            last_sync_attempt: None,
        }
    }
}

/// Partial update for an audio record. `None` fields are left untouched.
#[derive(Debug, Clone, Default)]
pub struct AudioUpdate {
    pub status: Option<AudioStatus>,
    pub transcript_id: Option<String>,
}

/// Partial update for a transcript. `None` fields are left untouched.
#[derive(Debug, Clone, Default)]
pub struct TranscriptUpdate {
    pub text: Option<String>,
    pub low_confidence_spans: Option<Vec<ConfidenceSpan>>,
    pub tags: Option<Vec<String>>,
    pub saved_to_vault: Option<bool>,
    pub vault_path: Option<String>,
    pub bookmarked: Option<bool>,
    pub last_sync_attempt: Option<DateTime<Utc>>,
}
