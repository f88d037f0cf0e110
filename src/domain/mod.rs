//! Domain types for the voice note core.

pub mod records;

pub use records::{
    AudioRecord, AudioStatus, AudioUpdate, ConfidenceSpan, TranscriptRecord, TranscriptUpdate,
    LOW_CONFIDENCE_THRESHOLD,
};
