//! Retention sweep for expired notes.
//!
//! Storage growth is bounded by deleting transcripts (and their audio) once
//! they age past the retention window, unless the user bookmarked them.
//! The sweep is idempotent and safe to run while the sync worker is active:
//! the worker treats records that vanish mid-sync as a no-op.

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, info};

use crate::store::{RecordStore, StoreError};

/// Notes older than this are eligible for deletion unless bookmarked.
pub const RETENTION_DAYS: i64 = 5;

/// Delete expired, non-bookmarked transcripts and cascade to their audio.
/// Returns the number of transcripts removed.
pub fn sweep(store: &RecordStore, now: DateTime<Utc>) -> Result<usize, StoreError> {
    sweep_with_window(store, now, RETENTION_DAYS)
}

/// Sweep with an explicit window in days.
pub fn sweep_with_window(
    store: &RecordStore,
    now: DateTime<Utc>,
    retention_days: i64,
) -> Result<usize, StoreError> {
    let cutoff = now - Duration::days(retention_days);
    let expired = store.expired_transcripts(cutoff)?;

    let mut deleted = 0;
    for transcript in expired {
        match store.delete_audio(&transcript.audio_id) {
            Ok(()) => {}
            Err(StoreError::NotFound(_)) => {
                // audio already gone; drop the orphaned transcript directly
                match store.delete_transcript(&transcript.id) {
                    Ok(()) | Err(StoreError::NotFound(_)) => {}
                    Err(e) => return Err(e),
                }
            }
            Err(e) => return Err(e),
        }
        debug!(transcript = %transcript.id, "expired note removed");
        deleted += 1;
    }

    if deleted > 0 {
        info!(deleted, "retention sweep removed expired notes");
    }

    Ok(deleted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{AudioRecord, AudioStatus, TranscriptRecord};

    fn aged_transcript(store: &RecordStore, age_days: i64, bookmarked: bool) -> TranscriptRecord {
        let audio = AudioRecord::new(2.0, "audio/mp4", AudioStatus::Saved);
        store.put_audio(&audio, b"bytes").unwrap();

        let mut transcript =
            TranscriptRecord::new(&audio.id, "note".to_string(), "vi".to_string(), vec![]);
        transcript.created_at = Utc::now() - Duration::days(age_days);
        transcript.bookmarked = bookmarked;
        store.put_transcript(&transcript).unwrap();
        transcript
    }

    #[test]
    fn test_sweep_deletes_expired_with_audio() {
        let store = RecordStore::open_in_memory().unwrap();
        let expired = aged_transcript(&store, 6, false);

        let deleted = sweep(&store, Utc::now()).unwrap();

        assert_eq!(deleted, 1);
        assert!(store.get_transcript(&expired.id).unwrap().is_none());
        assert!(store.get_audio(&expired.audio_id).unwrap().is_none());
    }

    #[test]
    fn test_sweep_never_deletes_bookmarked() {
        let store = RecordStore::open_in_memory().unwrap();
        let bookmarked = aged_transcript(&store, 30, true);

        let deleted = sweep(&store, Utc::now()).unwrap();

        assert_eq!(deleted, 0);
        assert!(store.get_transcript(&bookmarked.id).unwrap().is_some());
    }

    #[test]
    fn test_sweep_keeps_fresh_notes() {
        let store = RecordStore::open_in_memory().unwrap();
        let fresh = aged_transcript(&store, 2, false);

        let deleted = sweep(&store, Utc::now()).unwrap();

        assert_eq!(deleted, 0);
        assert!(store.get_transcript(&fresh.id).unwrap().is_some());
    }

    #[test]
    fn test_sweep_is_idempotent() {
        let store = RecordStore::open_in_memory().unwrap();
        aged_transcript(&store, 6, false);

        assert_eq!(sweep(&store, Utc::now()).unwrap(), 1);
        assert_eq!(sweep(&store, Utc::now()).unwrap(), 0);
    }

    #[test]
    fn test_sweep_tolerates_missing_audio() {
        let store = RecordStore::open_in_memory().unwrap();
        let transcript = aged_transcript(&store, 6, false);

        // someone deleted the audio row out from under the transcript
        store.delete_audio(&transcript.audio_id).unwrap();
        let orphan = {
            let mut t =
                TranscriptRecord::new("gone", "orphan".to_string(), "en".to_string(), vec![]);
            t.created_at = Utc::now() - Duration::days(10);
            store.put_transcript(&t).unwrap();
            t
        };

        let deleted = sweep(&store, Utc::now()).unwrap();
        assert_eq!(deleted, 1);
        assert!(store.get_transcript(&orphan.id).unwrap().is_none());
    }
}
