//! User-approved corrections to low-confidence transcript spans.

use thiserror::Error;
use tracing::debug;

use crate::domain::TranscriptUpdate;
use crate::store::{RecordStore, StoreError};

#[derive(Debug, Error)]
pub enum CorrectionError {
    #[error("transcript not found: {0}")]
    NotFound(String),

    #[error("span index {index} out of range ({len} low-confidence spans)")]
    OutOfRange { index: usize, len: usize },

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Replace the text of one low-confidence span and mirror the change into
/// the full transcript.
///
/// The substitution is textual: the first literal occurrence of the span's
/// current text in the transcript is replaced. When a prior edit already
/// removed that text, only the span itself updates and the main text is
/// left alone. Re-applying the same correction is a no-op.
pub fn apply_correction(
    store: &RecordStore,
    transcript_id: &str,
    span_index: usize,
    corrected_text: &str,
) -> Result<(), CorrectionError> {
    let transcript = store
        .get_transcript(transcript_id)?
        .ok_or_else(|| CorrectionError::NotFound(transcript_id.to_string()))?;

    let mut spans = transcript.low_confidence_spans;
    let len = spans.len();
    let span = spans
        .get_mut(span_index)
        .ok_or(CorrectionError::OutOfRange {
            index: span_index,
            len,
        })?;

    let updated_text = transcript.text.replacen(&span.text, corrected_text, 1);
    if updated_text == transcript.text && !transcript.text.contains(corrected_text) {
        debug!(
            transcript = %transcript_id,
            span = span_index,
            "span text absent from transcript, updating span only"
        );
    }
    span.text = corrected_text.to_string();

    store.update_transcript(
        transcript_id,
        &TranscriptUpdate {
            text: Some(updated_text),
            low_confidence_spans: Some(spans),
            ..Default::default()
        },
    )?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{AudioRecord, AudioStatus, ConfidenceSpan, TranscriptRecord};

    fn store_with_transcript(text: &str, spans: Vec<ConfidenceSpan>) -> (RecordStore, String) {
        let store = RecordStore::open_in_memory().unwrap();
        let audio = AudioRecord::new(3.0, "audio/mp4", AudioStatus::Saved);
        store.put_audio(&audio, b"bytes").unwrap();
        let transcript =
            TranscriptRecord::new(&audio.id, text.to_string(), "vi".to_string(), spans);
        store.put_transcript(&transcript).unwrap();
        (store, transcript.id)
    }

    fn span(text: &str, confidence: f64) -> ConfidenceSpan {
        ConfidenceSpan {
            start_ms: 0,
            end_ms: 1000,
            text: text.to_string(),
            confidence,
        }
    }

    #[test]
    fn test_correction_updates_text_and_span() {
        let (store, id) =
            store_with_transcript("Toi can mua sua", vec![span("mua sua", 0.5)]);

        apply_correction(&store, &id, 0, "mua hai hop sua").unwrap();

        let t = store.get_transcript(&id).unwrap().unwrap();
        assert_eq!(t.text, "Toi can mua hai hop sua");
        assert_eq!(t.low_confidence_spans[0].text, "mua hai hop sua");
    }

    #[test]
    fn test_correction_is_idempotent() {
        let (store, id) =
            store_with_transcript("Toi can mua sua", vec![span("mua sua", 0.5)]);

        apply_correction(&store, &id, 0, "mua hai hop sua").unwrap();
        apply_correction(&store, &id, 0, "mua hai hop sua").unwrap();

        let t = store.get_transcript(&id).unwrap().unwrap();
        assert_eq!(t.text, "Toi can mua hai hop sua");
    }

    #[test]
    fn test_only_first_occurrence_replaced() {
        let (store, id) = store_with_transcript("sua va sua", vec![span("sua", 0.4)]);

        apply_correction(&store, &id, 0, "trung").unwrap();

        let t = store.get_transcript(&id).unwrap().unwrap();
        assert_eq!(t.text, "trung va sua");
    }

    #[test]
    fn test_absent_span_text_updates_span_only() {
        let (store, id) = store_with_transcript(
            "hoan toan khac",
            vec![span("khong con nua", 0.3)],
        );

        apply_correction(&store, &id, 0, "sua lai").unwrap();

        let t = store.get_transcript(&id).unwrap().unwrap();
        assert_eq!(t.text, "hoan toan khac");
        assert_eq!(t.low_confidence_spans[0].text, "sua lai");
    }

    #[test]
    fn test_out_of_range_index() {
        let (store, id) = store_with_transcript("abc", vec![span("abc", 0.5)]);

        let err = apply_correction(&store, &id, 3, "x").unwrap_err();
        assert!(matches!(
            err,
            CorrectionError::OutOfRange { index: 3, len: 1 }
        ));
    }

    #[test]
    fn test_missing_transcript() {
        let store = RecordStore::open_in_memory().unwrap();
        let err = apply_correction(&store, "ghost", 0, "x").unwrap_err();
        assert!(matches!(err, CorrectionError::NotFound(_)));
    }
}
