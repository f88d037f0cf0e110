//! Transcript repository.

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};

use crate::domain::{ConfidenceSpan, TranscriptRecord, TranscriptUpdate};

use super::{parse_timestamp, RecordStore, StoreError};

struct RawTranscript {
    id: String,
    audio_id: String,
    text: String,
    detected_language: String,
    low_confidence_spans: String,
    tags: String,
    saved_to_vault: bool,
    vault_path: String,
    created_at: String,
    bookmarked: bool,
    last_sync_attempt: Option<String>,
}

const TRANSCRIPT_COLUMNS: &str = "id, audio_id, text, detected_language, low_confidence_spans, \
     tags, saved_to_vault, vault_path, created_at, bookmarked, last_sync_attempt";

impl RecordStore {
    pub fn put_transcript(&self, record: &TranscriptRecord) -> Result<(), StoreError> {
        let spans_json = serde_json::to_string(&record.low_confidence_spans)?;
        let tags_json = serde_json::to_string(&record.tags)?;

        self.with_connection(|conn| {
            conn.execute(
                r#"
                INSERT INTO transcripts (
                    id, audio_id, text, detected_language, low_confidence_spans,
                    tags, saved_to_vault, vault_path, created_at, bookmarked, last_sync_attempt
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
                "#,
                params![
                    record.id,
                    record.audio_id,
                    record.text,
                    record.detected_language,
                    spans_json,
                    tags_json,
                    record.saved_to_vault,
                    record.vault_path,
                    record.created_at.to_rfc3339(),
                    record.bookmarked,
                    record.last_sync_attempt.map(|t| t.to_rfc3339()),
                ],
            )?;
            Ok(())
        })
    }

    pub fn get_transcript(&self, id: &str) -> Result<Option<TranscriptRecord>, StoreError> {
        self.with_connection(|conn| {
            let raw = conn
                .query_row(
                    &format!("SELECT {TRANSCRIPT_COLUMNS} FROM transcripts WHERE id = ?"),
                    params![id],
                    row_to_raw,
                )
                .optional()?;
            raw.map(transcript_from_raw).transpose()
        })
    }

    /// Apply a partial update. Fails with `NotFound` when the id does not
    /// exist.
    pub fn update_transcript(
        &self,
        id: &str,
        update: &TranscriptUpdate,
    ) -> Result<(), StoreError> {
        let spans_json = update
            .low_confidence_spans
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;
        let tags_json = update.tags.as_ref().map(serde_json::to_string).transpose()?;

        self.with_connection(|conn| {
            let mut set_clauses = Vec::new();
            let mut params_vec: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

            if let Some(ref text) = update.text {
                set_clauses.push("text = ?");
                params_vec.push(Box::new(text.clone()));
            }
            if let Some(ref spans) = spans_json {
                set_clauses.push("low_confidence_spans = ?");
                params_vec.push(Box::new(spans.clone()));
            }
            if let Some(ref tags) = tags_json {
                set_clauses.push("tags = ?");
                params_vec.push(Box::new(tags.clone()));
            }
            if let Some(saved) = update.saved_to_vault {
                set_clauses.push("saved_to_vault = ?");
                params_vec.push(Box::new(saved));
            }
            if let Some(ref vault_path) = update.vault_path {
                set_clauses.push("vault_path = ?");
                params_vec.push(Box::new(vault_path.clone()));
            }
            if let Some(bookmarked) = update.bookmarked {
                set_clauses.push("bookmarked = ?");
                params_vec.push(Box::new(bookmarked));
            }
            if let Some(attempt) = update.last_sync_attempt {
                set_clauses.push("last_sync_attempt = ?");
                params_vec.push(Box::new(attempt.to_rfc3339()));
            }

            if set_clauses.is_empty() {
                return Ok(());
            }

            params_vec.push(Box::new(id.to_string()));
            let query = format!(
                "UPDATE transcripts SET {} WHERE id = ?",
                set_clauses.join(", ")
            );
            let params_refs: Vec<&dyn rusqlite::ToSql> =
                params_vec.iter().map(|b| b.as_ref()).collect();

            let changed = conn.execute(&query, params_refs.as_slice())?;
            if changed == 0 {
                return Err(StoreError::NotFound(id.to_string()));
            }
            Ok(())
        })
    }

    pub fn delete_transcript(&self, id: &str) -> Result<(), StoreError> {
        self.with_connection(|conn| {
            let changed = conn.execute("DELETE FROM transcripts WHERE id = ?", params![id])?;
            if changed == 0 {
                return Err(StoreError::NotFound(id.to_string()));
            }
            Ok(())
        })
    }

    /// Convenience for the bookmark toggle exposed to the user.
    pub fn set_bookmark(&self, id: &str, bookmarked: bool) -> Result<(), StoreError> {
        self.update_transcript(
            id,
            &TranscriptUpdate {
                bookmarked: Some(bookmarked),
                ..Default::default()
            },
        )
    }

    /// All transcripts, newest first.
    pub fn list_transcripts(&self) -> Result<Vec<TranscriptRecord>, StoreError> {
        self.with_connection(|conn| {
            query_transcripts(
                conn,
                &format!("SELECT {TRANSCRIPT_COLUMNS} FROM transcripts ORDER BY created_at DESC"),
                [],
            )
        })
    }

    /// Transcripts whose vault append has not been confirmed, newest first.
    pub fn unsynced_transcripts(&self) -> Result<Vec<TranscriptRecord>, StoreError> {
        self.with_connection(|conn| {
            query_transcripts(
                conn,
                &format!(
                    "SELECT {TRANSCRIPT_COLUMNS} FROM transcripts \
                     WHERE saved_to_vault = 0 ORDER BY created_at DESC"
                ),
                [],
            )
        })
    }

    /// Non-bookmarked transcripts older than the cutoff, candidates for the
    /// retention sweep.
    pub fn expired_transcripts(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<TranscriptRecord>, StoreError> {
        self.with_connection(|conn| {
            query_transcripts(
                conn,
                &format!(
                    "SELECT {TRANSCRIPT_COLUMNS} FROM transcripts \
                     WHERE bookmarked = 0 AND created_at < ? ORDER BY created_at"
                ),
                params![cutoff.to_rfc3339()],
            )
        })
    }
}

fn query_transcripts<P: rusqlite::Params>(
    conn: &Connection,
    sql: &str,
    params: P,
) -> Result<Vec<TranscriptRecord>, StoreError> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt.query_map(params, row_to_raw)?;

    let mut records = Vec::new();
    for raw in rows {
        records.push(transcript_from_raw(raw?)?);
    }
    Ok(records)
}

fn row_to_raw(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawTranscript> {
    Ok(RawTranscript {
        id: row.get(0)?,
        audio_id: row.get(1)?,
        text: row.get(2)?,
        detected_language: row.get(3)?,
        low_confidence_spans: row.get(4)?,
        tags: row.get(5)?,
        saved_to_vault: row.get(6)?,
        vault_path: row.get(7)?,
        created_at: row.get(8)?,
        bookmarked: row.get(9)?,
        last_sync_attempt: row.get(10)?,
    })
}

fn transcript_from_raw(raw: RawTranscript) -> Result<TranscriptRecord, StoreError> {
    let low_confidence_spans: Vec<ConfidenceSpan> =
        serde_json::from_str(&raw.low_confidence_spans)?;
    let tags: Vec<String> = serde_json::from_str(&raw.tags)?;

    Ok(TranscriptRecord {
        id: raw.id,
        audio_id: raw.audio_id,
        text: raw.text,
        detected_language: raw.detected_language,
        low_confidence_spans,
        tags,
        saved_to_vault: raw.saved_to_vault,
        vault_path: raw.vault_path,
        created_at: parse_timestamp(&raw.created_at)?,
        bookmarked: raw.bookmarked,
        last_sync_attempt: raw
            .last_sync_attempt
            .as_deref()
            .map(parse_timestamp)
            .transpose()?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{AudioRecord, AudioStatus};

    fn test_store() -> RecordStore {
        RecordStore::open_in_memory().unwrap()
    }

    fn sample_transcript(store: &RecordStore, text: &str) -> TranscriptRecord {
        let audio = AudioRecord::new(5.0, "audio/mp4", AudioStatus::Saved);
        store.put_audio(&audio, b"bytes").unwrap();
        let record = TranscriptRecord::new(&audio.id, text.to_string(), "vi".to_string(), vec![]);
        store.put_transcript(&record).unwrap();
        record
    }

    #[test]
    fn test_put_and_get_transcript() {
        let store = test_store();
        let spans = vec![ConfidenceSpan {
            start_ms: 0,
            end_ms: 1200,
            text: "mua sua".to_string(),
            confidence: 0.5,
        }];

        let audio = AudioRecord::new(5.0, "audio/mp4", AudioStatus::Saved);
        store.put_audio(&audio, b"bytes").unwrap();
        let record = TranscriptRecord::new(
            &audio.id,
            "Toi can mua sua".to_string(),
            "vi".to_string(),
            spans.clone(),
        );
        store.put_transcript(&record).unwrap();

        let fetched = store.get_transcript(&record.id).unwrap().unwrap();
        assert_eq!(fetched.text, "Toi can mua sua");
        assert_eq!(fetched.low_confidence_spans, spans);
        assert!(!fetched.saved_to_vault);
    }

    #[test]
    fn test_update_transcript_sync_flags() {
        let store = test_store();
        let record = sample_transcript(&store, "hello");

        store
            .update_transcript(
                &record.id,
                &TranscriptUpdate {
                    saved_to_vault: Some(true),
                    vault_path: Some("Tuyet/2026-08-29.md".to_string()),
                    ..Default::default()
                },
            )
            .unwrap();

        let fetched = store.get_transcript(&record.id).unwrap().unwrap();
        assert!(fetched.saved_to_vault);
        assert_eq!(fetched.vault_path, "Tuyet/2026-08-29.md");
    }

    #[test]
    fn test_update_missing_transcript_is_not_found() {
        let store = test_store();
        let err = store
            .update_transcript(
                "ghost",
                &TranscriptUpdate {
                    bookmarked: Some(true),
                    ..Default::default()
                },
            )
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
    }

    #[test]
    fn test_list_transcripts_newest_first() {
        let store = test_store();
        let old = {
            let audio = AudioRecord::new(1.0, "audio/mp4", AudioStatus::Saved);
            store.put_audio(&audio, b"a").unwrap();
            let mut t =
                TranscriptRecord::new(&audio.id, "old".to_string(), "en".to_string(), vec![]);
            t.created_at = Utc::now() - chrono::Duration::hours(2);
            store.put_transcript(&t).unwrap();
            t
        };
        let new = sample_transcript(&store, "new");

        let all = store.list_transcripts().unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].id, new.id);
        assert_eq!(all[1].id, old.id);
    }

    #[test]
    fn test_expired_transcripts_excludes_bookmarked() {
        let store = test_store();
        let cutoff = Utc::now() - chrono::Duration::days(5);

        let make_old = |bookmarked: bool| {
            let audio = AudioRecord::new(1.0, "audio/mp4", AudioStatus::Saved);
            store.put_audio(&audio, b"a").unwrap();
            let mut t =
                TranscriptRecord::new(&audio.id, "old".to_string(), "en".to_string(), vec![]);
            t.created_at = Utc::now() - chrono::Duration::days(6);
            t.bookmarked = bookmarked;
            store.put_transcript(&t).unwrap();
            t
        };

        let expired = make_old(false);
        let _kept = make_old(true);
        let _fresh = sample_transcript(&store, "fresh");

        let result = store.expired_transcripts(cutoff).unwrap();
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].id, expired.id);
    }

    #[test]
    fn test_delete_audio_cascades_to_transcript() {
        let store = test_store();
        let record = sample_transcript(&store, "cascade");

        store.delete_audio(&record.audio_id).unwrap();

        assert!(store.get_audio(&record.audio_id).unwrap().is_none());
        assert!(store.get_transcript(&record.id).unwrap().is_none());
    }
}
