//! Audio record repository.

use rusqlite::{params, Connection, OptionalExtension};

use crate::domain::{AudioRecord, AudioStatus, AudioUpdate};

use super::{parse_timestamp, RecordStore, StoreError};

/// Raw row before status/timestamp parsing
struct RawAudio {
    id: String,
    duration_secs: f64,
    mime_type: String,
    captured_at: String,
    status: String,
    transcript_id: Option<String>,
}

const AUDIO_COLUMNS: &str = "id, duration_secs, mime_type, captured_at, status, transcript_id";

impl RecordStore {
    /// Insert a new audio record together with its opaque payload.
    pub fn put_audio(&self, record: &AudioRecord, audio: &[u8]) -> Result<(), StoreError> {
        self.with_connection(|conn| {
            conn.execute(
                r#"
                INSERT INTO audio_records (
                    id, duration_secs, mime_type, captured_at, status, transcript_id, audio
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                "#,
                params![
                    record.id,
                    record.duration_secs,
                    record.mime_type,
                    record.captured_at.to_rfc3339(),
                    record.status.as_str(),
                    record.transcript_id,
                    audio,
                ],
            )?;
            Ok(())
        })
    }

    pub fn get_audio(&self, id: &str) -> Result<Option<AudioRecord>, StoreError> {
        self.with_connection(|conn| {
            let raw = query_audio(conn, id)?;
            raw.map(audio_from_raw).transpose()
        })
    }

    /// Fetch a record together with its payload, as the sync worker needs it.
    pub fn get_audio_with_bytes(
        &self,
        id: &str,
    ) -> Result<Option<(AudioRecord, Vec<u8>)>, StoreError> {
        self.with_connection(|conn| {
            let Some(raw) = query_audio(conn, id)? else {
                return Ok(None);
            };
            let bytes: Vec<u8> = conn.query_row(
                "SELECT audio FROM audio_records WHERE id = ?",
                params![id],
                |row| row.get(0),
            )?;
            Ok(Some((audio_from_raw(raw)?, bytes)))
        })
    }

    /// Apply a partial update. Fails with `NotFound` when the id does not
    /// exist, which background components treat as a benign no-op.
    pub fn update_audio(&self, id: &str, update: &AudioUpdate) -> Result<(), StoreError> {
        self.with_connection(|conn| {
            let mut set_clauses = Vec::new();
            let mut params_vec: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

            if let Some(status) = update.status {
                set_clauses.push("status = ?");
                params_vec.push(Box::new(status.as_str().to_string()));
            }
            if let Some(ref transcript_id) = update.transcript_id {
                set_clauses.push("transcript_id = ?");
                params_vec.push(Box::new(transcript_id.clone()));
            }

            if set_clauses.is_empty() {
                return Ok(());
            }

            params_vec.push(Box::new(id.to_string()));
            let query = format!(
                "UPDATE audio_records SET {} WHERE id = ?",
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

    /// Delete a capture and cascade to its transcript.
    pub fn delete_audio(&self, id: &str) -> Result<(), StoreError> {
        self.with_connection(|conn| {
            conn.execute("DELETE FROM transcripts WHERE audio_id = ?", params![id])?;
            let changed = conn.execute("DELETE FROM audio_records WHERE id = ?", params![id])?;
            if changed == 0 {
                return Err(StoreError::NotFound(id.to_string()));
            }
            Ok(())
        })
    }

    /// All captures with the given status, oldest first.
    pub fn audio_with_status(&self, status: AudioStatus) -> Result<Vec<AudioRecord>, StoreError> {
        self.with_connection(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {AUDIO_COLUMNS} FROM audio_records WHERE status = ? ORDER BY captured_at"
            ))?;
            let rows = stmt.query_map(params![status.as_str()], row_to_raw)?;

            let mut records = Vec::new();
            for raw in rows {
                records.push(audio_from_raw(raw?)?);
            }
            Ok(records)
        })
    }
}

fn query_audio(conn: &Connection, id: &str) -> Result<Option<RawAudio>, StoreError> {
    let raw = conn
        .query_row(
            &format!("SELECT {AUDIO_COLUMNS} FROM audio_records WHERE id = ?"),
            params![id],
            row_to_raw,
        )
        .optional()?;
    Ok(raw)
}

fn row_to_raw(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawAudio> {
    Ok(RawAudio {
        id: row.get(0)?,
        duration_secs: row.get(1)?,
        mime_type: row.get(2)?,
        captured_at: row.get(3)?,
        status: row.get(4)?,
        transcript_id: row.get(5)?,
    })
}

fn audio_from_raw(raw: RawAudio) -> Result<AudioRecord, StoreError> {
    let status = AudioStatus::parse(&raw.status)
        .ok_or_else(|| StoreError::Corrupt(format!("invalid audio status: {}", raw.status)))?;

    Ok(AudioRecord {
        id: raw.id,
        duration_secs: raw.duration_secs,
        mime_type: raw.mime_type,
        captured_at: parse_timestamp(&raw.captured_at)?,
        status,
        transcript_id: raw.transcript_id,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_store() -> RecordStore {
        RecordStore::open_in_memory().unwrap()
    }

    #[test]
    fn test_put_and_get_audio() {
        let store = test_store();
        let record = AudioRecord::new(12.5, "audio/mp4", AudioStatus::Processing);

        store.put_audio(&record, b"fake audio").unwrap();

        let fetched = store.get_audio(&record.id).unwrap().unwrap();
        assert_eq!(fetched.id, record.id);
        assert_eq!(fetched.mime_type, "audio/mp4");
        assert_eq!(fetched.status, AudioStatus::Processing);
        assert!(fetched.transcript_id.is_none());

        let (_, bytes) = store.get_audio_with_bytes(&record.id).unwrap().unwrap();
        assert_eq!(bytes, b"fake audio");
    }

    #[test]
    fn test_get_missing_audio_is_none() {
        let store = test_store();
        assert!(store.get_audio("nope").unwrap().is_none());
    }

    #[test]
    fn test_update_audio() {
        let store = test_store();
        let record = AudioRecord::new(3.0, "audio/webm", AudioStatus::Processing);
        store.put_audio(&record, b"x").unwrap();

        store
            .update_audio(
                &record.id,
                &AudioUpdate {
                    status: Some(AudioStatus::Saved),
                    transcript_id: Some("t-1".to_string()),
                },
            )
            .unwrap();

        let fetched = store.get_audio(&record.id).unwrap().unwrap();
        assert_eq!(fetched.status, AudioStatus::Saved);
        assert_eq!(fetched.transcript_id.as_deref(), Some("t-1"));
    }

    #[test]
    fn test_update_missing_audio_is_not_found() {
        let store = test_store();
        let err = store
            .update_audio(
                "ghost",
                &AudioUpdate {
                    status: Some(AudioStatus::Error),
                    ..Default::default()
                },
            )
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
    }

    #[test]
    fn test_audio_with_status_ordering() {
        let store = test_store();

        let mut first = AudioRecord::new(1.0, "audio/mp4", AudioStatus::OfflinePending);
        first.captured_at = chrono::Utc::now() - chrono::Duration::minutes(10);
        let second = AudioRecord::new(1.0, "audio/mp4", AudioStatus::OfflinePending);
        let other = AudioRecord::new(1.0, "audio/mp4", AudioStatus::Saved);

        store.put_audio(&second, b"b").unwrap();
        store.put_audio(&first, b"a").unwrap();
        store.put_audio(&other, b"c").unwrap();

        let pending = store.audio_with_status(AudioStatus::OfflinePending).unwrap();
        assert_eq!(pending.len(), 2);
        assert_eq!(pending[0].id, first.id);
        assert_eq!(pending[1].id, second.id);
    }
}
