//! Database schema migrations.

use rusqlite::Connection;

use super::StoreError;

/// Current schema version
const SCHEMA_VERSION: i32 = 1;

/// Run all necessary migrations to bring the database up to date
pub fn run_migrations(conn: &Connection) -> Result<(), StoreError> {
    let current_version = get_schema_version(conn)?;

    if current_version < 1 {
        migrate_v1(conn)?;
    }

    debug_assert!(SCHEMA_VERSION >= current_version);

    Ok(())
}

/// Get the current schema version from the database
fn get_schema_version(conn: &Connection) -> Result<i32, StoreError> {
    let table_exists: bool = conn
        .query_row(
            "SELECT COUNT(*) > 0 FROM sqlite_master WHERE type='table' AND name='schema_version'",
            [],
            |row| row.get(0),
        )
        .unwrap_or(false);

    if !table_exists {
        return Ok(0);
    }

    let version: i32 = conn
        .query_row("SELECT MAX(version) FROM schema_version", [], |row| {
            row.get(0)
        })
        .unwrap_or(0);

    Ok(version)
}

/// Initial schema: audio captures and transcripts.
fn migrate_v1(conn: &Connection) -> Result<(), StoreError> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE TABLE IF NOT EXISTS audio_records (
            id TEXT PRIMARY KEY,
            duration_secs REAL NOT NULL,
            mime_type TEXT NOT NULL,
            captured_at TEXT NOT NULL,
            status TEXT NOT NULL,
            transcript_id TEXT,
            audio BLOB NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_audio_status ON audio_records(status);
        CREATE INDEX IF NOT EXISTS idx_audio_captured ON audio_records(captured_at);

        CREATE TABLE IF NOT EXISTS transcripts (
            id TEXT PRIMARY KEY,
            audio_id TEXT NOT NULL,
            text TEXT NOT NULL,
            detected_language TEXT NOT NULL,
            low_confidence_spans TEXT NOT NULL,
            tags TEXT NOT NULL,
            saved_to_vault INTEGER NOT NULL DEFAULT 0,
            vault_path TEXT NOT NULL DEFAULT '',
            created_at TEXT NOT NULL,
            bookmarked INTEGER NOT NULL DEFAULT 0,
            last_sync_attempt TEXT
        );

        CREATE INDEX IF NOT EXISTS idx_transcripts_created ON transcripts(created_at);
        CREATE INDEX IF NOT EXISTS idx_transcripts_audio ON transcripts(audio_id);
        CREATE INDEX IF NOT EXISTS idx_transcripts_retention
            ON transcripts(bookmarked, created_at);

        INSERT INTO schema_version (version) VALUES (1);
        "#,
    )?;

    Ok(())
}
