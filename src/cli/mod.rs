//! Command-line interface for tuyet.
//!
//! Provides commands for capturing voice notes, running the sync worker,
//! listing and correcting transcripts, and housekeeping.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use tokio::sync::watch;

use crate::bridge::{HttpTranscriber, HttpVaultBridge};
use crate::config::Config;
use crate::corrections;
use crate::domain::TranscriptUpdate;
use crate::queue::OfflineQueue;
use crate::retention;
use crate::store::RecordStore;
use crate::sync::{CaptureOutcome, SyncWorker};

/// tuyet - Local-first voice note capture and vault sync
#[derive(Parser, Debug)]
#[command(name = "tuyet")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Capture an audio file as a voice note
    Capture {
        /// Path to the audio file
        file: PathBuf,

        /// Recording duration in seconds
        #[arg(short, long, default_value = "0")]
        duration: f64,

        /// Skip the bridge probe and queue the capture unconditionally
        #[arg(long)]
        offline: bool,
    },

    /// Drain the offline queue (or keep running with the background worker)
    Process {
        /// Drain once and exit instead of running continuously
        #[arg(long)]
        once: bool,
    },

    /// List recent transcripts
    List {
        /// Maximum number of transcripts to show
        #[arg(short, long, default_value = "20")]
        limit: usize,
    },

    /// Show queue depth and unsynced notes
    Status,

    /// Delete expired, non-bookmarked notes
    Sweep,

    /// Correct one low-confidence span of a transcript
    Correct {
        /// Transcript ID
        transcript_id: String,

        /// Index into the transcript's low-confidence spans
        span_index: usize,

        /// Replacement text
        corrected_text: String,
    },

    /// Retry the vault append for a locally saved transcript
    Resync {
        /// Transcript ID
        transcript_id: String,
    },

    /// Bookmark a transcript so retention never deletes it
    Bookmark {
        /// Transcript ID
        transcript_id: String,

        /// Remove the bookmark instead
        #[arg(long)]
        clear: bool,
    },

    /// Replace the tags on a transcript
    Tag {
        /// Transcript ID
        transcript_id: String,

        /// Tags (without the leading '#')
        tags: Vec<String>,
    },

    /// Show resolved configuration (debug)
    Config,
}

impl Cli {
    /// Execute the CLI command
    pub async fn execute(self) -> Result<()> {
        let config = Config::load()?;

        match self.command {
            Commands::Capture {
                file,
                duration,
                offline,
            } => capture(&config, &file, duration, offline).await,
            Commands::Process { once } => process(&config, once).await,
            Commands::List { limit } => list_transcripts(&config, limit),
            Commands::Status => show_status(&config).await,
            Commands::Sweep => sweep(&config),
            Commands::Correct {
                transcript_id,
                span_index,
                corrected_text,
            } => correct(&config, &transcript_id, span_index, &corrected_text),
            Commands::Resync { transcript_id } => resync(&config, &transcript_id).await,
            Commands::Bookmark {
                transcript_id,
                clear,
            } => bookmark(&config, &transcript_id, clear),
            Commands::Tag {
                transcript_id,
                tags,
            } => tag(&config, &transcript_id, tags),
            Commands::Config => show_config(&config),
        }
    }
}

/// Build the worker with its live HTTP collaborators.
async fn build_worker(config: &Config) -> Result<SyncWorker> {
    let store = Arc::new(RecordStore::open(config.db_path())?);
    let queue = Arc::new(OfflineQueue::open(config.queue_path()).await?);
    let transcriber = Arc::new(HttpTranscriber::new(
        config.transcribe_url.clone(),
        config.transcribe_key.clone(),
    ));
    let bridge = Arc::new(HttpVaultBridge::new(
        config.bridge_url.clone(),
        config.bridge_key.clone(),
    ));

    Ok(
        SyncWorker::new(store, queue, transcriber, bridge, &config.vault_folder)
            .with_max_retries(config.max_retries),
    )
}

fn open_store(config: &Config) -> Result<RecordStore> {
    Ok(RecordStore::open(config.db_path())?)
}

/// Map the file extension to a MIME type the transcription backend accepts.
fn mime_from_path(path: &PathBuf) -> &'static str {
    match path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .as_deref()
    {
        Some("m4a") | Some("mp4") => "audio/mp4",
        Some("mp3") => "audio/mpeg",
        Some("ogg") | Some("oga") => "audio/ogg",
        Some("flac") => "audio/flac",
        _ => "audio/wav",
    }
}

/// Capture an audio file
async fn capture(config: &Config, file: &PathBuf, duration: f64, offline: bool) -> Result<()> {
    let bytes = std::fs::read(file)
        .with_context(|| format!("Failed to read audio file: {}", file.display()))?;
    if bytes.is_empty() {
        anyhow::bail!("Audio file is empty: {}", file.display());
    }

    let worker = build_worker(config).await?;
    let (audio_id, outcome) = worker
        .capture(&bytes, mime_from_path(file), duration, offline)
        .await?;

    match outcome {
        CaptureOutcome::Confirmed => {
            println!("Captured {} and appended to the vault", audio_id);
        }
        CaptureOutcome::SavedLocally => {
            println!(
                "Captured {} locally; vault append failed, use 'tuyet resync' later",
                audio_id
            );
        }
        CaptureOutcome::Queued => {
            println!("Captured {} and queued for sync", audio_id);
        }
        CaptureOutcome::Failed(reason) => {
            eprintln!("Capture {} failed: {}", audio_id, reason);
            std::process::exit(1);
        }
    }

    Ok(())
}

/// Drain the queue once, or run the worker until Ctrl-C
async fn process(config: &Config, once: bool) -> Result<()> {
    let worker = build_worker(config).await?;

    if once {
        let report = worker.drain_queue().await?;
        println!(
            "Processed: {}  Retried: {}  Failed: {}{}",
            report.processed,
            report.retried,
            report.failed,
            if report.deferred { "  (deferred)" } else { "" }
        );
        return Ok(());
    }

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let wake = worker.wake_handle();
    wake.notify_one();

    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            let _ = shutdown_tx.send(true);
        }
    });

    eprintln!("Sync worker running, Ctrl-C to stop");
    worker.run(shutdown_rx).await
}

/// List recent transcripts
fn list_transcripts(config: &Config, limit: usize) -> Result<()> {
    let store = open_store(config)?;
    let transcripts = store.list_transcripts()?;

    if transcripts.is_empty() {
        println!("No transcripts yet. Use 'tuyet capture <file>' to add one.");
        return Ok(());
    }

    println!(
        "{:<38} {:<17} {:<6} {:<5} {:<40}",
        "ID", "CREATED", "VAULT", "SPANS", "TEXT"
    );
    println!("{}", "-".repeat(110));

    for t in transcripts.iter().take(limit) {
        let text = if t.text.chars().count() > 37 {
            let prefix: String = t.text.chars().take(37).collect();
            format!("{}...", prefix)
        } else {
            t.text.clone()
        };
        println!(
            "{:<38} {:<17} {:<6} {:<5} {:<40}",
            t.id,
            t.created_at.format("%Y-%m-%d %H:%M"),
            if t.saved_to_vault { "yes" } else { "no" },
            t.low_confidence_spans.len(),
            text
        );
    }

    Ok(())
}

/// Show queue depth and unsynced transcripts
async fn show_status(config: &Config) -> Result<()> {
    let store = open_store(config)?;
    let queue = OfflineQueue::open(config.queue_path()).await?;

    let pending = queue.peek_all().await?;
    let unsynced = store.unsynced_transcripts()?;

    println!("Queued captures: {}", pending.len());
    for item in &pending {
        println!(
            "  {}  audio={}  retries={}",
            item.queued_at.format("%Y-%m-%d %H:%M"),
            item.audio_id,
            item.retry_count
        );
    }

    println!("Unsynced transcripts: {}", unsynced.len());
    for t in &unsynced {
        let last = t
            .last_sync_attempt
            .map(|a| a.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_else(|| "never".to_string());
        println!("  {}  last attempt: {}", t.id, last);
    }

    Ok(())
}

/// Run the retention sweep
fn sweep(config: &Config) -> Result<()> {
    let store = open_store(config)?;
    let deleted = retention::sweep_with_window(&store, Utc::now(), config.retention_days)?;
    println!("Removed {} expired note(s)", deleted);
    Ok(())
}

/// Apply one span correction
fn correct(
    config: &Config,
    transcript_id: &str,
    span_index: usize,
    corrected_text: &str,
) -> Result<()> {
    let store = open_store(config)?;
    corrections::apply_correction(&store, transcript_id, span_index, corrected_text)?;

    let transcript = store
        .get_transcript(transcript_id)?
        .context("Transcript disappeared after correction")?;
    println!("{}", transcript.text);
    Ok(())
}

/// Retry a failed vault append
async fn resync(config: &Config, transcript_id: &str) -> Result<()> {
    let worker = build_worker(config).await?;

    if worker.resync(transcript_id).await? {
        println!("Transcript {} appended to the vault", transcript_id);
        Ok(())
    } else {
        eprintln!("Vault append failed again for {}", transcript_id);
        std::process::exit(1);
    }
}

/// Bookmark or un-bookmark a transcript
fn bookmark(config: &Config, transcript_id: &str, clear: bool) -> Result<()> {
    let store = open_store(config)?;
    store.set_bookmark(transcript_id, !clear)?;

    if clear {
        println!("Bookmark removed from {}", transcript_id);
    } else {
        println!("Bookmarked {}", transcript_id);
    }
    Ok(())
}

/// Replace the tags on a transcript
fn tag(config: &Config, transcript_id: &str, tags: Vec<String>) -> Result<()> {
    let store = open_store(config)?;
    let tags: Vec<String> = tags
        .into_iter()
        .map(|t| t.trim_start_matches('#').to_string())
        .filter(|t| !t.is_empty())
        .collect();

    store.update_transcript(
        transcript_id,
        &TranscriptUpdate {
            tags: Some(tags.clone()),
            ..Default::default()
        },
    )?;

    if tags.is_empty() {
        println!("Tags cleared on {}", transcript_id);
    } else {
        println!("Tagged {} with: {}", transcript_id, tags.join(", "));
    }
    Ok(())
}

/// Show the resolved configuration (for debugging)
fn show_config(config: &Config) -> Result<()> {
    println!("Home:            {}", config.home.display());
    println!("Database:        {}", config.db_path().display());
    println!("Queue log:       {}", config.queue_path().display());
    println!(
        "Bridge URL:      {}",
        config.bridge_url.as_deref().unwrap_or("(not configured)")
    );
    println!("Vault folder:    {}", config.vault_folder);
    println!(
        "Transcribe URL:  {}",
        config
            .transcribe_url
            .as_deref()
            .unwrap_or("(not configured)")
    );
    println!("Max retries:     {}", config.max_retries);
    println!("Retention days:  {}", config.retention_days);
    Ok(())
}
