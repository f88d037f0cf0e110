//! Sync worker: the state machine that moves captures from the local store
//! to the remote vault.
//!
//! One worker task drains the offline queue sequentially (an item is fully
//! resolved before the next starts), which preserves chronological ordering
//! of appends. A capture probes bridge health at capture stop: reachable
//! captures bypass the queue and are processed independently.
//!
//! Failure handling per item:
//! - transport failure during transcription: bounded retries via the durable
//!   queue, then terminal `Error` status
//! - rejection by the backend: terminal `Error` immediately
//! - no endpoint configured: the item waits, untouched
//! - vault append failure after transcription: local success, remote-sync
//!   failure; surfaced through `saved_to_vault = false` and manual re-sync
//!
//! An item is never acked or bumped before its remote call returns, so a
//! hard stop re-processes it on the next start (at-least-once).

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use chrono::Utc;
use tokio::sync::Notify;
use tracing::{debug, error, info, instrument, warn};

use crate::bridge::{BridgeError, Transcriber, Transcription, VaultBridge};
use crate::domain::{
    AudioRecord, AudioStatus, AudioUpdate, ConfidenceSpan, TranscriptRecord, TranscriptUpdate,
    LOW_CONFIDENCE_THRESHOLD,
};
use crate::queue::{OfflineQueue, OfflineQueueItem};
use crate::store::{RecordStore, StoreError};

use super::formatter;

/// Transcription attempts per queued item before the capture is marked
/// failed.
pub const MAX_RETRIES: u32 = 5;

/// How often the worker re-checks the queue without an explicit wake.
pub const RECHECK_INTERVAL: Duration = Duration::from_secs(30);

/// Background synchronizer. Holds explicit handles to the store and queue;
/// collaborators are trait objects so tests can substitute them.
pub struct SyncWorker {
    store: Arc<RecordStore>,
    queue: Arc<OfflineQueue>,
    transcriber: Arc<dyn Transcriber>,
    bridge: Arc<dyn VaultBridge>,
    vault_folder: String,
    max_retries: u32,
    wake: Arc<Notify>,
}

/// Summary of one drain pass
#[derive(Debug, Default)]
pub struct DrainReport {
    /// Items transcribed and stored (vault append may still have failed)
    pub processed: usize,
    /// Items left queued for another attempt
    pub retried: usize,
    /// Items that hit a terminal failure
    pub failed: usize,
    /// True when the pass stopped early (bridge unreachable or unconfigured)
    pub deferred: bool,
}

/// Result of processing one capture
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaptureOutcome {
    /// Transcribed and appended to the vault
    Confirmed,
    /// Transcribed and stored locally; vault append failed
    SavedLocally,
    /// Waiting in the offline queue
    Queued,
    /// Terminal failure, audio marked `Error`
    Failed(String),
}

enum ItemOutcome {
    Processed,
    Retried,
    Failed,
    Deferred,
    Vanished,
}

impl SyncWorker {
    pub fn new(
        store: Arc<RecordStore>,
        queue: Arc<OfflineQueue>,
        transcriber: Arc<dyn Transcriber>,
        bridge: Arc<dyn VaultBridge>,
        vault_folder: impl Into<String>,
    ) -> Self {
        Self {
            store,
            queue,
            transcriber,
            bridge,
            vault_folder: vault_folder.into(),
            max_retries: MAX_RETRIES,
            wake: Arc::new(Notify::new()),
        }
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Handle used to wake the worker when the network comes back.
    pub fn wake_handle(&self) -> Arc<Notify> {
        Arc::clone(&self.wake)
    }

    /// Store a new capture. The bridge health probe decides the path:
    /// reachable captures are processed right away, unreachable ones land in
    /// the durable queue. `force_offline` skips the probe and queues
    /// unconditionally.
    #[instrument(skip(self, bytes))]
    pub async fn capture(
        &self,
        bytes: &[u8],
        mime_type: &str,
        duration_secs: f64,
        force_offline: bool,
    ) -> Result<(String, CaptureOutcome)> {
        let online = !force_offline && self.bridge.health().await;
        if !online && !force_offline {
            debug!("bridge unreachable at capture stop, queueing");
        }

        let status = if online {
            AudioStatus::Processing
        } else {
            AudioStatus::OfflinePending
        };
        let audio = AudioRecord::new(duration_secs, mime_type, status);
        self.store.put_audio(&audio, bytes)?;

        if online {
            let outcome = self.process_capture(&audio.id).await?;
            Ok((audio.id, outcome))
        } else {
            self.queue.enqueue(&audio.id, Utc::now()).await?;
            info!(audio = %audio.id, "capture queued for later sync");
            Ok((audio.id, CaptureOutcome::Queued))
        }
    }

    /// Process one capture outside the offline queue. A transport failure
    /// here falls back to the queue instead of consuming retry budget.
    #[instrument(skip(self))]
    pub async fn process_capture(&self, audio_id: &str) -> Result<CaptureOutcome> {
        let (audio, bytes) = self
            .store
            .get_audio_with_bytes(audio_id)?
            .ok_or_else(|| StoreError::NotFound(audio_id.to_string()))?;

        match self.transcriber.transcribe(&bytes, &audio.mime_type).await {
            Ok(result) => {
                let transcript = self.save_transcript(&audio, result)?;
                let appended = self.append_to_vault(&transcript).await?;
                Ok(if appended {
                    CaptureOutcome::Confirmed
                } else {
                    CaptureOutcome::SavedLocally
                })
            }
            Err(BridgeError::Rejected(reason)) => {
                warn!(audio = %audio.id, %reason, "transcription rejected");
                self.mark_audio_error(&audio.id)?;
                Ok(CaptureOutcome::Failed(reason))
            }
            Err(BridgeError::Transport(_)) | Err(BridgeError::Unconfigured) => {
                debug!(audio = %audio.id, "transcription unavailable, falling back to queue");
                self.store.update_audio(
                    &audio.id,
                    &AudioUpdate {
                        status: Some(AudioStatus::OfflinePending),
                        ..Default::default()
                    },
                )?;
                self.queue.enqueue(&audio.id, Utc::now()).await?;
                Ok(CaptureOutcome::Queued)
            }
        }
    }

    /// Drain the offline queue once, oldest item first. Per-item failures
    /// are converted into record state; only store or queue corruption
    /// propagates.
    #[instrument(skip(self))]
    pub async fn drain_queue(&self) -> Result<DrainReport> {
        let mut report = DrainReport::default();

        if !self.bridge.health().await {
            debug!("bridge unreachable, leaving queue untouched");
            report.deferred = true;
            return Ok(report);
        }

        for item in self.queue.peek_all().await? {
            match self.process_item(&item).await? {
                ItemOutcome::Processed => report.processed += 1,
                ItemOutcome::Retried => report.retried += 1,
                ItemOutcome::Failed => report.failed += 1,
                ItemOutcome::Vanished => {}
                ItemOutcome::Deferred => {
                    report.deferred = true;
                    break;
                }
            }
        }

        Ok(report)
    }

    async fn process_item(&self, item: &OfflineQueueItem) -> Result<ItemOutcome> {
        let Some((audio, bytes)) = self.store.get_audio_with_bytes(&item.audio_id)? else {
            // record deleted while queued, e.g. by the retention sweep
            warn!(item = %item.id, audio = %item.audio_id, "queued audio vanished, dropping item");
            self.queue.ack(&item.id).await?;
            return Ok(ItemOutcome::Vanished);
        };

        match self.transcriber.transcribe(&bytes, &audio.mime_type).await {
            Ok(result) => {
                let transcript = self.save_transcript(&audio, result)?;
                self.queue.ack(&item.id).await?;
                self.append_to_vault(&transcript).await?;
                Ok(ItemOutcome::Processed)
            }
            Err(BridgeError::Unconfigured) => {
                debug!("transcription endpoint not configured, deferring queue");
                Ok(ItemOutcome::Deferred)
            }
            Err(BridgeError::Rejected(reason)) => {
                warn!(item = %item.id, %reason, "transcription rejected, marking capture failed");
                self.queue.ack(&item.id).await?;
                self.mark_audio_error(&audio.id)?;
                Ok(ItemOutcome::Failed)
            }
            Err(BridgeError::Transport(reason)) => {
                let attempts = item.retry_count + 1;
                if attempts >= self.max_retries {
                    warn!(
                        item = %item.id,
                        %reason,
                        attempts,
                        "retries exhausted, marking capture failed"
                    );
                    self.queue.ack(&item.id).await?;
                    self.mark_audio_error(&audio.id)?;
                    Ok(ItemOutcome::Failed)
                } else {
                    debug!(item = %item.id, %reason, attempts, "transport failure, will retry");
                    self.queue.bump(&item.id).await?;
                    Ok(ItemOutcome::Retried)
                }
            }
        }
    }

    /// Persist a successful transcription and flip the audio record to
    /// `Saved`. Spans below the confidence threshold are kept for review.
    fn save_transcript(
        &self,
        audio: &AudioRecord,
        result: Transcription,
    ) -> Result<TranscriptRecord, StoreError> {
        let spans: Vec<ConfidenceSpan> = result
            .spans
            .into_iter()
            .filter(|s| s.confidence < LOW_CONFIDENCE_THRESHOLD)
            .collect();

        let transcript =
            TranscriptRecord::new(&audio.id, result.text, result.detected_language, spans);
        self.store.put_transcript(&transcript)?;

        self.tolerate_missing(self.store.update_audio(
            &audio.id,
            &AudioUpdate {
                status: Some(AudioStatus::Saved),
                transcript_id: Some(transcript.id.clone()),
            },
        ))?;

        Ok(transcript)
    }

    /// Append a stored transcript to the vault. Returns whether the append
    /// was confirmed; on failure the transcript stays local with
    /// `saved_to_vault = false` and `last_sync_attempt` set.
    async fn append_to_vault(&self, transcript: &TranscriptRecord) -> Result<bool, StoreError> {
        let path = formatter::daily_note_path(&self.vault_folder, &transcript.created_at);
        let content =
            formatter::format_voice_note(&transcript.created_at, &transcript.text, &transcript.tags);

        match self.bridge.append_note(&path, &content, true).await {
            Ok(receipt) => {
                self.tolerate_missing(self.store.update_transcript(
                    &transcript.id,
                    &TranscriptUpdate {
                        saved_to_vault: Some(true),
                        vault_path: Some(receipt.file_path),
                        ..Default::default()
                    },
                ))?;
                info!(transcript = %transcript.id, %path, "note appended to vault");
                Ok(true)
            }
            Err(err) => {
                warn!(transcript = %transcript.id, %err, "vault append failed, note kept locally");
                self.tolerate_missing(self.store.update_transcript(
                    &transcript.id,
                    &TranscriptUpdate {
                        last_sync_attempt: Some(Utc::now()),
                        ..Default::default()
                    },
                ))?;
                Ok(false)
            }
        }
    }

    /// Manual re-sync of a transcript whose vault append failed. Unlike the
    /// background paths, a missing record here is a hard error.
    #[instrument(skip(self))]
    pub async fn resync(&self, transcript_id: &str) -> Result<bool> {
        let transcript = self
            .store
            .get_transcript(transcript_id)?
            .ok_or_else(|| StoreError::NotFound(transcript_id.to_string()))?;

        Ok(self.append_to_vault(&transcript).await?)
    }

    /// Run until `shutdown` fires: wake on network-available notification,
    /// otherwise re-check periodically. Store corruption halts the loop.
    pub async fn run(&self, mut shutdown: tokio::sync::watch::Receiver<bool>) -> Result<()> {
        let mut ticker = tokio::time::interval(RECHECK_INTERVAL);

        loop {
            tokio::select! {
                _ = self.wake.notified() => {
                    debug!("sync worker woken");
                }
                _ = ticker.tick() => {}
                _ = shutdown.changed() => {
                    info!("sync worker stopping");
                    return Ok(());
                }
            }

            match self.drain_queue().await {
                Ok(report) if report.processed + report.retried + report.failed > 0 => {
                    info!(
                        processed = report.processed,
                        retried = report.retried,
                        failed = report.failed,
                        "drain pass complete"
                    );
                }
                Ok(_) => {}
                Err(err) => {
                    error!(%err, "store failure during drain, halting worker");
                    return Err(err);
                }
            }
        }
    }

    /// Mark a capture as terminally failed; the record may have been deleted
    /// mid-flight, which is fine.
    fn mark_audio_error(&self, audio_id: &str) -> Result<(), StoreError> {
        self.tolerate_missing(self.store.update_audio(
            audio_id,
            &AudioUpdate {
                status: Some(AudioStatus::Error),
                ..Default::default()
            },
        ))
    }

    fn tolerate_missing(&self, result: Result<(), StoreError>) -> Result<(), StoreError> {
        match result {
            Err(StoreError::NotFound(id)) => {
                debug!(%id, "record vanished mid-sync, skipping update");
                Ok(())
            }
            other => other,
        }
    }
}
