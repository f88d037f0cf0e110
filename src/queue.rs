//! Durable offline write queue.
//!
//! Captures made while the bridge is unreachable wait here until the sync
//! worker can drain them. The queue is an append-only JSONL log with state
//! derived by replay, so queued items and their retry counts survive process
//! restarts. Processing order is FIFO by `queued_at` to preserve
//! chronological note ordering in the vault.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::fs::{self, File, OpenOptions};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use uuid::Uuid;

/// Errors that can occur with the offline queue
#[derive(Debug, Error)]
pub enum QueueError {
    #[error("queue item not found: {0}")]
    NotFound(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// An event in the queue log (append-only)
#[derive(Debug, Clone, Serialize, Deserialize)]
struct QueueEvent {
    timestamp: DateTime<Utc>,
    item_id: String,
    event_type: QueueEventType,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
enum QueueEventType {
    /// Item added to the queue
    Enqueued,

    /// Retry count incremented after a transport failure
    Bumped,

    /// Item removed (success or terminal failure)
    Acked,
}

/// Payload recorded with an enqueue event
#[derive(Debug, Clone, Serialize, Deserialize)]
struct EnqueueData {
    audio_id: String,
    queued_at: DateTime<Utc>,
}

/// A queued capture awaiting sync. The audio payload itself stays in the
/// record store; the queue holds only the reference.
#[derive(Debug, Clone)]
pub struct OfflineQueueItem {
    pub id: String,
    pub audio_id: String,
    pub queued_at: DateTime<Utc>,
    pub retry_count: u32,
}

/// JSONL-backed offline queue
pub struct OfflineQueue {
    log_path: PathBuf,
}

impl OfflineQueue {
    pub fn new(log_path: PathBuf) -> Self {
        Self { log_path }
    }

    /// Open a queue, creating the parent directory if needed.
    pub async fn open(log_path: impl Into<PathBuf>) -> Result<Self, QueueError> {
        let log_path = log_path.into();
        if let Some(parent) = log_path.parent() {
            fs::create_dir_all(parent).await?;
        }
        Ok(Self::new(log_path))
    }

    pub fn log_path(&self) -> &Path {
        &self.log_path
    }

    /// Append an event to the queue log
    async fn append_event(&self, event: &QueueEvent) -> Result<(), QueueError> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.log_path)
            .await?;

        let json = serde_json::to_string(event)?;
        file.write_all(format!("{}\n", json).as_bytes()).await?;
        file.flush().await?;

        Ok(())
    }

    /// Replay all events to build current state
    async fn replay(&self) -> Result<HashMap<String, OfflineQueueItem>, QueueError> {
        let mut items: HashMap<String, OfflineQueueItem> = HashMap::new();

        if !self.log_path.exists() {
            return Ok(items);
        }

        let file = File::open(&self.log_path).await?;
        let reader = BufReader::new(file);
        let mut lines = reader.lines();

        while let Some(line) = lines.next_line().await? {
            if line.trim().is_empty() {
                continue;
            }

            let event: QueueEvent = serde_json::from_str(&line)?;
            Self::apply_event(&mut items, event);
        }

        Ok(items)
    }

    fn apply_event(items: &mut HashMap<String, OfflineQueueItem>, event: QueueEvent) {
        match event.event_type {
            QueueEventType::Enqueued => {
                if let Some(data) = event.data {
                    if let Ok(data) = serde_json::from_value::<EnqueueData>(data) {
                        items.insert(
                            event.item_id.clone(),
                            OfflineQueueItem {
                                id: event.item_id,
                                audio_id: data.audio_id,
                                queued_at: data.queued_at,
                                retry_count: 0,
                            },
                        );
                    }
                }
            }
            QueueEventType::Bumped => {
                if let Some(item) = items.get_mut(&event.item_id) {
                    item.retry_count += 1;
                }
            }
            QueueEventType::Acked => {
                items.remove(&event.item_id);
            }
        }
    }

    /// Add a capture reference to the queue.
    pub async fn enqueue(
        &self,
        audio_id: &str,
        queued_at: DateTime<Utc>,
    ) -> Result<String, QueueError> {
        let item_id = Uuid::new_v4().to_string();
        let data = EnqueueData {
            audio_id: audio_id.to_string(),
            queued_at,
        };

        let event = QueueEvent {
            timestamp: Utc::now(),
            item_id: item_id.clone(),
            event_type: QueueEventType::Enqueued,
            data: Some(serde_json::to_value(&data)?),
        };
        self.append_event(&event).await?;

        Ok(item_id)
    }

    /// All queued items in processing order (oldest first).
    pub async fn peek_all(&self) -> Result<Vec<OfflineQueueItem>, QueueError> {
        let items = self.replay().await?;
        let mut queued: Vec<OfflineQueueItem> = items.into_values().collect();
        // id as tiebreaker keeps the order deterministic
        queued.sort_by(|a, b| a.queued_at.cmp(&b.queued_at).then(a.id.cmp(&b.id)));
        Ok(queued)
    }

    /// Remove an item (consumed on success or terminal failure).
    pub async fn ack(&self, item_id: &str) -> Result<(), QueueError> {
        let event = QueueEvent {
            timestamp: Utc::now(),
            item_id: item_id.to_string(),
            event_type: QueueEventType::Acked,
            data: None,
        };
        self.append_event(&event).await?;

        Ok(())
    }

    /// Increment the retry count without removing the item.
    pub async fn bump(&self, item_id: &str) -> Result<(), QueueError> {
        let items = self.replay().await?;
        if !items.contains_key(item_id) {
            return Err(QueueError::NotFound(item_id.to_string()));
        }

        let event = QueueEvent {
            timestamp: Utc::now(),
            item_id: item_id.to_string(),
            event_type: QueueEventType::Bumped,
            data: None,
        };
        self.append_event(&event).await?;

        Ok(())
    }

    /// Number of queued items.
    pub async fn len(&self) -> Result<usize, QueueError> {
        Ok(self.replay().await?.len())
    }

    pub async fn is_empty(&self) -> Result<bool, QueueError> {
        Ok(self.len().await? == 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    async fn create_test_queue() -> (OfflineQueue, TempDir) {
        let temp = TempDir::new().unwrap();
        let log_path = temp.path().join("offline_queue.jsonl");
        (OfflineQueue::new(log_path), temp)
    }

    #[tokio::test]
    async fn test_enqueue_and_peek() {
        let (queue, _temp) = create_test_queue().await;

        let id = queue.enqueue("audio-1", Utc::now()).await.unwrap();

        let items = queue.peek_all().await.unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].id, id);
        assert_eq!(items[0].audio_id, "audio-1");
        assert_eq!(items[0].retry_count, 0);
    }

    #[tokio::test]
    async fn test_fifo_ordering() {
        let (queue, _temp) = create_test_queue().await;

        let base = Utc::now();
        let first = queue.enqueue("audio-a", base).await.unwrap();
        let second = queue
            .enqueue("audio-b", base + chrono::Duration::seconds(1))
            .await
            .unwrap();
        let third = queue
            .enqueue("audio-c", base + chrono::Duration::seconds(2))
            .await
            .unwrap();

        let items = queue.peek_all().await.unwrap();
        let ids: Vec<&str> = items.iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, vec![first.as_str(), second.as_str(), third.as_str()]);
    }

    #[tokio::test]
    async fn test_ack_removes_item() {
        let (queue, _temp) = create_test_queue().await;

        let id = queue.enqueue("audio-1", Utc::now()).await.unwrap();
        queue.ack(&id).await.unwrap();

        assert!(queue.is_empty().await.unwrap());
    }

    #[tokio::test]
    async fn test_bump_increments_retry_count() {
        let (queue, _temp) = create_test_queue().await;

        let id = queue.enqueue("audio-1", Utc::now()).await.unwrap();
        queue.bump(&id).await.unwrap();
        queue.bump(&id).await.unwrap();

        let items = queue.peek_all().await.unwrap();
        assert_eq!(items[0].retry_count, 2);
    }

    #[tokio::test]
    async fn test_bump_missing_item_is_not_found() {
        let (queue, _temp) = create_test_queue().await;

        let err = queue.bump("ghost").await.unwrap_err();
        assert!(matches!(err, QueueError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_state_survives_reopen() {
        let temp = TempDir::new().unwrap();
        let log_path = temp.path().join("queue.jsonl");

        let id = {
            let queue = OfflineQueue::new(log_path.clone());
            let id = queue.enqueue("audio-1", Utc::now()).await.unwrap();
            queue.bump(&id).await.unwrap();
            id
        };

        let queue = OfflineQueue::new(log_path);
        let items = queue.peek_all().await.unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].id, id);
        assert_eq!(items[0].retry_count, 1);
    }
}
