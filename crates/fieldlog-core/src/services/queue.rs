//! Async sync queue service

use std::sync::Arc;

use tokio::sync::Mutex;

use crate::db::{Database, QueueRepository, SqliteQueueRepository};
use crate::error::Result;
use crate::models::{DeadLetter, QueueItem, SyncPayload};

/// Durable staging area for pending remote deliveries.
///
/// Holds copies of records for delivery purposes only; the record store
/// remains the system of record. Survives restarts.
#[derive(Clone)]
pub struct SyncQueue {
    db: Arc<Mutex<Database>>,
}

impl SyncQueue {
    /// Create a queue over a shared database handle.
    pub fn new(db: Arc<Mutex<Database>>) -> Self {
        Self { db }
    }

    /// Append a new item with `retry_count = 0`.
    pub async fn enqueue(&self, payload: &SyncPayload) -> Result<QueueItem> {
        let db = self.db.lock().await;
        let item = SqliteQueueRepository::new(db.conn()).enqueue(payload)?;
        tracing::debug!(id = item.id, item = %payload.describe(), "enqueued for sync");
        Ok(item)
    }

    /// Full current list of queued items, FIFO, without removing them.
    ///
    /// Removal is the coordinator's responsibility once each item's
    /// outcome is known.
    pub async fn snapshot(&self) -> Result<Vec<QueueItem>> {
        let db = self.db.lock().await;
        SqliteQueueRepository::new(db.conn()).snapshot()
    }

    /// Increment and persist an item's retry count.
    pub async fn requeue(&self, item: &QueueItem) -> Result<u32> {
        let db = self.db.lock().await;
        SqliteQueueRepository::new(db.conn()).requeue(item)
    }

    /// Permanently remove an item after a successful delivery.
    pub async fn dequeue(&self, id: i64) -> Result<()> {
        let db = self.db.lock().await;
        SqliteQueueRepository::new(db.conn()).dequeue(id)
    }

    /// Move an exhausted item to the dead-letter table.
    pub async fn bury(&self, item: &QueueItem, reason: &str) -> Result<DeadLetter> {
        let db = self.db.lock().await;
        let letter = SqliteQueueRepository::new(db.conn()).bury(item, reason)?;
        tracing::warn!(
            id = item.id,
            item = %item.payload.describe(),
            reason,
            "delivery exhausted retries; moved to dead letters"
        );
        Ok(letter)
    }

    /// Number of queued items.
    pub async fn len(&self) -> Result<usize> {
        let db = self.db.lock().await;
        SqliteQueueRepository::new(db.conn()).len()
    }

    /// Whether the queue is empty.
    pub async fn is_empty(&self) -> Result<bool> {
        Ok(self.len().await? == 0)
    }

    /// All buried deliveries, oldest first.
    pub async fn dead_letters(&self) -> Result<Vec<DeadLetter>> {
        let db = self.db.lock().await;
        SqliteQueueRepository::new(db.conn()).dead_letters()
    }
}
