//! Sync queue repository implementation

use rusqlite::{params, Connection};

use crate::error::Result;
use crate::models::{DeadLetter, QueueItem, SyncPayload};
use crate::util::now_rfc3339;

/// Trait for sync queue storage operations
pub trait QueueRepository {
    /// Append a new item with `retry_count = 0`
    fn enqueue(&self, payload: &SyncPayload) -> Result<QueueItem>;

    /// Full current list of queued items in FIFO order, without removal
    fn snapshot(&self) -> Result<Vec<QueueItem>>;

    /// Increment and persist an item's retry count; returns the new count
    fn requeue(&self, item: &QueueItem) -> Result<u32>;

    /// Permanently remove an item
    fn dequeue(&self, id: i64) -> Result<()>;

    /// Move an item to the dead-letter table
    fn bury(&self, item: &QueueItem, reason: &str) -> Result<DeadLetter>;

    /// Number of queued items
    fn len(&self) -> Result<usize>;

    /// All buried deliveries, oldest first
    fn dead_letters(&self) -> Result<Vec<DeadLetter>>;
}

/// `SQLite` implementation of `QueueRepository`
pub struct SqliteQueueRepository<'a> {
    conn: &'a Connection,
}

impl<'a> SqliteQueueRepository<'a> {
    /// Create a new repository with the given connection
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }
}

impl QueueRepository for SqliteQueueRepository<'_> {
    fn enqueue(&self, payload: &SyncPayload) -> Result<QueueItem> {
        let enqueued_at = now_rfc3339();
        self.conn.execute(
            "INSERT INTO sync_queue (payload, enqueued_at, retry_count) VALUES (?, ?, 0)",
            params![serde_json::to_string(payload)?, enqueued_at],
        )?;
        Ok(QueueItem {
            id: self.conn.last_insert_rowid(),
            payload: payload.clone(),
            enqueued_at,
            retry_count: 0,
        })
    }

    fn snapshot(&self) -> Result<Vec<QueueItem>> {
        let mut statement = self.conn.prepare(
            "SELECT id, payload, enqueued_at, retry_count FROM sync_queue ORDER BY id ASC",
        )?;
        let rows = statement.query_map([], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, u32>(3)?,
            ))
        })?;

        let mut items = Vec::new();
        for row in rows {
            let (id, payload, enqueued_at, retry_count) = row?;
            // An undecodable row must not poison every future drain pass
            match serde_json::from_str(&payload) {
                Ok(payload) => items.push(QueueItem {
                    id,
                    payload,
                    enqueued_at,
                    retry_count,
                }),
                Err(error) => {
                    tracing::warn!(id, %error, "skipping undecodable sync queue row");
                }
            }
        }
        Ok(items)
    }

    fn requeue(&self, item: &QueueItem) -> Result<u32> {
        let retry_count = item.retry_count + 1;
        self.conn.execute(
            "UPDATE sync_queue SET retry_count = ? WHERE id = ?",
            params![retry_count, item.id],
        )?;
        Ok(retry_count)
    }

    fn dequeue(&self, id: i64) -> Result<()> {
        self.conn
            .execute("DELETE FROM sync_queue WHERE id = ?", params![id])?;
        Ok(())
    }

    fn bury(&self, item: &QueueItem, reason: &str) -> Result<DeadLetter> {
        let failed_at = now_rfc3339();
        let retry_count = item.retry_count + 1;
        let tx = self.conn.unchecked_transaction()?;
        tx.execute(
            "INSERT INTO dead_letters (payload, reason, retry_count, failed_at)
             VALUES (?, ?, ?, ?)",
            params![
                serde_json::to_string(&item.payload)?,
                reason,
                retry_count,
                failed_at
            ],
        )?;
        let id = tx.last_insert_rowid();
        tx.execute("DELETE FROM sync_queue WHERE id = ?", params![item.id])?;
        tx.commit()?;

        Ok(DeadLetter {
            id,
            payload: item.payload.clone(),
            reason: reason.to_string(),
            retry_count,
            failed_at,
        })
    }

    fn len(&self) -> Result<usize> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM sync_queue", [], |row| row.get(0))?;
        Ok(usize::try_from(count).unwrap_or(0))
    }

    fn dead_letters(&self) -> Result<Vec<DeadLetter>> {
        let mut statement = self.conn.prepare(
            "SELECT id, payload, reason, retry_count, failed_at
             FROM dead_letters ORDER BY id ASC",
        )?;
        let rows = statement.query_map([], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, u32>(3)?,
                row.get::<_, String>(4)?,
            ))
        })?;

        let mut letters = Vec::new();
        for row in rows {
            let (id, payload, reason, retry_count, failed_at) = row?;
            letters.push(DeadLetter {
                id,
                payload: serde_json::from_str(&payload)?,
                reason,
                retry_count,
                failed_at,
            });
        }
        Ok(letters)
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use crate::db::Database;
    use crate::models::Collection;

    use super::*;

    fn record_payload(key: &str) -> SyncPayload {
        SyncPayload::Record {
            collection: Collection::FieldData,
            key: key.to_string(),
            payload: json!({ "field_id": key }),
        }
    }

    #[test]
    fn enqueue_starts_with_zero_retries() {
        let db = Database::open_in_memory().unwrap();
        let repo = SqliteQueueRepository::new(db.conn());

        let item = repo.enqueue(&record_payload("f-1")).unwrap();
        assert_eq!(item.retry_count, 0);
        assert_eq!(repo.len().unwrap(), 1);
    }

    #[test]
    fn snapshot_is_fifo_and_non_destructive() {
        let db = Database::open_in_memory().unwrap();
        let repo = SqliteQueueRepository::new(db.conn());

        repo.enqueue(&record_payload("f-1")).unwrap();
        repo.enqueue(&record_payload("f-2")).unwrap();
        repo.enqueue(&record_payload("f-3")).unwrap();

        let items = repo.snapshot().unwrap();
        let keys: Vec<_> = items
            .iter()
            .map(|item| item.payload.describe())
            .collect();
        assert_eq!(keys, ["field_data/f-1", "field_data/f-2", "field_data/f-3"]);
        assert_eq!(repo.len().unwrap(), 3);
    }

    #[test]
    fn requeue_increments_persisted_count() {
        let db = Database::open_in_memory().unwrap();
        let repo = SqliteQueueRepository::new(db.conn());

        let item = repo.enqueue(&record_payload("f-1")).unwrap();
        assert_eq!(repo.requeue(&item).unwrap(), 1);

        let reread = &repo.snapshot().unwrap()[0];
        assert_eq!(reread.retry_count, 1);
        assert_eq!(repo.requeue(reread).unwrap(), 2);
    }

    #[test]
    fn dequeue_removes_a_single_item() {
        let db = Database::open_in_memory().unwrap();
        let repo = SqliteQueueRepository::new(db.conn());

        let first = repo.enqueue(&record_payload("f-1")).unwrap();
        repo.enqueue(&record_payload("f-2")).unwrap();

        repo.dequeue(first.id).unwrap();
        let items = repo.snapshot().unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].payload.describe(), "field_data/f-2");
    }

    #[test]
    fn bury_moves_item_to_dead_letters() {
        let db = Database::open_in_memory().unwrap();
        let repo = SqliteQueueRepository::new(db.conn());

        let mut item = repo.enqueue(&record_payload("f-1")).unwrap();
        item.retry_count = 2;
        let letter = repo.bury(&item, "connection refused").unwrap();

        assert_eq!(repo.len().unwrap(), 0);
        assert_eq!(letter.retry_count, 3);
        let letters = repo.dead_letters().unwrap();
        assert_eq!(letters.len(), 1);
        assert_eq!(letters[0].reason, "connection refused");
        assert_eq!(letters[0].payload, item.payload);
    }

    #[test]
    fn queue_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fieldlog.db");

        {
            let db = Database::open(&path).unwrap();
            let repo = SqliteQueueRepository::new(db.conn());
            repo.enqueue(&record_payload("f-1")).unwrap();
        }

        let db = Database::open(&path).unwrap();
        let repo = SqliteQueueRepository::new(db.conn());
        let items = repo.snapshot().unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].payload.describe(), "field_data/f-1");
    }
}
