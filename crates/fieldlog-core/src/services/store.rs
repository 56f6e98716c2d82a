//! Async local record store service

use std::path::PathBuf;
use std::sync::Arc;

use serde_json::Value;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::db::{migrations, Database, RecordRepository, SqliteRecordRepository};
use crate::error::{Error, Result};
use crate::models::{ActivityRecord, Collection, DeliveryReceipt, StoredRecord};
use crate::util::normalize_text_option;

/// Thread-safe record store with an awaitable API.
///
/// Each operation is atomic with respect to its own collection. Composite
/// sequences (write a record, then enqueue a sync item) are NOT atomic as
/// a pair; callers must tolerate eventual consistency between "record
/// exists" and "record is queued".
#[derive(Clone)]
pub struct LocalStore {
    db: Arc<Mutex<Database>>,
}

impl LocalStore {
    /// Open a store backed by a database file at the given path.
    pub async fn open_path(db_path: impl Into<PathBuf>) -> Result<Self> {
        let db_path = db_path.into();
        let db = Database::open(&db_path)?;
        tracing::info!(path = %db_path.display(), "opened local record store");
        Ok(Self {
            db: Arc::new(Mutex::new(db)),
        })
    }

    /// Open an in-memory store (primarily for tests).
    pub async fn open_in_memory() -> Result<Self> {
        Ok(Self {
            db: Arc::new(Mutex::new(Database::open_in_memory()?)),
        })
    }

    /// Wrap an already-opened database handle.
    ///
    /// Composition seam for callers sharing one handle between the store
    /// and the sync queue.
    pub fn from_database(db: Arc<Mutex<Database>>) -> Self {
        Self { db }
    }

    /// Shared handle to the underlying database.
    pub fn database(&self) -> Arc<Mutex<Database>> {
        Arc::clone(&self.db)
    }

    /// Resolves once the store is migrated and usable.
    ///
    /// The initialization contract callers await instead of polling for
    /// readiness.
    pub async fn ready(&self) -> Result<()> {
        let db = self.db.lock().await;
        let version = db.schema_version()?;
        if version == migrations::CURRENT_VERSION {
            Ok(())
        } else {
            Err(Error::Database(format!(
                "store schema at v{version}, expected v{}",
                migrations::CURRENT_VERSION
            )))
        }
    }

    /// Insert or replace a record; a missing key gets a generated UUID v7.
    ///
    /// Returns the stored record, marked unsynced.
    pub async fn put(
        &self,
        collection: Collection,
        key: Option<String>,
        payload: Value,
    ) -> Result<StoredRecord> {
        let key = normalize_text_option(key).unwrap_or_else(|| Uuid::now_v7().to_string());
        let db = self.db.lock().await;
        SqliteRecordRepository::new(db.conn()).put(collection, &key, &payload)
    }

    /// Get a record by key.
    pub async fn get(&self, collection: Collection, key: &str) -> Result<Option<StoredRecord>> {
        let db = self.db.lock().await;
        SqliteRecordRepository::new(db.conn()).get(collection, key)
    }

    /// All records in a collection, in store-native order.
    ///
    /// Order is not guaranteed across restarts; callers needing
    /// determinism sort on `created_at` themselves.
    pub async fn get_all(&self, collection: Collection) -> Result<Vec<StoredRecord>> {
        let db = self.db.lock().await;
        SqliteRecordRepository::new(db.conn()).get_all(collection)
    }

    /// Delete by key; removing a missing key is a no-op success.
    pub async fn remove(&self, collection: Collection, key: &str) -> Result<()> {
        let db = self.db.lock().await;
        SqliteRecordRepository::new(db.conn()).remove(collection, key)
    }

    /// Empty a collection (user-initiated data wipe).
    pub async fn clear(&self, collection: Collection) -> Result<()> {
        let db = self.db.lock().await;
        SqliteRecordRepository::new(db.conn()).clear(collection)
    }

    /// Flip a record's synced flag.
    pub async fn mark_synced(
        &self,
        collection: Collection,
        key: &str,
        synced: bool,
    ) -> Result<()> {
        let db = self.db.lock().await;
        SqliteRecordRepository::new(db.conn()).mark_synced(collection, key, synced)
    }

    /// All unsynced records in a collection.
    pub async fn unsynced(&self, collection: Collection) -> Result<Vec<StoredRecord>> {
        let db = self.db.lock().await;
        SqliteRecordRepository::new(db.conn()).unsynced(collection)
    }

    /// Reconciliation write-back of a server ack, keyed by event id.
    ///
    /// Returns false when no matching activity record exists.
    pub async fn apply_ack(
        &self,
        client_event_id: &str,
        receipt: &DeliveryReceipt,
    ) -> Result<bool> {
        let db = self.db.lock().await;
        SqliteRecordRepository::new(db.conn()).apply_ack(client_event_id, receipt)
    }

    /// Upsert an activity entry under its idempotency key.
    pub async fn put_activity(&self, activity: &ActivityRecord) -> Result<StoredRecord> {
        let payload = serde_json::to_value(activity)?;
        self.put(
            Collection::Activities,
            Some(activity.client_event_id.to_string()),
            payload,
        )
        .await
    }

    /// Load an activity entry back into its typed form.
    pub async fn get_activity(&self, client_event_id: &str) -> Result<Option<ActivityRecord>> {
        let record = self.get(Collection::Activities, client_event_id).await?;
        record
            .map(|record| serde_json::from_value(record.payload).map_err(Error::from))
            .transpose()
    }
}
