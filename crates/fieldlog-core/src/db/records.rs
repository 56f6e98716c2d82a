//! Record repository implementation

use rusqlite::{params, Connection, OptionalExtension};
use serde_json::Value;

use crate::error::Result;
use crate::models::{owner_of, Collection, DeliveryReceipt, StoredRecord};
use crate::util::now_rfc3339;

/// Trait for record storage operations
pub trait RecordRepository {
    /// Insert or replace a record by primary key; returns the stored record
    fn put(&self, collection: Collection, key: &str, payload: &Value) -> Result<StoredRecord>;

    /// Get a record by key
    fn get(&self, collection: Collection, key: &str) -> Result<Option<StoredRecord>>;

    /// All records in a collection, in store-native order
    fn get_all(&self, collection: Collection) -> Result<Vec<StoredRecord>>;

    /// Delete by key; removing a missing key is a no-op success
    fn remove(&self, collection: Collection, key: &str) -> Result<()>;

    /// Empty a collection (user-initiated data wipe)
    fn clear(&self, collection: Collection) -> Result<()>;

    /// Flip the synced flag for a record
    fn mark_synced(&self, collection: Collection, key: &str, synced: bool) -> Result<()>;

    /// All unsynced records in a collection
    fn unsynced(&self, collection: Collection) -> Result<Vec<StoredRecord>>;

    /// Write a server ack back into an activity record, keyed by
    /// `client_event_id`. Returns false when no such record exists.
    fn apply_ack(&self, client_event_id: &str, receipt: &DeliveryReceipt) -> Result<bool>;
}

/// `SQLite` implementation of `RecordRepository`
pub struct SqliteRecordRepository<'a> {
    conn: &'a Connection,
}

impl<'a> SqliteRecordRepository<'a> {
    /// Create a new repository with the given connection
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    fn select_records(&self, collection: Collection, sql: &str) -> Result<Vec<StoredRecord>> {
        let mut statement = self.conn.prepare(sql)?;
        let rows = statement.query_map(params![collection.as_str()], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, i64>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, String>(4)?,
            ))
        })?;

        let mut records = Vec::new();
        for row in rows {
            let (key, payload, synced, created_at, updated_at) = row?;
            records.push(StoredRecord {
                collection,
                key,
                payload: serde_json::from_str(&payload)?,
                synced: synced != 0,
                created_at,
                updated_at,
            });
        }
        Ok(records)
    }
}

impl RecordRepository for SqliteRecordRepository<'_> {
    fn put(&self, collection: Collection, key: &str, payload: &Value) -> Result<StoredRecord> {
        collection.validate_payload(key, payload)?;

        let now = now_rfc3339();
        let tx = self.conn.unchecked_transaction()?;

        // A replace keeps the original creation time
        let created_at: Option<String> = tx
            .query_row(
                "SELECT created_at FROM records WHERE collection = ? AND key = ?",
                params![collection.as_str(), key],
                |row| row.get(0),
            )
            .optional()?;
        let created_at = created_at.unwrap_or_else(|| now.clone());

        tx.execute(
            "INSERT OR REPLACE INTO records
                (collection, key, payload, synced, owner, created_at, updated_at)
             VALUES (?, ?, ?, 0, ?, ?, ?)",
            params![
                collection.as_str(),
                key,
                serde_json::to_string(payload)?,
                owner_of(payload),
                created_at,
                now
            ],
        )?;
        tx.commit()?;

        Ok(StoredRecord {
            collection,
            key: key.to_string(),
            payload: payload.clone(),
            synced: false,
            created_at,
            updated_at: now,
        })
    }

    fn get(&self, collection: Collection, key: &str) -> Result<Option<StoredRecord>> {
        let row: Option<(String, i64, String, String)> = self
            .conn
            .query_row(
                "SELECT payload, synced, created_at, updated_at
                 FROM records WHERE collection = ? AND key = ?",
                params![collection.as_str(), key],
                |row| {
                    Ok((
                        row.get(0)?,
                        row.get(1)?,
                        row.get(2)?,
                        row.get(3)?,
                    ))
                },
            )
            .optional()?;

        let Some((payload, synced, created_at, updated_at)) = row else {
            return Ok(None);
        };
        Ok(Some(StoredRecord {
            collection,
            key: key.to_string(),
            payload: serde_json::from_str(&payload)?,
            synced: synced != 0,
            created_at,
            updated_at,
        }))
    }

    fn get_all(&self, collection: Collection) -> Result<Vec<StoredRecord>> {
        self.select_records(
            collection,
            "SELECT key, payload, synced, created_at, updated_at
             FROM records WHERE collection = ?",
        )
    }

    fn remove(&self, collection: Collection, key: &str) -> Result<()> {
        self.conn.execute(
            "DELETE FROM records WHERE collection = ? AND key = ?",
            params![collection.as_str(), key],
        )?;
        Ok(())
    }

    fn clear(&self, collection: Collection) -> Result<()> {
        self.conn.execute(
            "DELETE FROM records WHERE collection = ?",
            params![collection.as_str()],
        )?;
        Ok(())
    }

    fn mark_synced(&self, collection: Collection, key: &str, synced: bool) -> Result<()> {
        self.conn.execute(
            "UPDATE records SET synced = ? WHERE collection = ? AND key = ?",
            params![i64::from(synced), collection.as_str(), key],
        )?;
        Ok(())
    }

    fn unsynced(&self, collection: Collection) -> Result<Vec<StoredRecord>> {
        self.select_records(
            collection,
            "SELECT key, payload, synced, created_at, updated_at
             FROM records WHERE collection = ? AND synced = 0",
        )
    }

    fn apply_ack(&self, client_event_id: &str, receipt: &DeliveryReceipt) -> Result<bool> {
        let tx = self.conn.unchecked_transaction()?;
        let stored: Option<String> = tx
            .query_row(
                "SELECT payload FROM records WHERE collection = ? AND key = ?",
                params![Collection::Activities.as_str(), client_event_id],
                |row| row.get(0),
            )
            .optional()?;
        let Some(stored) = stored else {
            return Ok(false);
        };

        let mut payload: Value = serde_json::from_str(&stored)?;
        if let Some(object) = payload.as_object_mut() {
            if let Some(activity_id) = &receipt.activity_id {
                object.insert(
                    "activity_id".to_string(),
                    Value::String(activity_id.clone()),
                );
            }
            if let Some(status) = &receipt.status {
                object.insert("status".to_string(), Value::String(status.clone()));
            }
            object.insert("synced".to_string(), Value::Bool(true));
        }

        tx.execute(
            "UPDATE records SET payload = ?, synced = 1, updated_at = ?
             WHERE collection = ? AND key = ?",
            params![
                serde_json::to_string(&payload)?,
                now_rfc3339(),
                Collection::Activities.as_str(),
                client_event_id
            ],
        )?;
        tx.commit()?;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use crate::db::Database;

    use super::*;

    fn database() -> Database {
        Database::open_in_memory().unwrap()
    }

    #[test]
    fn put_then_get_round_trips() {
        let db = database();
        let repo = SqliteRecordRepository::new(db.conn());

        let payload = json!({ "variety_id": "v-1", "name": "KDV-1", "user_id": "farmer-9" });
        let stored = repo.put(Collection::Varieties, "v-1", &payload).unwrap();
        assert!(!stored.synced);

        let fetched = repo.get(Collection::Varieties, "v-1").unwrap().unwrap();
        assert_eq!(fetched.payload, payload);
        assert_eq!(fetched.created_at, stored.created_at);
    }

    #[test]
    fn get_missing_key_is_none() {
        let db = database();
        let repo = SqliteRecordRepository::new(db.conn());
        assert!(repo.get(Collection::Photos, "nope").unwrap().is_none());
    }

    #[test]
    fn replace_preserves_created_at_and_resets_synced() {
        let db = database();
        let repo = SqliteRecordRepository::new(db.conn());

        let first = repo
            .put(Collection::Preferences, "pref-1", &json!({ "units": "ha" }))
            .unwrap();
        repo.mark_synced(Collection::Preferences, "pref-1", true)
            .unwrap();

        let second = repo
            .put(Collection::Preferences, "pref-1", &json!({ "units": "acre" }))
            .unwrap();
        assert_eq!(second.created_at, first.created_at);

        let fetched = repo.get(Collection::Preferences, "pref-1").unwrap().unwrap();
        assert!(!fetched.synced);
        assert_eq!(fetched.payload, json!({ "units": "acre" }));
        assert_eq!(repo.get_all(Collection::Preferences).unwrap().len(), 1);
    }

    #[test]
    fn collections_do_not_collide_on_key() {
        let db = database();
        let repo = SqliteRecordRepository::new(db.conn());

        repo.put(Collection::Varieties, "x", &json!({ "name": "maize" }))
            .unwrap();
        repo.put(Collection::Photos, "x", &json!({ "file_name": "a.jpg" }))
            .unwrap();

        let variety = repo.get(Collection::Varieties, "x").unwrap().unwrap();
        assert_eq!(variety.payload, json!({ "name": "maize" }));
        assert_eq!(repo.get_all(Collection::Photos).unwrap().len(), 1);
    }

    #[test]
    fn put_rejects_non_object_payload() {
        let db = database();
        let repo = SqliteRecordRepository::new(db.conn());
        assert!(repo
            .put(Collection::Varieties, "v-1", &json!("just a string"))
            .is_err());
    }

    #[test]
    fn remove_missing_key_is_ok() {
        let db = database();
        let repo = SqliteRecordRepository::new(db.conn());
        repo.remove(Collection::FieldData, "missing").unwrap();
    }

    #[test]
    fn clear_empties_only_the_target_collection() {
        let db = database();
        let repo = SqliteRecordRepository::new(db.conn());

        repo.put(Collection::Varieties, "v-1", &json!({})).unwrap();
        repo.put(Collection::Photos, "p-1", &json!({})).unwrap();
        repo.clear(Collection::Varieties).unwrap();

        assert!(repo.get_all(Collection::Varieties).unwrap().is_empty());
        assert_eq!(repo.get_all(Collection::Photos).unwrap().len(), 1);
    }

    #[test]
    fn unsynced_filters_on_the_flag() {
        let db = database();
        let repo = SqliteRecordRepository::new(db.conn());

        repo.put(Collection::FieldData, "f-1", &json!({})).unwrap();
        repo.put(Collection::FieldData, "f-2", &json!({})).unwrap();
        repo.mark_synced(Collection::FieldData, "f-1", true).unwrap();

        let unsynced = repo.unsynced(Collection::FieldData).unwrap();
        assert_eq!(unsynced.len(), 1);
        assert_eq!(unsynced[0].key, "f-2");
    }

    #[test]
    fn apply_ack_updates_activity_payload() {
        let db = database();
        let repo = SqliteRecordRepository::new(db.conn());

        let payload = json!({
            "client_event_id": "evt-1",
            "strategy_id": "s-1",
            "status": "pending",
            "synced": false
        });
        repo.put(Collection::Activities, "evt-1", &payload).unwrap();

        let receipt = DeliveryReceipt {
            activity_id: Some("act-55".to_string()),
            status: Some("confirmed".to_string()),
        };
        assert!(repo.apply_ack("evt-1", &receipt).unwrap());

        let fetched = repo.get(Collection::Activities, "evt-1").unwrap().unwrap();
        assert!(fetched.synced);
        assert_eq!(fetched.payload["activity_id"], json!("act-55"));
        assert_eq!(fetched.payload["status"], json!("confirmed"));
        assert_eq!(fetched.payload["synced"], json!(true));
    }

    #[test]
    fn apply_ack_for_missing_record_reports_false() {
        let db = database();
        let repo = SqliteRecordRepository::new(db.conn());
        assert!(!repo
            .apply_ack("ghost", &DeliveryReceipt::default())
            .unwrap());
    }
}
