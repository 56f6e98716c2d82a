//! Sync queue work units and payload variants

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::activity::ActivityRecord;
use super::record::Collection;

/// Typed payload carried by a queued delivery.
///
/// Each variant maps to one remote endpoint; the tag makes malformed
/// queue rows fail to decode instead of flowing downstream untyped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SyncPayload {
    /// Generic record upsert for a named collection
    Record {
        collection: Collection,
        key: String,
        payload: Value,
    },
    /// Activity tracking entry, idempotent on `client_event_id`
    Activity(ActivityRecord),
}

impl SyncPayload {
    /// Operation kind, as a stable name.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Record { .. } => "record",
            Self::Activity(_) => "activity",
        }
    }

    /// Stable identity used in log lines.
    #[must_use]
    pub fn describe(&self) -> String {
        match self {
            Self::Record {
                collection, key, ..
            } => format!("{collection}/{key}"),
            Self::Activity(activity) => format!("activities/{}", activity.client_event_id),
        }
    }
}

/// A pending remote-delivery work unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueItem {
    /// Queue row id; FIFO order within a drain pass
    pub id: i64,
    /// The delivery payload
    pub payload: SyncPayload,
    /// Enqueue timestamp (RFC 3339)
    pub enqueued_at: String,
    /// Failed attempts so far; starts at 0, +1 per failure, never reset
    pub retry_count: u32,
}

/// A delivery that exhausted its retry budget.
///
/// Kept durably instead of being dropped, so exhausted writes stay
/// inspectable and recoverable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeadLetter {
    /// Dead-letter row id
    pub id: i64,
    /// The payload that could not be delivered
    pub payload: SyncPayload,
    /// Final delivery error
    pub reason: String,
    /// Retry count at burial time
    pub retry_count: u32,
    /// Burial timestamp (RFC 3339)
    pub failed_at: String,
}
