//! Data models for the offline store and sync queue

pub mod activity;
pub mod queue;
pub mod record;

pub use activity::{
    ActivityDraft, ActivityRecord, ClientEventId, DeliveryReceipt, GpsFix, PhotoMeta,
};
pub use queue::{DeadLetter, QueueItem, SyncPayload};
pub use record::{owner_of, Collection, StoredRecord};
