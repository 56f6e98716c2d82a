//! Sync coordination: when to drain the queue and how to dispose of each
//! item's outcome
//!
//! The coordinator is the single arbiter for queue draining. A
//! "drain in progress" gate keeps overlapping triggers from fetching the
//! same queue snapshot and delivering an item twice; triggers that arrive
//! mid-pass are coalesced.

mod run;
mod transport;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde_json::Value;
use tokio::sync::{broadcast, watch, Mutex};

use crate::config::SyncOptions;
use crate::error::{Error, Result};
use crate::models::{
    ActivityDraft, ActivityRecord, Collection, DeliveryReceipt, StoredRecord, SyncPayload,
};
use crate::monitor::NetSignal;
use crate::normalize;
use crate::services::{LocalStore, SyncQueue};
use crate::state::SyncState;

pub use run::run_signal_loop;
pub use transport::{HttpTransport, SyncTransport};

const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Events from the background messaging channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AgentEvent {
    /// A background sync finished cleanly
    SyncCompleted,
    /// A background sync reported a failure
    SyncError(String),
    /// The content cache changed; informational only
    CacheUpdated,
}

/// Aggregate notifications surfaced to UI subscribers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncEvent {
    /// Connectivity came back
    Online,
    /// Connectivity dropped
    Offline,
    /// A drain pass finished
    DrainCompleted {
        delivered: usize,
        requeued: usize,
        buried: usize,
    },
    /// Some items failed and will be retried
    SyncFailedWillRetry,
}

/// Tally for one drain pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DrainReport {
    /// Items attempted this pass
    pub attempted: usize,
    /// Items delivered and removed
    pub delivered: usize,
    /// Items that failed below the retry cap
    pub requeued: usize,
    /// Items moved to dead letters
    pub buried: usize,
}

/// Result of a drain trigger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrainOutcome {
    /// A pass ran to completion
    Completed(DrainReport),
    /// Another pass holds the gate; this trigger was coalesced
    AlreadyRunning,
    /// No connectivity; nothing was attempted
    Offline,
}

/// Orchestrates queue drains and per-item outcome disposal.
pub struct SyncCoordinator {
    store: LocalStore,
    queue: SyncQueue,
    transport: Arc<dyn SyncTransport>,
    online: watch::Receiver<bool>,
    options: SyncOptions,
    drain_gate: Mutex<()>,
    draining: AtomicBool,
    degraded: AtomicBool,
    events: broadcast::Sender<SyncEvent>,
}

impl SyncCoordinator {
    /// Compose a coordinator from independently constructed parts.
    pub fn new(
        store: LocalStore,
        queue: SyncQueue,
        transport: Arc<dyn SyncTransport>,
        online: watch::Receiver<bool>,
        options: SyncOptions,
    ) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            store,
            queue,
            transport,
            online,
            options,
            drain_gate: Mutex::new(()),
            draining: AtomicBool::new(false),
            degraded: AtomicBool::new(false),
            events,
        }
    }

    /// Current connectivity, as reported by the monitor.
    pub fn is_online(&self) -> bool {
        *self.online.borrow()
    }

    /// Retry policy in effect.
    pub const fn options(&self) -> &SyncOptions {
        &self.options
    }

    /// Subscribe to aggregate sync notifications.
    pub fn subscribe(&self) -> broadcast::Receiver<SyncEvent> {
        self.events.subscribe()
    }

    /// Aggregate state for UI banners.
    pub fn state(&self) -> SyncState {
        if !self.is_online() {
            SyncState::Offline
        } else if self.draining.load(Ordering::SeqCst) {
            SyncState::Syncing
        } else if self.degraded.load(Ordering::SeqCst) {
            SyncState::Error
        } else {
            SyncState::Synced
        }
    }

    /// Save a generic record: normalize, persist unsynced, then deliver
    /// immediately when online or queue for later.
    ///
    /// Returns the record as stored after the immediate attempt, so the
    /// synced flag reflects a successful direct delivery.
    pub async fn save_record(
        &self,
        collection: Collection,
        key: Option<String>,
        payload: Value,
    ) -> Result<StoredRecord> {
        if !payload.is_object() {
            return Err(Error::InvalidInput(format!(
                "{collection} payload must be a JSON object"
            )));
        }
        let normalized = Value::Object(normalize::normalize_nested(Some(&payload)));
        let record = self.store.put(collection, key, normalized).await?;
        self.dispatch(SyncPayload::Record {
            collection,
            key: record.key.clone(),
            payload: record.payload.clone(),
        })
        .await?;
        Ok(self
            .store
            .get(collection, &record.key)
            .await?
            .unwrap_or(record))
    }

    /// Save an activity tracking entry through the full normalization
    /// pipeline. Re-submission under the same `client_event_id`
    /// overwrites the local record instead of duplicating it.
    ///
    /// Returns the entry as stored, including any reconciliation from an
    /// immediate delivery.
    pub async fn submit_activity(&self, draft: ActivityDraft) -> Result<ActivityRecord> {
        let record = ActivityRecord::from_draft(draft, !self.is_online())?;
        self.store.put_activity(&record).await?;
        self.dispatch(SyncPayload::Activity(record.clone())).await?;
        self.store
            .get_activity(record.client_event_id.as_str())
            .await?
            .ok_or_else(|| Error::NotFound(format!("activities/{}", record.client_event_id)))
    }

    /// Drain the queue once, if online and no pass is already running.
    pub async fn try_drain(&self) -> Result<DrainOutcome> {
        if !self.is_online() {
            return Ok(DrainOutcome::Offline);
        }
        let Ok(_gate) = self.drain_gate.try_lock() else {
            tracing::debug!("drain already in progress; trigger coalesced");
            return Ok(DrainOutcome::AlreadyRunning);
        };

        self.draining.store(true, Ordering::SeqCst);
        let result = self.drain_pass().await;
        self.draining.store(false, Ordering::SeqCst);
        result.map(DrainOutcome::Completed)
    }

    /// Trigger: connectivity came back.
    pub async fn connectivity_restored(&self) -> Result<DrainOutcome> {
        let _ = self.events.send(SyncEvent::Online);
        tracing::info!("connectivity restored; draining sync queue");
        self.try_drain().await
    }

    /// Trigger: connectivity dropped. Nothing to drain; callers keep
    /// capturing locally.
    pub fn connectivity_lost(&self) {
        let _ = self.events.send(SyncEvent::Offline);
        tracing::info!("connectivity lost; capturing locally");
    }

    /// Trigger: the app returned to the foreground.
    pub async fn became_visible(&self) -> Result<DrainOutcome> {
        if self.is_online() {
            self.try_drain().await
        } else {
            Ok(DrainOutcome::Offline)
        }
    }

    /// Apply one monitor signal.
    pub async fn handle_signal(&self, signal: NetSignal) -> Result<DrainOutcome> {
        match signal {
            NetSignal::ConnectivityRestored => self.connectivity_restored().await,
            NetSignal::ConnectivityLost => {
                self.connectivity_lost();
                Ok(DrainOutcome::Offline)
            }
            NetSignal::Foregrounded => self.became_visible().await,
        }
    }

    /// Apply one background-agent event.
    pub fn handle_agent_event(&self, event: AgentEvent) {
        match event {
            AgentEvent::SyncCompleted => {
                self.degraded.store(false, Ordering::SeqCst);
            }
            AgentEvent::SyncError(message) => {
                self.degraded.store(true, Ordering::SeqCst);
                tracing::warn!(%message, "background sync reported an error");
                let _ = self.events.send(SyncEvent::SyncFailedWillRetry);
            }
            AgentEvent::CacheUpdated => {
                tracing::debug!("cache updated; no sync effect");
            }
        }
    }

    /// Deliver immediately when online; otherwise, or on failure, queue.
    async fn dispatch(&self, payload: SyncPayload) -> Result<()> {
        if self.is_online() {
            match self.transport.deliver(&payload).await {
                Ok(receipt) => {
                    tracing::debug!(item = %payload.describe(), "delivered immediately");
                    self.settle(&payload, &receipt).await?;
                    return Ok(());
                }
                Err(error) => {
                    tracing::warn!(
                        item = %payload.describe(),
                        %error,
                        "immediate delivery failed; queueing"
                    );
                }
            }
        }
        self.queue.enqueue(&payload).await?;
        Ok(())
    }

    /// Record a successful delivery in the store.
    async fn settle(&self, payload: &SyncPayload, receipt: &DeliveryReceipt) -> Result<()> {
        match payload {
            SyncPayload::Record {
                collection, key, ..
            } => self.store.mark_synced(*collection, key, true).await,
            SyncPayload::Activity(activity) => {
                let found = self
                    .store
                    .apply_ack(activity.client_event_id.as_str(), receipt)
                    .await?;
                if !found {
                    tracing::warn!(
                        event = %activity.client_event_id,
                        "ack arrived for an activity record that no longer exists"
                    );
                }
                Ok(())
            }
        }
    }

    async fn drain_pass(&self) -> Result<DrainReport> {
        let items = self.queue.snapshot().await?;
        let mut report = DrainReport::default();

        for item in items {
            report.attempted += 1;
            match self.transport.deliver(&item.payload).await {
                Ok(receipt) => {
                    // Bookkeeping failures stay isolated: the item may be
                    // redelivered, which the idempotency key absorbs
                    if let Err(error) = self.queue.dequeue(item.id).await {
                        tracing::warn!(id = item.id, %error, "failed to remove delivered item");
                    }
                    if let Err(error) = self.settle(&item.payload, &receipt).await {
                        tracing::warn!(
                            item = %item.payload.describe(),
                            %error,
                            "reconciliation failed after delivery"
                        );
                    }
                    report.delivered += 1;
                }
                Err(error) => {
                    let attempts = item.retry_count + 1;
                    if attempts >= self.options.max_retries {
                        match self.queue.bury(&item, &error.to_string()).await {
                            Ok(_) => report.buried += 1,
                            Err(error) => {
                                tracing::warn!(id = item.id, %error, "failed to bury item");
                            }
                        }
                    } else {
                        tracing::debug!(
                            item = %item.payload.describe(),
                            attempts,
                            %error,
                            "delivery failed; will retry"
                        );
                        match self.queue.requeue(&item).await {
                            Ok(_) => report.requeued += 1,
                            Err(error) => {
                                tracing::warn!(id = item.id, %error, "failed to persist retry state");
                            }
                        }
                    }
                }
            }
        }

        self.degraded.store(
            report.requeued > 0 || report.buried > 0,
            Ordering::SeqCst,
        );
        let _ = self.events.send(SyncEvent::DrainCompleted {
            delivered: report.delivered,
            requeued: report.requeued,
            buried: report.buried,
        });
        if report.requeued > 0 {
            let _ = self.events.send(SyncEvent::SyncFailedWillRetry);
        }
        tracing::info!(
            attempted = report.attempted,
            delivered = report.delivered,
            requeued = report.requeued,
            buried = report.buried,
            "drain pass finished"
        );
        Ok(report)
    }
}
