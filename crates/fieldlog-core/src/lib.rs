//! fieldlog-core - Core library for Fieldlog
//!
//! Offline-first persistence and synchronization for farm-management
//! clients: a collection-organized local record store, a durable sync
//! queue, and a coordinator that drains the queue on connectivity and
//! visibility signals. UI layers stay thin and call only the public
//! operations here.
//!
//! Composition is explicit; there are no globals. A typical client wires
//! the parts up like this:
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use fieldlog_core::{
//!     run_signal_loop, ApiConfig, ConnectivityMonitor, HttpTransport, LocalStore,
//!     SyncCoordinator, SyncOptions, SyncQueue,
//! };
//!
//! # async fn wire() -> fieldlog_core::Result<()> {
//! let store = LocalStore::open_path("fieldlog.db").await?;
//! store.ready().await?;
//!
//! let queue = SyncQueue::new(store.database());
//! let transport = Arc::new(HttpTransport::new(&ApiConfig::new("https://api.example.com"))?);
//! let (monitor, online, signals) = ConnectivityMonitor::new(true);
//!
//! let coordinator = Arc::new(SyncCoordinator::new(
//!     store,
//!     queue,
//!     transport,
//!     online,
//!     SyncOptions::default(),
//! ));
//! tokio::spawn(run_signal_loop(Arc::clone(&coordinator), signals));
//!
//! // Platform callbacks feed the monitor:
//! monitor.set_online(false);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod monitor;
pub mod normalize;
pub mod services;
pub mod state;
pub mod sync;
pub mod util;

pub use config::{ApiConfig, SyncOptions};
pub use error::{Error, Result};
pub use models::{
    ActivityDraft, ActivityRecord, ClientEventId, Collection, DeadLetter, DeliveryReceipt, GpsFix,
    PhotoMeta, QueueItem, StoredRecord, SyncPayload,
};
pub use monitor::{ConnectivityMonitor, NetSignal};
pub use services::{LocalStore, SyncQueue};
pub use state::SyncState;
pub use sync::{
    run_signal_loop, AgentEvent, DrainOutcome, DrainReport, HttpTransport, SyncCoordinator,
    SyncEvent, SyncTransport,
};
