//! Network and visibility monitoring
//!
//! Translates platform connectivity/foreground callbacks into an explicit
//! signal channel for the coordinator plus a shared is-online flag for
//! degraded-mode UI. Holds no business state.

use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::{mpsc, watch};

/// Platform signals translated for the coordinator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetSignal {
    /// Connectivity came back after being down
    ConnectivityRestored,
    /// Connectivity dropped
    ConnectivityLost,
    /// The app returned to the foreground
    Foregrounded,
}

/// External signal source feeding the sync coordinator.
pub struct ConnectivityMonitor {
    online: watch::Sender<bool>,
    visible: AtomicBool,
    signals: mpsc::UnboundedSender<NetSignal>,
}

impl ConnectivityMonitor {
    /// Create a monitor; returns it together with the is-online flag and
    /// the signal stream the coordinator consumes.
    pub fn new(
        initially_online: bool,
    ) -> (
        Self,
        watch::Receiver<bool>,
        mpsc::UnboundedReceiver<NetSignal>,
    ) {
        let (online, online_rx) = watch::channel(initially_online);
        let (signals, signals_rx) = mpsc::unbounded_channel();
        (
            Self {
                online,
                visible: AtomicBool::new(true),
                signals,
            },
            online_rx,
            signals_rx,
        )
    }

    /// Report platform connectivity.
    ///
    /// Repeated same-state reports emit nothing; a transition updates the
    /// shared flag and emits exactly one signal.
    pub fn set_online(&self, online: bool) {
        let changed = self.online.send_if_modified(|current| {
            if *current == online {
                false
            } else {
                *current = online;
                true
            }
        });
        if !changed {
            return;
        }
        tracing::info!(online, "connectivity changed");
        let signal = if online {
            NetSignal::ConnectivityRestored
        } else {
            NetSignal::ConnectivityLost
        };
        let _ = self.signals.send(signal);
    }

    /// Report app visibility; only the hidden-to-visible edge signals.
    pub fn set_visible(&self, visible: bool) {
        let was_visible = self.visible.swap(visible, Ordering::SeqCst);
        if visible && !was_visible {
            let _ = self.signals.send(NetSignal::Foregrounded);
        }
    }

    /// Current connectivity state.
    pub fn is_online(&self) -> bool {
        *self.online.borrow()
    }

    /// Subscribe to the is-online flag (degraded-mode indicator).
    pub fn online_flag(&self) -> watch::Receiver<bool> {
        self.online.subscribe()
    }
}
