//! Shared sync state surfaced to client UIs.

/// Aggregate sync state consumed by banner/indicator widgets.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SyncState {
    /// No connectivity; writes are captured locally only.
    Offline,
    /// A drain pass is currently delivering queued items.
    Syncing,
    /// Online with no pending failures.
    Synced,
    /// The last drain pass left undelivered items behind.
    Error,
}

impl SyncState {
    /// Whether the client should surface a degraded-mode banner.
    pub const fn is_degraded(self) -> bool {
        matches!(self, Self::Offline | Self::Error)
    }
}
