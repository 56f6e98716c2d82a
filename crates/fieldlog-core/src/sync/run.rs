//! Signal loop wiring the monitor to the coordinator

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::time::Instant;

use crate::monitor::NetSignal;

use super::{DrainOutcome, SyncCoordinator};

/// Consume monitor signals and drive drains, with back-off between
/// failed passes.
///
/// After a pass that left requeued items behind, one delayed re-drain is
/// scheduled on the configured ladder; a clean pass resets the ladder.
/// The loop is bounded because exhausted items are dead-lettered after
/// the per-item retry cap. Runs until the signal channel closes.
pub async fn run_signal_loop(
    coordinator: Arc<SyncCoordinator>,
    mut signals: mpsc::UnboundedReceiver<NetSignal>,
) {
    let mut failed_passes: usize = 0;
    let mut retry_at: Option<Instant> = None;

    loop {
        let signal = match retry_at {
            Some(deadline) => tokio::select! {
                signal = signals.recv() => match signal {
                    Some(signal) => Some(signal),
                    None => break,
                },
                () = tokio::time::sleep_until(deadline) => None,
            },
            None => match signals.recv().await {
                Some(signal) => Some(signal),
                None => break,
            },
        };

        let outcome = match signal {
            Some(signal) => coordinator.handle_signal(signal).await,
            None => {
                // Back-off timer fired
                retry_at = None;
                coordinator.try_drain().await
            }
        };

        match outcome {
            Ok(DrainOutcome::Completed(report)) if report.requeued > 0 => {
                let delay = coordinator.options().retry_delay(failed_passes);
                tracing::debug!(delay_secs = delay.as_secs(), "scheduling delayed re-drain");
                failed_passes += 1;
                retry_at = Some(Instant::now() + delay);
            }
            Ok(DrainOutcome::Completed(_)) => {
                failed_passes = 0;
                retry_at = None;
            }
            Ok(DrainOutcome::AlreadyRunning | DrainOutcome::Offline) => {}
            Err(error) => {
                tracing::warn!(%error, "drain pass failed");
            }
        }
    }
}
