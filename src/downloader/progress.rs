//! Background progress reporting for a running transfer.

use crate::types::Event;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Interval between progress update emissions
pub(crate) const PROGRESS_UPDATE_INTERVAL: Duration = Duration::from_millis(500);

/// Parameters for spawning a progress reporter background task
pub(crate) struct ProgressReporterParams {
    /// Total size in bytes
    pub total_bytes: u64,
    /// Transfer start time
    pub started: std::time::Instant,
    /// Atomic counter for bytes written so far
    pub downloaded_bytes: Arc<AtomicU64>,
    /// Event broadcast sender
    pub event_tx: tokio::sync::broadcast::Sender<Event>,
    /// Stops the reporter
    pub cancel_token: tokio_util::sync::CancellationToken,
}

/// Compute percent complete and average speed.
pub(crate) fn progress_snapshot(
    current_bytes: u64,
    total_bytes: u64,
    elapsed: Duration,
) -> (f32, u64) {
    let percent = if total_bytes > 0 {
        (current_bytes as f32 / total_bytes as f32) * 100.0
    } else {
        100.0
    };

    let elapsed_secs = elapsed.as_secs_f64();
    let speed_bps = if elapsed_secs > 0.0 {
        (current_bytes as f64 / elapsed_secs) as u64
    } else {
        0
    };

    (percent, speed_bps)
}

/// Spawn a background task that periodically reports transfer progress.
pub(crate) fn spawn_progress_reporter(
    params: ProgressReporterParams,
) -> tokio::task::JoinHandle<()> {
    let ProgressReporterParams {
        total_bytes,
        started,
        downloaded_bytes,
        event_tx,
        cancel_token,
    } = params;
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(PROGRESS_UPDATE_INTERVAL);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    let current_bytes = downloaded_bytes.load(Ordering::Relaxed);
                    let (percent, speed_bps) =
                        progress_snapshot(current_bytes, total_bytes, started.elapsed());

                    tracing::trace!(percent, speed_bps, current_bytes, "transfer progress");
                    event_tx
                        .send(Event::Downloading {
                            percent,
                            speed_bps,
                            bytes_downloaded: current_bytes,
                            total_bytes,
                        })
                        .ok();
                }
                _ = cancel_token.cancelled() => {
                    break;
                }
            }
        }
    })
}
