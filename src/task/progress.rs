//! Status publication and the periodic progress reporter.

use crate::rate::{MIN_SAMPLE_INTERVAL, RateTracker};
use crate::types::{Status, TaskEvent, TaskId, TaskSnapshot};
use std::sync::Arc;
use std::time::{Duration, Instant};

use super::TransferProgress;

/// Writes a task's snapshot and emits its status events
///
/// Only the lifecycle (and the reporter it spawns and joins) hold one of these,
/// so the snapshot has a single writer.
#[derive(Clone)]
pub(crate) struct StatusPublisher {
    pub(crate) id: TaskId,
    pub(crate) event_tx: tokio::sync::broadcast::Sender<TaskEvent>,
    pub(crate) snapshot_tx: Arc<tokio::sync::watch::Sender<TaskSnapshot>>,
}

impl StatusPublisher {
    /// Update the snapshot and emit a `Status` event
    pub(crate) fn publish(&self, status: Status, percent: f32, speed_bps: u64) {
        self.record(status, percent, speed_bps);
        self.emit(TaskEvent::Status {
            id: self.id,
            percent,
            speed_bps,
            status,
        });
    }

    /// Update the snapshot without emitting a status event
    pub(crate) fn record(&self, status: Status, percent: f32, speed_bps: u64) {
        self.snapshot_tx.send_replace(TaskSnapshot {
            status,
            percent,
            speed_bps,
            retry_in_secs: None,
        });
    }

    /// Record the address-resolution countdown in the snapshot
    pub(crate) fn record_countdown(&self, remaining_secs: u32) {
        self.snapshot_tx.send_modify(|snapshot| {
            snapshot.retry_in_secs = Some(remaining_secs);
        });
    }

    /// Emit an event to all subscribers
    ///
    /// send() returns Err if there are no receivers, which is fine - subscribers
    /// that went away simply miss the event.
    pub(crate) fn emit(&self, event: TaskEvent) {
        self.event_tx.send(event).ok();
    }

    /// Percentage from the last snapshot
    pub(crate) fn last_percent(&self) -> f32 {
        self.snapshot_tx.borrow().percent
    }
}

/// Parameters for spawning a progress reporter background task
pub(crate) struct ProgressReporterParams {
    /// Where updates go
    pub publisher: StatusPublisher,
    /// Counters the transfer reports into
    pub progress: TransferProgress,
    /// Interval between updates
    pub interval: Duration,
    /// Weight of the newest throughput sample
    pub smoothing: f64,
    /// Stops the reporter; the lifecycle joins it before moving on
    pub cancel_token: tokio_util::sync::CancellationToken,
}

/// Spawn a background task that periodically reports download progress.
pub(crate) fn spawn_progress_reporter(
    params: ProgressReporterParams,
) -> tokio::task::JoinHandle<()> {
    let ProgressReporterParams {
        publisher,
        progress,
        interval,
        smoothing,
        cancel_token,
    } = params;
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        let mut tracker = RateTracker::new(smoothing);
        let mut last_bytes = progress.transferred();
        let mut last_at = Instant::now();

        loop {
            tokio::select! {
                biased;
                _ = cancel_token.cancelled() => {
                    break;
                }
                _ = ticker.tick() => {
                    let current = progress.transferred();
                    let elapsed = last_at.elapsed();
                    let speed_bps = if elapsed >= MIN_SAMPLE_INTERVAL {
                        let delta = current.saturating_sub(last_bytes);
                        last_bytes = current;
                        last_at = Instant::now();
                        tracker.sample(delta, elapsed)
                    } else {
                        tracker.current_bps()
                    };

                    publisher.publish(Status::Downloading, progress.percent(), speed_bps);
                }
            }
        }
    })
}
