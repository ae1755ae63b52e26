//! The lifecycle driver: Analyzing, Downloading, Merging, then one terminal event.

use crate::config::Config;
use crate::error::Error;
use crate::notify::NotificationChannel;
use crate::retry::{CountdownRetrier, RetryObserver, RetryOutcome, RetryState, retry_with_backoff};
use crate::types::{NotificationRequest, Status, TaskEvent, TaskId, TaskInfo};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;

use super::backend::{MediaBackend, TransferProgress};
use super::progress::{ProgressReporterParams, StatusPublisher, spawn_progress_reporter};

/// Everything one lifecycle run needs, moved into the spawned task
pub(crate) struct LifecycleContext {
    pub id: TaskId,
    pub info: TaskInfo,
    pub config: Arc<Config>,
    pub backend: Arc<dyn MediaBackend>,
    pub publisher: StatusPublisher,
    pub cancel_token: CancellationToken,
    pub notifications: Option<NotificationChannel>,
    /// Shared download slots; `None` runs without a concurrency limit
    pub slots: Option<Arc<Semaphore>>,
}

/// How a run ended
#[derive(Debug)]
enum Ending {
    Finished(PathBuf),
    Failed { stage: Status, error: Error },
    Cancelled,
}

/// Scratch directory holding one task's partial streams
pub(crate) fn task_dir(config: &Config, id: TaskId) -> PathBuf {
    config.download.temp_dir.join(format!("task_{}", id))
}

/// Drive a task to exactly one terminal event
pub(crate) async fn run_lifecycle(ctx: LifecycleContext) {
    let ending = drive(&ctx).await;
    let publisher = &ctx.publisher;

    match ending {
        Ending::Finished(path) => {
            publisher.publish(Status::Finished, 100.0, 0);
            publisher.emit(TaskEvent::Finished {
                id: ctx.id,
                path: path.clone(),
            });
            tracing::info!(task_id = ctx.id.0, path = %path.display(), "Download finished");

            if ctx.config.notifications.enabled
                && let Some(notifications) = &ctx.notifications
            {
                notifications.notify(NotificationRequest::finished(
                    &ctx.config.notifications.title,
                    &ctx.info,
                    path,
                ));
            }
        }
        Ending::Failed { stage, error } => {
            tracing::error!(task_id = ctx.id.0, stage = %stage, error = %error, "Download failed");
            publisher.record(Status::Failed, publisher.last_percent(), 0);
            publisher.emit(TaskEvent::Failed {
                id: ctx.id,
                stage,
                error: error.to_string(),
            });
        }
        Ending::Cancelled => {
            tracing::debug!(task_id = ctx.id.0, "Download cancelled");
            publisher.record(Status::Cancelled, publisher.last_percent(), 0);
            publisher.emit(TaskEvent::Cancelled { id: ctx.id });
        }
    }
}

async fn drive(ctx: &LifecycleContext) -> Ending {
    // Held until the run ends; dropping it frees the slot for the next task
    let _permit = match &ctx.slots {
        Some(slots) => {
            let acquired = tokio::select! {
                biased;
                _ = ctx.cancel_token.cancelled() => return Ending::Cancelled,
                permit = slots.clone().acquire_owned() => permit,
            };
            match acquired {
                Ok(permit) => Some(permit),
                // Closed semaphore: the queue is shutting down
                Err(_) => return Ending::Cancelled,
            }
        }
        None => None,
    };

    let plan = {
        tracing::debug!(task_id = ctx.id.0, "Resolving download address");
        ctx.publisher.publish(Status::Analyzing, 0.0, 0);

        let retrier = CountdownRetrier::from_config(&ctx.config.retry);
        let mut observer = AnalysisObserver {
            publisher: &ctx.publisher,
        };
        let backend = &ctx.backend;
        let info = &ctx.info;
        match retrier
            .run(&ctx.cancel_token, &mut observer, || backend.analyze(info))
            .await
        {
            RetryOutcome::Succeeded(plan) => plan,
            RetryOutcome::Cancelled => return Ending::Cancelled,
        }
    };

    let dir = task_dir(&ctx.config, ctx.id);
    if let Err(e) = tokio::fs::create_dir_all(&dir).await {
        return Ending::Failed {
            stage: Status::Downloading,
            error: e.into(),
        };
    }

    tracing::debug!(task_id = ctx.id.0, streams = plan.streams.len(), "Transferring streams");
    ctx.publisher.publish(Status::Downloading, 0.0, 0);

    let progress = TransferProgress::new(plan.total_bytes().unwrap_or(0));
    let reporter_token = ctx.cancel_token.child_token();
    let reporter = spawn_progress_reporter(ProgressReporterParams {
        publisher: ctx.publisher.clone(),
        progress: progress.clone(),
        interval: ctx.config.download.progress_interval,
        smoothing: ctx.config.download.rate_smoothing,
        cancel_token: reporter_token.clone(),
    });

    let transferred = retry_with_backoff(&ctx.config.retry.transfer, &ctx.cancel_token, || {
        // Each attempt counts from zero; resuming backends overwrite this
        progress.set_transferred(0);
        ctx.backend.transfer(&plan, &dir, &progress)
    })
    .await;

    // Join the reporter so no Downloading update can follow Merging
    reporter_token.cancel();
    if let Err(e) = reporter.await {
        tracing::warn!(task_id = ctx.id.0, error = %e, "Progress reporter ended abnormally");
    }

    let parts = match transferred {
        Ok(parts) => parts,
        Err(e) if e.is_cancelled() => return Ending::Cancelled,
        Err(e) => {
            return Ending::Failed {
                stage: Status::Downloading,
                error: e,
            };
        }
    };
    if ctx.cancel_token.is_cancelled() {
        return Ending::Cancelled;
    }

    tracing::debug!(task_id = ctx.id.0, parts = parts.len(), "Merging streams");
    ctx.publisher.publish(Status::Merging, 100.0, 0);

    let file_name = match plan.safe_file_name() {
        Ok(name) => name,
        Err(error) => {
            return Ending::Failed {
                stage: Status::Merging,
                error,
            };
        }
    };
    let merged = dir.join(&file_name);

    let merge = tokio::select! {
        biased;
        _ = ctx.cancel_token.cancelled() => return Ending::Cancelled,
        result = ctx.backend.merge(&parts, &merged) => result,
    };
    if let Err(error) = merge {
        return Ending::Failed {
            stage: Status::Merging,
            error,
        };
    }
    if ctx.cancel_token.is_cancelled() {
        return Ending::Cancelled;
    }

    match move_into(&merged, &ctx.config.download.download_dir, &file_name).await {
        Ok(path) => Ending::Finished(path),
        Err(error) => Ending::Failed {
            stage: Status::Merging,
            error,
        },
    }
}

/// Move the merged file into the download directory
///
/// Falls back to copy and delete when the directories are on different
/// filesystems.
async fn move_into(merged: &Path, download_dir: &Path, file_name: &str) -> crate::Result<PathBuf> {
    tokio::fs::create_dir_all(download_dir).await?;
    let dest = download_dir.join(file_name);

    if let Err(e) = tokio::fs::rename(merged, &dest).await {
        tracing::debug!(error = %e, "Rename failed, copying instead");
        tokio::fs::copy(merged, &dest).await?;
        tokio::fs::remove_file(merged).await?;
    }
    Ok(dest)
}

/// Turns countdown retry callbacks into task events
struct AnalysisObserver<'a> {
    publisher: &'a StatusPublisher,
}

impl RetryObserver<Error> for AnalysisObserver<'_> {
    fn on_failure(&mut self, state: &RetryState, error: &Error) {
        self.publisher.record_countdown(state.remaining_secs);
        self.publisher.emit(TaskEvent::AnalysisFailed {
            id: self.publisher.id,
            attempt: state.attempt,
            error: error.to_string(),
        });
    }

    fn on_tick(&mut self, state: &RetryState) {
        self.publisher.record_countdown(state.remaining_secs);
        self.publisher.emit(TaskEvent::RetryCountdown {
            id: self.publisher.id,
            attempt: state.attempt,
            remaining_secs: state.remaining_secs,
        });
    }

    fn on_attempt_start(&mut self, _state: &RetryState) {
        self.publisher.publish(Status::Analyzing, 0.0, 0);
    }
}
