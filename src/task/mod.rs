//! Download tasks
//!
//! A [`DownloadTask`] is a cheap, cloneable handle to one download. Its
//! lifecycle runs on a spawned tokio task and is the only writer of the task's
//! state; the handle reads value snapshots and sends commands
//! ([`start`](DownloadTask::start), [`cancel`](DownloadTask::cancel),
//! [`clean`](DownloadTask::clean)).
//!
//! Transitions are published on a broadcast channel in the order they happen:
//!
//! ```text
//! Status(Analyzing) [AnalysisFailed RetryCountdown* Status(Analyzing)]*
//! Status(Downloading)* Status(Merging) Status(Finished) Finished
//! ```
//!
//! or, instead of the finish, exactly one `Failed` or `Cancelled`.

pub mod backend;
pub mod http;
mod lifecycle;
mod progress;
#[cfg(test)]
pub(crate) mod test_helpers;

pub use backend::{MediaBackend, MediaPlan, MediaStream, TransferProgress};

use crate::config::Config;
use crate::error::{Result, TaskError};
use crate::notify::NotificationChannel;
use crate::types::{Status, TaskEvent, TaskId, TaskInfo, TaskSnapshot};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::{Semaphore, broadcast, watch};
use tokio_util::sync::CancellationToken;

use lifecycle::{LifecycleContext, run_lifecycle, task_dir};
use progress::StatusPublisher;

/// Capacity of a standalone task's event channel
const EVENT_CHANNEL_CAPACITY: usize = 1000;

/// Launch states; a task leaves `NOT_LAUNCHED` exactly once
const NOT_LAUNCHED: u8 = 0;
const LAUNCHED: u8 = 1;
const CANCELLED_BEFORE_LAUNCH: u8 = 2;

/// Handle to one download
///
/// Clones share the same task.
#[derive(Clone)]
pub struct DownloadTask {
    shared: Arc<TaskShared>,
}

struct TaskShared {
    id: TaskId,
    info: TaskInfo,
    config: Arc<Config>,
    backend: Arc<dyn MediaBackend>,
    publisher: StatusPublisher,
    notifications: Option<NotificationChannel>,
    slots: Option<Arc<Semaphore>>,
    cancel_token: CancellationToken,
    /// Written once, by the first `start()` or by cancelling an unstarted task
    launch: AtomicU8,
    handle: Mutex<Option<tokio::task::JoinHandle<()>>>,
}

impl std::fmt::Debug for DownloadTask {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DownloadTask")
            .field("id", &self.shared.id)
            .field("info", &self.shared.info)
            .field("snapshot", &self.status())
            .finish()
    }
}

impl DownloadTask {
    /// Create a standalone task with its own event channel
    ///
    /// Tasks created through [`crate::queue::DownloadQueue::new_task`] share the
    /// queue's channel and download slots instead.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Config`] if the configuration does not validate.
    pub fn new(
        id: TaskId,
        info: TaskInfo,
        config: Arc<Config>,
        backend: Arc<dyn MediaBackend>,
        notifications: Option<NotificationChannel>,
    ) -> Result<Self> {
        config.validate()?;
        let (event_tx, _rx) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Ok(Self::from_parts(
            id,
            info,
            config,
            backend,
            event_tx,
            notifications,
            None,
        ))
    }

    pub(crate) fn from_parts(
        id: TaskId,
        info: TaskInfo,
        config: Arc<Config>,
        backend: Arc<dyn MediaBackend>,
        event_tx: broadcast::Sender<TaskEvent>,
        notifications: Option<NotificationChannel>,
        slots: Option<Arc<Semaphore>>,
    ) -> Self {
        let (snapshot_tx, _rx) = watch::channel(TaskSnapshot::default());
        Self {
            shared: Arc::new(TaskShared {
                id,
                info,
                config,
                backend,
                publisher: StatusPublisher {
                    id,
                    event_tx,
                    snapshot_tx: Arc::new(snapshot_tx),
                },
                notifications,
                slots,
                cancel_token: CancellationToken::new(),
                launch: AtomicU8::new(NOT_LAUNCHED),
                handle: Mutex::new(None),
            }),
        }
    }

    /// Task ID
    pub fn id(&self) -> TaskId {
        self.shared.id
    }

    /// Identity fixed at creation
    pub fn info(&self) -> &TaskInfo {
        &self.shared.info
    }

    /// Start the lifecycle on the current tokio runtime
    ///
    /// # Errors
    ///
    /// - [`TaskError::AlreadyStarted`] on a second call
    /// - [`TaskError::InvalidState`] if the task was cancelled before it started
    pub fn start(&self) -> Result<()> {
        let shared = &self.shared;
        match shared.launch.compare_exchange(
            NOT_LAUNCHED,
            LAUNCHED,
            Ordering::SeqCst,
            Ordering::SeqCst,
        ) {
            Ok(_) => {}
            Err(CANCELLED_BEFORE_LAUNCH) => {
                return Err(TaskError::InvalidState {
                    id: shared.id,
                    operation: "start".to_string(),
                    current: Status::Cancelled,
                }
                .into());
            }
            Err(_) => return Err(TaskError::AlreadyStarted { id: shared.id }.into()),
        }

        tracing::debug!(task_id = shared.id.0, title = %shared.info.title, "Starting download task");

        let ctx = LifecycleContext {
            id: shared.id,
            info: shared.info.clone(),
            config: shared.config.clone(),
            backend: shared.backend.clone(),
            publisher: shared.publisher.clone(),
            cancel_token: shared.cancel_token.clone(),
            notifications: shared.notifications.clone(),
            slots: shared.slots.clone(),
        };
        let handle = tokio::spawn(run_lifecycle(ctx));
        *shared.handle.lock().unwrap_or_else(|e| e.into_inner()) = Some(handle);
        Ok(())
    }

    /// Stop the task
    ///
    /// In-flight work (slot wait, countdown, transfer, merge) is abandoned and
    /// the task ends with a single `Cancelled` event. Cancelling a task that was
    /// never started marks it cancelled immediately. No-op once terminal.
    pub fn cancel(&self) {
        self.shared.cancel_token.cancel();
        self.cancel_unlaunched();
    }

    /// Mark a never-started task cancelled and announce it
    fn cancel_unlaunched(&self) {
        let shared = &self.shared;
        let unlaunched = shared
            .launch
            .compare_exchange(
                NOT_LAUNCHED,
                CANCELLED_BEFORE_LAUNCH,
                Ordering::SeqCst,
                Ordering::SeqCst,
            )
            .is_ok();
        if unlaunched {
            tracing::debug!(task_id = shared.id.0, "Cancelled before start");
            shared.publisher.record(Status::Cancelled, 0.0, 0);
            shared.publisher.emit(TaskEvent::Cancelled { id: shared.id });
        }
    }

    /// Release the task's partial artifacts
    ///
    /// Cancels the lifecycle if it is still running, waits for it to stop, then
    /// deletes the task's scratch directory. Idempotent, and fine to call before
    /// `start()`. The finished output file is never touched.
    pub async fn clean(&self) {
        let shared = &self.shared;
        shared.cancel_token.cancel();
        self.cancel_unlaunched();

        let handle = shared
            .handle
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();
        if let Some(handle) = handle
            && let Err(e) = handle.await
        {
            tracing::warn!(task_id = shared.id.0, error = %e, "Lifecycle task ended abnormally");
        }

        let dir = task_dir(&shared.config, shared.id);
        match tokio::fs::remove_dir_all(&dir).await {
            Ok(()) => {
                tracing::debug!(task_id = shared.id.0, path = %dir.display(), "Removed partial files");
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                tracing::warn!(
                    task_id = shared.id.0,
                    path = %dir.display(),
                    error = %e,
                    "Failed to remove partial files"
                );
            }
        }
    }

    /// Current state as a value copy
    pub fn status(&self) -> TaskSnapshot {
        *self.shared.publisher.snapshot_tx.borrow()
    }

    /// Subscribe to lifecycle events
    ///
    /// Queue tasks share one channel; filter with [`TaskEvent::task_id`].
    pub fn subscribe(&self) -> broadcast::Receiver<TaskEvent> {
        self.shared.publisher.event_tx.subscribe()
    }

    /// Watch the task's snapshot
    pub fn watch(&self) -> watch::Receiver<TaskSnapshot> {
        self.shared.publisher.snapshot_tx.subscribe()
    }

    /// Wait until the task reaches a terminal state and return that snapshot
    pub async fn wait_terminal(&self) -> TaskSnapshot {
        let mut rx = self.watch();
        let waited = rx
            .wait_for(|s| s.status.is_terminal())
            .await
            .map(|snapshot| *snapshot);
        // The sender lives as long as `self`
        waited.unwrap_or_else(|_| *rx.borrow())
    }

    /// Whether the task has left `Pending` for good, by starting or by being cancelled
    pub fn is_started(&self) -> bool {
        self.shared.launch.load(Ordering::SeqCst) != NOT_LAUNCHED
    }

    /// Whether the lifecycle has been started and has not yet ended
    pub fn is_running(&self) -> bool {
        self.is_started() && !self.status().status.is_terminal()
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use std::time::Duration;
    use super::test_helpers::{ScriptedBackend, collect_until_terminal, test_config};

    fn task(config: Arc<Config>, backend: ScriptedBackend) -> DownloadTask {
        DownloadTask::new(
            TaskId(7),
            TaskInfo::new("Clip", 3, "P2", "720P"),
            config,
            Arc::new(backend),
            None,
        )
        .unwrap()
    }

    #[tokio::test]
    async fn start_runs_to_finished() {
        let (config, _temp_dir) = test_config();
        let task = task(config, ScriptedBackend::new());
        let mut events = task.subscribe();

        assert_eq!(task.status().status, Status::Pending);
        assert!(!task.is_running());
        task.start().unwrap();
        assert!(task.is_running());

        let snapshot = task.wait_terminal().await;
        assert_eq!(snapshot.status, Status::Finished);
        assert_eq!(snapshot.percent, 100.0);
        assert!(!task.is_running());

        let events = collect_until_terminal(&mut events).await;
        assert!(events.iter().all(|e| e.task_id() == TaskId(7)));
    }

    #[tokio::test]
    async fn second_start_is_rejected() {
        let (config, _temp_dir) = test_config();
        let task = task(config, ScriptedBackend::new());

        task.start().unwrap();
        let err = task.start().unwrap_err();
        assert!(matches!(
            err,
            Error::Task(TaskError::AlreadyStarted { id: TaskId(7) })
        ));
        task.wait_terminal().await;
    }

    #[tokio::test]
    async fn cancel_before_start_emits_cancelled_once() {
        let (config, _temp_dir) = test_config();
        let task = task(config, ScriptedBackend::new());
        let mut events = task.subscribe();

        task.cancel();
        task.cancel();

        assert_eq!(task.status().status, Status::Cancelled);
        assert_eq!(events.recv().await.unwrap(), TaskEvent::Cancelled { id: TaskId(7) });
        assert!(events.try_recv().is_err());

        let err = task.start().unwrap_err();
        assert!(matches!(
            err,
            Error::Task(TaskError::InvalidState {
                current: Status::Cancelled,
                ..
            })
        ));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn concurrent_cancel_and_start_never_report_already_started() {
        let (config, _temp_dir) = test_config();
        for _ in 0..50 {
            let task = task(
                config.clone(),
                ScriptedBackend::new().with_transfer_delay(Duration::from_secs(30)),
            );
            let canceller = task.clone();
            let cancelling = tokio::spawn(async move { canceller.cancel() });
            let started = task.start();
            cancelling.await.unwrap();

            match started {
                Ok(()) => {}
                Err(Error::Task(TaskError::InvalidState {
                    current: Status::Cancelled,
                    ..
                })) => {}
                other => panic!("unexpected start result: {other:?}"),
            }
            assert_eq!(task.wait_terminal().await.status, Status::Cancelled);
        }
    }

    #[test]
    fn new_rejects_invalid_config() {
        let (config, _temp_dir) = test_config();
        let mut config = (*config).clone();
        config.download.progress_interval = Duration::ZERO;

        let result = DownloadTask::new(
            TaskId(7),
            TaskInfo::new("Clip", 3, "P2", "720P"),
            Arc::new(config),
            Arc::new(ScriptedBackend::new()),
            None,
        );
        assert!(matches!(result, Err(Error::Config { key: Some(key), .. }) if key == "download.progress_interval"));
    }

    #[tokio::test]
    async fn cancel_mid_transfer_stops_with_cancelled() {
        let (config, _temp_dir) = test_config();
        let task = task(
            config,
            ScriptedBackend::new().with_transfer_delay(Duration::from_secs(30)),
        );
        let mut events = task.subscribe();
        task.start().unwrap();

        loop {
            if let TaskEvent::Status {
                status: Status::Downloading,
                ..
            } = events.recv().await.unwrap()
            {
                break;
            }
        }
        task.cancel();

        let snapshot = tokio::time::timeout(Duration::from_secs(2), task.wait_terminal())
            .await
            .unwrap();
        assert_eq!(snapshot.status, Status::Cancelled);
        let rest = collect_until_terminal(&mut events).await;
        assert_eq!(rest.last(), Some(&TaskEvent::Cancelled { id: TaskId(7) }));
        assert!(!rest.iter().any(|e| matches!(e, TaskEvent::Failed { .. })));
    }

    #[tokio::test]
    async fn clean_is_idempotent_and_removes_partials() {
        let (config, _temp_dir) = test_config();
        let task = task(
            config.clone(),
            ScriptedBackend::new().with_transfer_delay(Duration::from_secs(30)),
        );
        let mut events = task.subscribe();
        task.start().unwrap();
        loop {
            if let TaskEvent::Status {
                status: Status::Downloading,
                ..
            } = events.recv().await.unwrap()
            {
                break;
            }
        }
        let dir = task_dir(&config, TaskId(7));
        assert!(dir.exists());

        task.clean().await;
        assert!(!dir.exists());
        assert_eq!(task.status().status, Status::Cancelled);

        task.clean().await;
        assert!(!dir.exists());
    }

    #[tokio::test]
    async fn clean_before_start_is_fine() {
        let (config, _temp_dir) = test_config();
        let task = task(config, ScriptedBackend::new());
        task.clean().await;
        assert_eq!(task.status().status, Status::Cancelled);
        assert!(task.start().is_err());
    }

    #[tokio::test]
    async fn clean_keeps_finished_output() {
        let (config, _temp_dir) = test_config();
        let task = task(config.clone(), ScriptedBackend::new());
        task.start().unwrap();
        assert_eq!(task.wait_terminal().await.status, Status::Finished);

        task.clean().await;
        assert!(config.download.download_dir.join("clip.mp4").exists());
        assert_eq!(task.status().status, Status::Finished);
    }

    #[tokio::test]
    async fn events_survive_dropped_subscribers() {
        let (config, _temp_dir) = test_config();
        let task = task(config, ScriptedBackend::new().failing_analysis(1));
        drop(task.subscribe());

        task.start().unwrap();
        assert_eq!(task.wait_terminal().await.status, Status::Finished);
    }
}
