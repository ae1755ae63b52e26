//! Download queue: creates, starts and removes tasks under one concurrency limit.

use crate::config::Config;
use crate::error::{Error, Result};
use crate::notify::NotificationChannel;
use crate::task::{DownloadTask, MediaBackend};
use crate::types::{TaskEvent, TaskId, TaskInfo, TaskSnapshot};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::{Mutex, Semaphore, broadcast};

/// Capacity of the queue's shared event channel
const EVENT_CHANNEL_CAPACITY: usize = 1000;

/// Owner of every download task in the application
///
/// All tasks publish on one broadcast channel and share
/// `max_concurrent_downloads` slots; a started task waits in `Pending` until a
/// slot frees up. Cheap to clone.
///
/// # Examples
///
/// ```no_run
/// # use bili_dl_core::*;
/// # use std::sync::Arc;
/// # async fn example(backend: Arc<dyn MediaBackend>) -> Result<()> {
/// let queue = DownloadQueue::new(Config::default(), backend)?;
/// let mut events = queue.subscribe();
///
/// let task = queue.new_task("Big Buck Bunny", 1, "P1", "1080P").await;
/// queue.start(task.id()).await?;
///
/// while let Ok(event) = events.recv().await {
///     if event.is_terminal() {
///         break;
///     }
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct DownloadQueue {
    config: Arc<Config>,
    backend: Arc<dyn MediaBackend>,
    notifications: Option<NotificationChannel>,
    event_tx: broadcast::Sender<TaskEvent>,
    slots: Arc<Semaphore>,
    tasks: Arc<Mutex<BTreeMap<TaskId, DownloadTask>>>,
    next_id: Arc<AtomicU64>,
}

impl DownloadQueue {
    /// Create a queue; notifications follow `config.notifications`
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the configuration does not validate.
    pub fn new(config: Config, backend: Arc<dyn MediaBackend>) -> Result<Self> {
        let notifications = config
            .notifications
            .enabled
            .then(|| NotificationChannel::from_config(&config.notifications));
        Self::with_notifications(config, backend, notifications)
    }

    /// Create a queue with an explicit notification channel (e.g. one with a toast)
    pub fn with_notifications(
        config: Config,
        backend: Arc<dyn MediaBackend>,
        notifications: Option<NotificationChannel>,
    ) -> Result<Self> {
        config.validate()?;
        let (event_tx, _rx) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let slots = Arc::new(Semaphore::new(config.download.max_concurrent_downloads));

        Ok(Self {
            config: Arc::new(config),
            backend,
            notifications,
            event_tx,
            slots,
            tasks: Arc::new(Mutex::new(BTreeMap::new())),
            next_id: Arc::new(AtomicU64::new(1)),
        })
    }

    /// Create a task in `Pending`; it does nothing until started
    pub async fn new_task(
        &self,
        title: impl Into<String>,
        index: u32,
        part: impl Into<String>,
        description: impl Into<String>,
    ) -> DownloadTask {
        let id = TaskId(self.next_id.fetch_add(1, Ordering::SeqCst));
        let info = TaskInfo::new(title, index, part, description);
        tracing::debug!(task_id = id.0, title = %info.title, "Task created");

        let task = DownloadTask::from_parts(
            id,
            info,
            self.config.clone(),
            self.backend.clone(),
            self.event_tx.clone(),
            self.notifications.clone(),
            Some(self.slots.clone()),
        );
        self.tasks.lock().await.insert(id, task.clone());
        task
    }

    /// Start a task
    ///
    /// # Errors
    ///
    /// [`Error::NotFound`] for unknown IDs, otherwise whatever
    /// [`DownloadTask::start`] returns.
    pub async fn start(&self, id: TaskId) -> Result<()> {
        let task = self.get(id).await.ok_or(Error::NotFound(id))?;
        task.start()
    }

    /// Start every task that has not been started yet; returns how many started
    pub async fn start_all(&self) -> usize {
        let tasks: Vec<DownloadTask> = self.tasks.lock().await.values().cloned().collect();
        tasks
            .iter()
            .filter(|task| !task.is_started())
            .filter(|task| task.start().is_ok())
            .count()
    }

    /// Remove a task: cancel it, delete its partial files, forget it
    ///
    /// Emits `Removed` after the task's own terminal event.
    pub async fn remove(&self, id: TaskId) -> Result<()> {
        let task = self
            .tasks
            .lock()
            .await
            .remove(&id)
            .ok_or(Error::NotFound(id))?;

        task.clean().await;
        self.event_tx.send(TaskEvent::Removed { id }).ok();
        tracing::info!(task_id = id.0, "Task removed");
        Ok(())
    }

    /// Handle of a task
    pub async fn get(&self, id: TaskId) -> Option<DownloadTask> {
        self.tasks.lock().await.get(&id).cloned()
    }

    /// Snapshot of every task, in creation order
    pub async fn snapshots(&self) -> Vec<(TaskId, TaskSnapshot)> {
        self.tasks
            .lock()
            .await
            .iter()
            .map(|(id, task)| (*id, task.status()))
            .collect()
    }

    /// Number of tasks in the queue
    pub async fn len(&self) -> usize {
        self.tasks.lock().await.len()
    }

    /// Whether the queue has no tasks
    pub async fn is_empty(&self) -> bool {
        self.tasks.lock().await.is_empty()
    }

    /// Whether the task's lifecycle is running; `false` for unknown IDs
    pub async fn is_running(&self, id: TaskId) -> bool {
        self.get(id).await.is_some_and(|task| task.is_running())
    }

    /// Subscribe to events of every task in the queue
    pub fn subscribe(&self) -> broadcast::Receiver<TaskEvent> {
        self.event_tx.subscribe()
    }

    /// Configuration the queue was built with
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Cancel every task, wait for them to stop and tear down notifications
    ///
    /// Partial files are kept; finished files are untouched.
    pub async fn shutdown(&self) {
        tracing::info!("Shutting down download queue");
        self.slots.close();

        let tasks: Vec<DownloadTask> = self.tasks.lock().await.values().cloned().collect();
        for task in &tasks {
            task.cancel();
        }
        futures::future::join_all(tasks.iter().map(|task| task.wait_terminal())).await;

        if let Some(notifications) = &self.notifications {
            notifications.shutdown();
        }
        tracing::info!(tasks = tasks.len(), "Download queue shut down");
    }
}
