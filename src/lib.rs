//! # bili-dl-core
//!
//! Engine of the bili-dl desktop client: download task lifecycles with
//! countdown retry, and debounced search suggestions.
//!
//! ## Design Philosophy
//!
//! bili-dl-core is designed to be:
//! - **Headless** - No rendering; the presentation layer consumes events
//! - **Event-driven** - Every task transition is a typed [`TaskEvent`] on a channel
//! - **Cancellable** - Waits, countdowns and I/O stop promptly when their owner says so
//! - **Pluggable** - Media work, suggestion lookups and notifications sit behind traits
//!
//! ## Quick Start
//!
//! ```no_run
//! use bili_dl_core::{Config, DownloadQueue, MediaBackend, status_text};
//! use std::sync::Arc;
//!
//! # async fn example(backend: Arc<dyn MediaBackend>) -> Result<(), Box<dyn std::error::Error>> {
//! let queue = DownloadQueue::new(Config::default(), backend)?;
//!
//! // Subscribe to events
//! let mut events = queue.subscribe();
//! tokio::spawn(async move {
//!     while let Ok(event) = events.recv().await {
//!         if let Some(line) = status_text::status_line(&event) {
//!             println!("task {}: {}", event.task_id(), line);
//!         }
//!     }
//! });
//!
//! let task = queue.new_task("Big Buck Bunny", 1, "P1", "1080P").await;
//! queue.start(task.id()).await?;
//! # Ok(())
//! # }
//! ```
//!
//! Suggestions:
//!
//! ```no_run
//! use bili_dl_core::{Config, suggest};
//!
//! # async fn example() -> bili_dl_core::Result<()> {
//! let (fetcher, mut batches) = suggest::http_fetcher(&Config::default().suggest)?;
//! fetcher.submit("b");
//! fetcher.submit("bu");
//! fetcher.submit("bunny");
//!
//! // Only the last query is answered
//! if let Some(batch) = batches.recv().await {
//!     assert_eq!(batch.query.text, "bunny");
//! }
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Configuration types
pub mod config;
/// Error types
pub mod error;
/// Finished-task notifications
pub mod notify;
/// Download queue manager
pub mod queue;
/// Throughput estimation and formatting
pub mod rate;
/// Countdown retry and exponential backoff
pub mod retry;
/// Human-facing status lines
pub mod status_text;
/// Search suggestions
pub mod suggest;
/// Download task handle and lifecycle
pub mod task;
/// Core types and events
pub mod types;

// Re-export commonly used types
pub use config::{
    BackoffConfig, Config, DownloadConfig, NotificationConfig, RetryConfig, SuggestConfig,
    WebhookConfig,
};
pub use error::{Error, Result, TaskError};
pub use notify::{LogNotifier, NotificationChannel, Notifier, WebhookNotifier};
pub use queue::DownloadQueue;
pub use rate::{RateTracker, format_bps};
pub use retry::{CountdownRetrier, IsRetryable, RetryObserver, RetryOutcome, RetryState};
pub use suggest::{
    DebouncedFetcher, HttpSuggestClient, SuggestClient, Suggestion, SuggestionBatch,
    SuggestionKind, SuggestionQuery,
};
pub use task::{DownloadTask, MediaBackend, MediaPlan, MediaStream, TransferProgress};
pub use types::{NotificationRequest, Status, TaskEvent, TaskId, TaskInfo, TaskSnapshot};
