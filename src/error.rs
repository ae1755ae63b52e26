//! Error types for bili-dl-core
//!
//! Transient failures (address resolution, flaky transfers) are absorbed by the
//! retry machinery in [`crate::retry`] and only surface as status events.
//! Terminal failures become [`crate::types::TaskEvent::Failed`]. Cancellation is
//! modelled as [`Error::Cancelled`] internally but never reported as a failure.

use crate::types::{Status, TaskId};
use thiserror::Error;

/// Result type alias for bili-dl-core operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for bili-dl-core
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "download.temp_dir")
        key: Option<String>,
    },

    /// Resolving the playable media address failed
    #[error("analysis failed: {0}")]
    Analysis(String),

    /// Byte-stream transfer failed
    #[error("transfer failed: {0}")]
    Transfer(String),

    /// Combining the downloaded streams failed
    #[error("merge failed: {0}")]
    Merge(String),

    /// Lifecycle misuse (double start, commands in the wrong state)
    #[error("task error: {0}")]
    Task(#[from] TaskError),

    /// Task not known to the queue
    #[error("task {0} not found")]
    NotFound(TaskId),

    /// The operation was cancelled by its owner
    #[error("operation cancelled")]
    Cancelled,

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Network error
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Other error
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Shorthand for a configuration error tied to a specific key
    pub(crate) fn config(key: &str, message: impl Into<String>) -> Self {
        Error::Config {
            message: message.into(),
            key: Some(key.to_string()),
        }
    }

    /// Whether this error only signals cancellation
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Error::Cancelled)
    }
}

/// Download task lifecycle errors
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TaskError {
    /// `start()` was called on a task whose lifecycle is already running or done
    #[error("task {id} has already been started")]
    AlreadyStarted {
        /// The task that rejected the second start
        id: TaskId,
    },

    /// Cannot perform operation in current state
    #[error("cannot {operation} task {id} in state {current}")]
    InvalidState {
        /// The task that is in an invalid state for the operation
        id: TaskId,
        /// The operation that was attempted (e.g., "start")
        operation: String,
        /// The state that prevents the operation
        current: Status,
    },
}
