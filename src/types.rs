//! Core types for bili-dl-core

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Unique identifier for a download task
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(pub u64);

impl TaskId {
    /// Get the inner u64 value
    pub fn get(&self) -> u64 {
        self.0
    }
}

impl From<u64> for TaskId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

impl std::fmt::Display for TaskId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Download task status
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    /// Created, waiting to be started or for a free download slot
    Pending,
    /// Resolving the playable media address
    Analyzing,
    /// Transferring the media streams
    Downloading,
    /// Combining the transferred streams into the output file
    Merging,
    /// Output file is complete
    Finished,
    /// Transfer or merge failed permanently
    Failed,
    /// Stopped by the owner before completion
    Cancelled,
}

impl Status {
    /// Terminal states never transition again
    pub fn is_terminal(&self) -> bool {
        matches!(self, Status::Finished | Status::Failed | Status::Cancelled)
    }

    /// Lowercase name used in logs and error messages
    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Pending => "pending",
            Status::Analyzing => "analyzing",
            Status::Downloading => "downloading",
            Status::Merging => "merging",
            Status::Finished => "finished",
            Status::Failed => "failed",
            Status::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identity of a download task, fixed at creation
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskInfo {
    /// Title of the media
    pub title: String,
    /// Sequence index within the source (episode number, etc.)
    pub index: u32,
    /// Part name or number within the index
    pub part: String,
    /// Quality or description label (e.g. "1080P")
    pub description: String,
}

impl TaskInfo {
    /// Create a new task identity
    pub fn new(
        title: impl Into<String>,
        index: u32,
        part: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            title: title.into(),
            index,
            part: part.into(),
            description: description.into(),
        }
    }

    /// "index-part" label shown under the title
    pub fn subtitle(&self) -> String {
        format!("{}-{}", self.index, self.part)
    }
}

/// Point-in-time copy of a task's mutable state
///
/// Snapshots are values: holding one never borrows the live task.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct TaskSnapshot {
    /// Current status
    pub status: Status,
    /// Progress percentage (0.0 to 100.0)
    pub percent: f32,
    /// Current throughput in bytes per second
    pub speed_bps: u64,
    /// Seconds until address resolution is retried; set only while counting down
    #[serde(default)]
    pub retry_in_secs: Option<u32>,
}

impl Default for TaskSnapshot {
    fn default() -> Self {
        Self {
            status: Status::Pending,
            percent: 0.0,
            speed_bps: 0,
            retry_in_secs: None,
        }
    }
}

/// Event emitted during a download task lifecycle
///
/// Events for one task are sent in the order its transitions occur.
/// `Finished`, `Failed` and `Cancelled` are terminal and sent at most once.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TaskEvent {
    /// Status and progress update
    Status {
        /// Task ID
        id: TaskId,
        /// Progress percentage (0.0 to 100.0)
        percent: f32,
        /// Current speed in bytes per second
        speed_bps: u64,
        /// Status at the time of the update
        status: Status,
    },

    /// Address resolution failed; a retry countdown follows
    AnalysisFailed {
        /// Task ID
        id: TaskId,
        /// Attempt that failed (1-based)
        attempt: u32,
        /// Error message
        error: String,
    },

    /// One second of the retry countdown elapsed
    RetryCountdown {
        /// Task ID
        id: TaskId,
        /// Attempt that failed (1-based)
        attempt: u32,
        /// Seconds left before the next attempt
        remaining_secs: u32,
    },

    /// Output file is complete
    Finished {
        /// Task ID
        id: TaskId,
        /// Final output path
        path: PathBuf,
    },

    /// Task failed at some stage
    Failed {
        /// Task ID
        id: TaskId,
        /// Stage where failure occurred
        stage: Status,
        /// Error message
        error: String,
    },

    /// Task stopped by its owner
    Cancelled {
        /// Task ID
        id: TaskId,
    },

    /// Task removed from the queue and cleaned up
    Removed {
        /// Task ID
        id: TaskId,
    },
}

impl TaskEvent {
    /// ID of the task this event belongs to
    pub fn task_id(&self) -> TaskId {
        match self {
            TaskEvent::Status { id, .. }
            | TaskEvent::AnalysisFailed { id, .. }
            | TaskEvent::RetryCountdown { id, .. }
            | TaskEvent::Finished { id, .. }
            | TaskEvent::Failed { id, .. }
            | TaskEvent::Cancelled { id }
            | TaskEvent::Removed { id } => *id,
        }
    }

    /// Whether no further lifecycle events follow this one
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TaskEvent::Finished { .. } | TaskEvent::Failed { .. } | TaskEvent::Cancelled { .. }
        )
    }
}

/// Request handed to the notification collaborator when a task finishes
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationRequest {
    /// Headline
    pub title: String,
    /// Task details: title, "index-part" and quality label
    pub subtitle: String,
    /// Final output path
    pub output_path: PathBuf,
}

impl NotificationRequest {
    /// Build the request for a finished task
    pub fn finished(headline: &str, info: &TaskInfo, output_path: PathBuf) -> Self {
        Self {
            title: headline.to_string(),
            subtitle: format!(
                "{}\n{}    {}",
                info.title,
                info.subtitle(),
                info.description
            ),
            output_path,
        }
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_statuses() {
        assert!(Status::Finished.is_terminal());
        assert!(Status::Failed.is_terminal());
        assert!(Status::Cancelled.is_terminal());
        assert!(!Status::Analyzing.is_terminal());
        assert!(!Status::Pending.is_terminal());
    }

    #[test]
    fn event_serializes_with_type_tag() {
        let event = TaskEvent::Status {
            id: TaskId(4),
            percent: 12.5,
            speed_bps: 2048,
            status: Status::Downloading,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "status");
        assert_eq!(json["id"], 4);
        assert_eq!(json["status"], "downloading");
    }

    #[test]
    fn notification_subtitle_lists_index_part_and_quality() {
        let info = TaskInfo::new("Big Buck Bunny", 2, "P1", "1080P");
        let request =
            NotificationRequest::finished("Download finished", &info, PathBuf::from("/tmp/a.mp4"));
        assert_eq!(request.subtitle, "Big Buck Bunny\n2-P1    1080P");
        assert_eq!(request.title, "Download finished");
    }

    #[test]
    fn task_id_of_every_event() {
        let id = TaskId(9);
        let events = [
            TaskEvent::AnalysisFailed {
                id,
                attempt: 1,
                error: "x".into(),
            },
            TaskEvent::Cancelled { id },
            TaskEvent::Removed { id },
        ];
        assert!(events.iter().all(|e| e.task_id() == id));
        assert!(events[1].is_terminal());
        assert!(!events[2].is_terminal());
    }
}
