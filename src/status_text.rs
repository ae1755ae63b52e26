//! Status lines shown under each queue item.

use crate::rate::format_bps;
use crate::types::{Status, TaskEvent, TaskSnapshot};

/// Line for one event; `None` for events that do not change the line
pub fn status_line(event: &TaskEvent) -> Option<String> {
    match event {
        TaskEvent::Status {
            percent,
            speed_bps,
            status,
            ..
        } => Some(line_for(*status, *percent, *speed_bps)),
        TaskEvent::AnalysisFailed { .. } => Some("Failed to resolve download address".to_string()),
        TaskEvent::RetryCountdown { remaining_secs, .. } => Some(format!(
            "Failed to resolve download address, retrying in {remaining_secs}s"
        )),
        TaskEvent::Finished { .. } => Some("Download complete!".to_string()),
        TaskEvent::Failed { stage, error, .. } => Some(match stage {
            Status::Merging => format!("Finishing failed: {error}"),
            _ => format!("Download failed: {error}"),
        }),
        TaskEvent::Cancelled { .. } => Some("Cancelled".to_string()),
        TaskEvent::Removed { .. } => None,
    }
}

/// Line for a snapshot, e.g. when an item is first drawn
pub fn snapshot_line(snapshot: &TaskSnapshot) -> String {
    match (snapshot.status, snapshot.retry_in_secs) {
        (Status::Analyzing, Some(remaining_secs)) => {
            format!("Failed to resolve download address, retrying in {remaining_secs}s")
        }
        (status, _) => line_for(status, snapshot.percent, snapshot.speed_bps),
    }
}

fn line_for(status: Status, percent: f32, speed_bps: u64) -> String {
    match status {
        Status::Pending => "Waiting...".to_string(),
        Status::Analyzing => "Resolving download address...".to_string(),
        Status::Downloading => format!(
            "{:.1}%    {}    Downloading...",
            percent,
            format_bps(speed_bps)
        ),
        Status::Merging => "Finishing...".to_string(),
        Status::Finished => "Download complete!".to_string(),
        Status::Failed => "Download failed".to_string(),
        Status::Cancelled => "Cancelled".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TaskId;
    use std::path::PathBuf;

    fn status(status: Status, percent: f32, speed_bps: u64) -> TaskEvent {
        TaskEvent::Status {
            id: TaskId(1),
            percent,
            speed_bps,
            status,
        }
    }

    #[test]
    fn downloading_line_has_percent_and_rate() {
        assert_eq!(
            status_line(&status(Status::Downloading, 42.345, 1536)).unwrap(),
            "42.3%    1.5 KB/s    Downloading..."
        );
    }

    #[test]
    fn stage_lines() {
        assert_eq!(
            status_line(&status(Status::Analyzing, 0.0, 0)).unwrap(),
            "Resolving download address..."
        );
        assert_eq!(
            status_line(&status(Status::Merging, 100.0, 0)).unwrap(),
            "Finishing..."
        );
        assert_eq!(
            status_line(&TaskEvent::Finished {
                id: TaskId(1),
                path: PathBuf::from("a.mp4")
            })
            .unwrap(),
            "Download complete!"
        );
    }

    #[test]
    fn countdown_line() {
        let event = TaskEvent::RetryCountdown {
            id: TaskId(1),
            attempt: 1,
            remaining_secs: 4,
        };
        assert_eq!(
            status_line(&event).unwrap(),
            "Failed to resolve download address, retrying in 4s"
        );
    }

    #[test]
    fn failure_lines_name_the_stage() {
        let event = TaskEvent::Failed {
            id: TaskId(1),
            stage: Status::Merging,
            error: "merge failed: bad container".into(),
        };
        assert_eq!(
            status_line(&event).unwrap(),
            "Finishing failed: merge failed: bad container"
        );
        assert!(status_line(&TaskEvent::Removed { id: TaskId(1) }).is_none());
    }

    #[test]
    fn pending_snapshot_is_waiting() {
        assert_eq!(snapshot_line(&TaskSnapshot::default()), "Waiting...");
    }

    #[test]
    fn countdown_snapshot_shows_retry() {
        let snapshot = TaskSnapshot {
            status: Status::Analyzing,
            retry_in_secs: Some(3),
            ..TaskSnapshot::default()
        };
        assert_eq!(
            snapshot_line(&snapshot),
            "Failed to resolve download address, retrying in 3s"
        );

        let resolving = TaskSnapshot {
            status: Status::Analyzing,
            ..TaskSnapshot::default()
        };
        assert_eq!(snapshot_line(&resolving), "Resolving download address...");
    }
}
