//! Event collection helpers

use bili_dl_core::{Status, TaskEvent, TaskId};
use std::time::Duration;
use tokio::sync::broadcast;

/// Collect one task's events until its terminal event (inclusive)
///
/// Panics if nothing terminal arrives within `timeout`.
pub async fn collect_task_events(
    events: &mut broadcast::Receiver<TaskEvent>,
    id: TaskId,
    timeout: Duration,
) -> Vec<TaskEvent> {
    let collected = tokio::time::timeout(timeout, async {
        let mut collected = Vec::new();
        loop {
            match events.recv().await {
                Ok(event) if event.task_id() == id => {
                    let terminal = event.is_terminal();
                    collected.push(event);
                    if terminal {
                        return collected;
                    }
                }
                Ok(_) => continue,
                Err(e) => panic!("event channel failed: {e}"),
            }
        }
    })
    .await;

    match collected {
        Ok(events) => events,
        Err(_) => panic!("timed out waiting for task {id} to end"),
    }
}

/// Statuses carried by `Status` events, in order
pub fn status_sequence(events: &[TaskEvent]) -> Vec<Status> {
    events
        .iter()
        .filter_map(|event| match event {
            TaskEvent::Status { status, .. } => Some(*status),
            _ => None,
        })
        .collect()
}

/// Assert the statuses never go backwards through the pipeline
pub fn assert_monotonic_stages(statuses: &[Status]) {
    fn rank(status: Status) -> u8 {
        match status {
            Status::Pending => 0,
            Status::Analyzing => 1,
            Status::Downloading => 2,
            Status::Merging => 3,
            Status::Finished | Status::Failed | Status::Cancelled => 4,
        }
    }
    for pair in statuses.windows(2) {
        assert!(
            rank(pair[0]) <= rank(pair[1]),
            "status went backwards: {:?} -> {:?} in {statuses:?}",
            pair[0],
            pair[1]
        );
    }
}
