//! Shared test helpers: a scripted media backend and a fast configuration.

use crate::config::Config;
use crate::error::{Error, Result};
use crate::types::{TaskEvent, TaskInfo};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;
use tempfile::tempdir;

use super::backend::{MediaBackend, MediaPlan, MediaStream, TransferProgress};

/// Configuration with millisecond timings and directories inside a temp dir.
/// Returns the config and the tempdir (which must be kept alive).
pub(crate) fn test_config() -> (Arc<Config>, tempfile::TempDir) {
    let temp_dir = tempdir().unwrap();

    let mut config = Config::default();
    config.download.download_dir = temp_dir.path().join("downloads");
    config.download.temp_dir = temp_dir.path().join("temp");
    config.download.progress_interval = Duration::from_millis(10);
    config.retry.analysis_interval_secs = 2;
    config.retry.tick = Duration::from_millis(10);
    config.retry.transfer.max_attempts = 2;
    config.retry.transfer.initial_delay = Duration::from_millis(5);
    config.retry.transfer.jitter = false;

    (Arc::new(config), temp_dir)
}

/// Receive events until (and including) the first terminal one
pub(crate) async fn collect_until_terminal(
    events: &mut tokio::sync::broadcast::Receiver<TaskEvent>,
) -> Vec<TaskEvent> {
    let mut collected = Vec::new();
    loop {
        let event = tokio::time::timeout(Duration::from_secs(5), events.recv())
            .await
            .expect("timed out waiting for a terminal event")
            .unwrap();
        let terminal = event.is_terminal();
        collected.push(event);
        if terminal {
            return collected;
        }
    }
}

/// Media backend whose failures are scripted per stage
pub(crate) struct ScriptedBackend {
    analysis_failures: u32,
    transfer_failures: u32,
    merge_fails: bool,
    transfer_delay: Duration,
    analyze_calls: AtomicU32,
    transfer_calls: AtomicU32,
}

impl ScriptedBackend {
    pub(crate) fn new() -> Self {
        Self {
            analysis_failures: 0,
            transfer_failures: 0,
            merge_fails: false,
            transfer_delay: Duration::from_millis(30),
            analyze_calls: AtomicU32::new(0),
            transfer_calls: AtomicU32::new(0),
        }
    }

    /// Fail the first `n` address resolutions
    pub(crate) fn failing_analysis(mut self, n: u32) -> Self {
        self.analysis_failures = n;
        self
    }

    /// Fail the first `n` transfers with a retryable error
    pub(crate) fn failing_transfer(mut self, n: u32) -> Self {
        self.transfer_failures = n;
        self
    }

    /// Make every merge fail
    pub(crate) fn failing_merge(mut self) -> Self {
        self.merge_fails = true;
        self
    }

    /// Time each transfer takes
    pub(crate) fn with_transfer_delay(mut self, delay: Duration) -> Self {
        self.transfer_delay = delay;
        self
    }

    pub(crate) fn analyze_calls(&self) -> u32 {
        self.analyze_calls.load(Ordering::SeqCst)
    }

    pub(crate) fn transfer_calls(&self) -> u32 {
        self.transfer_calls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl MediaBackend for ScriptedBackend {
    async fn analyze(&self, task: &TaskInfo) -> Result<MediaPlan> {
        let n = self.analyze_calls.fetch_add(1, Ordering::SeqCst);
        if n < self.analysis_failures {
            return Err(Error::Analysis(format!("no playable stream for {}", task.title)));
        }
        Ok(MediaPlan {
            file_name: format!("{}.mp4", task.title.to_lowercase()),
            streams: vec![
                MediaStream {
                    url: "https://cdn.example/video.m4s".to_string(),
                    size: Some(600),
                },
                MediaStream {
                    url: "https://cdn.example/audio.m4s".to_string(),
                    size: Some(400),
                },
            ],
        })
    }

    async fn transfer(
        &self,
        plan: &MediaPlan,
        dir: &Path,
        progress: &TransferProgress,
    ) -> Result<Vec<PathBuf>> {
        let n = self.transfer_calls.fetch_add(1, Ordering::SeqCst);
        if n < self.transfer_failures {
            return Err(Error::Transfer("connection reset".to_string()));
        }

        let mut parts = Vec::new();
        for (i, stream) in plan.streams.iter().enumerate() {
            tokio::time::sleep(self.transfer_delay / 2).await;
            let size = stream.size.unwrap_or(0) as usize;
            let part = dir.join(format!("part{i}.m4s"));
            tokio::fs::write(&part, vec![b'x'; size]).await?;
            progress.add(size as u64);
            parts.push(part);
        }
        Ok(parts)
    }

    async fn merge(&self, parts: &[PathBuf], output: &Path) -> Result<()> {
        if self.merge_fails {
            return Err(Error::Merge("bad container".to_string()));
        }
        let mut merged = Vec::new();
        for part in parts {
            merged.extend(tokio::fs::read(part).await?);
        }
        tokio::fs::write(output, merged).await?;
        Ok(())
    }
}
