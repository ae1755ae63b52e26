//! Media backend abstraction: address resolution, stream transfer and merge.

use crate::error::{Error, Result};
use crate::types::TaskInfo;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// One stream to transfer (e.g. the video track or the audio track)
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MediaStream {
    /// Where the bytes come from
    pub url: String,
    /// Size in bytes, when the source reports it
    pub size: Option<u64>,
}

/// Result of address resolution: what to fetch and what to call the output
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MediaPlan {
    /// Output file name (a bare name; directories are stripped)
    pub file_name: String,
    /// Streams to transfer and merge
    pub streams: Vec<MediaStream>,
}

impl MediaPlan {
    /// Sum of stream sizes; `None` if any stream size is unknown
    pub fn total_bytes(&self) -> Option<u64> {
        self.streams
            .iter()
            .try_fold(0u64, |acc, s| s.size.map(|size| acc.saturating_add(size)))
    }

    /// Output file name reduced to its final component
    pub(crate) fn safe_file_name(&self) -> Result<String> {
        Path::new(&self.file_name)
            .file_name()
            .and_then(|name| name.to_str())
            .filter(|name| !name.is_empty())
            .map(str::to_string)
            .ok_or_else(|| Error::Merge(format!("invalid output file name '{}'", self.file_name)))
    }
}

/// Shared byte counters a transfer reports into
///
/// Cheap to clone; all clones share the same counters.
#[derive(Clone, Debug, Default)]
pub struct TransferProgress {
    transferred: Arc<AtomicU64>,
    total: Arc<AtomicU64>,
}

impl TransferProgress {
    /// Create counters with a known total (0 when unknown)
    pub fn new(total_bytes: u64) -> Self {
        Self {
            transferred: Arc::new(AtomicU64::new(0)),
            total: Arc::new(AtomicU64::new(total_bytes)),
        }
    }

    /// Record `bytes` more transferred
    pub fn add(&self, bytes: u64) {
        self.transferred.fetch_add(bytes, Ordering::Relaxed);
    }

    /// Overwrite the transferred count (for resumed or restarted transfers)
    pub fn set_transferred(&self, bytes: u64) {
        self.transferred.store(bytes, Ordering::Relaxed);
    }

    /// Set the total once it becomes known
    pub fn set_total(&self, bytes: u64) {
        self.total.store(bytes, Ordering::Relaxed);
    }

    /// Bytes transferred so far
    pub fn transferred(&self) -> u64 {
        self.transferred.load(Ordering::Relaxed)
    }

    /// Expected total, 0 when unknown
    pub fn total(&self) -> u64 {
        self.total.load(Ordering::Relaxed)
    }

    /// Progress in percent, clamped to 0..=100; 0 while the total is unknown
    pub fn percent(&self) -> f32 {
        let total = self.total();
        if total == 0 {
            return 0.0;
        }
        ((self.transferred() as f64 / total as f64) * 100.0).min(100.0) as f32
    }
}

/// The external collaborators a download task drives
///
/// Implementations do the network and media work; the task lifecycle owns
/// sequencing, retries, cancellation and event publication. Every future
/// returned here may be dropped mid-flight when the task is cancelled.
#[async_trait::async_trait]
pub trait MediaBackend: Send + Sync {
    /// Resolve the playable address of the task's media
    ///
    /// Failures are retried indefinitely with a countdown.
    async fn analyze(&self, task: &TaskInfo) -> Result<MediaPlan>;

    /// Transfer every stream of `plan` into `dir`, reporting bytes to `progress`
    ///
    /// Returns the paths of the transferred parts, in stream order. Retryable
    /// errors (see [`crate::retry::IsRetryable`]) are retried with backoff.
    async fn transfer(
        &self,
        plan: &MediaPlan,
        dir: &Path,
        progress: &TransferProgress,
    ) -> Result<Vec<PathBuf>>;

    /// Combine the transferred parts into `output`
    async fn merge(&self, parts: &[PathBuf], output: &Path) -> Result<()>;
}
