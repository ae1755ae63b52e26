//! Media backend serving streams from a wiremock server

use bili_dl_core::task::http::download_to_file;
use bili_dl_core::{
    Config, Error, MediaBackend, MediaPlan, MediaStream, Result, TaskInfo, TransferProgress,
};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Video track served by [`start_media_server`]
pub const VIDEO: &[u8] = &[0x11; 48 * 1024];
/// Audio track served by [`start_media_server`]
pub const AUDIO: &[u8] = &[0x22; 16 * 1024];

/// Start a server with `/video.m4s` and `/audio.m4s`, each answered slowly
/// enough for progress updates to show up
pub async fn start_media_server(latency: Duration) -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/video.m4s"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_bytes(VIDEO.to_vec())
                .set_delay(latency),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/audio.m4s"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_bytes(AUDIO.to_vec())
                .set_delay(latency),
        )
        .mount(&server)
        .await;
    server
}

/// Fast configuration rooted in a fresh temp dir
pub fn fast_config() -> (Config, TempDir) {
    let temp_dir = tempfile::tempdir().unwrap();
    let mut config = Config::default();
    config.download.download_dir = temp_dir.path().join("downloads");
    config.download.temp_dir = temp_dir.path().join("temp");
    config.download.progress_interval = Duration::from_millis(10);
    config.retry.analysis_interval_secs = 3;
    config.retry.tick = Duration::from_millis(10);
    config.retry.transfer.initial_delay = Duration::from_millis(5);
    config.retry.transfer.jitter = false;
    config.notifications.enabled = true;
    (config, temp_dir)
}

/// Backend resolving every task to the media server's two tracks
pub struct HttpMediaBackend {
    client: reqwest::Client,
    base_url: String,
    analysis_failures: u32,
    analyze_calls: AtomicU32,
}

impl HttpMediaBackend {
    pub fn new(server: &MockServer) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: server.uri(),
            analysis_failures: 0,
            analyze_calls: AtomicU32::new(0),
        }
    }

    /// Fail the first `n` address resolutions
    pub fn failing_analysis(mut self, n: u32) -> Self {
        self.analysis_failures = n;
        self
    }

    pub fn analyze_calls(&self) -> u32 {
        self.analyze_calls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl MediaBackend for HttpMediaBackend {
    async fn analyze(&self, task: &TaskInfo) -> Result<MediaPlan> {
        let n = self.analyze_calls.fetch_add(1, Ordering::SeqCst);
        if n < self.analysis_failures {
            return Err(Error::Analysis("playurl returned no streams".to_string()));
        }
        Ok(MediaPlan {
            file_name: format!("{} {}.mp4", task.title, task.subtitle()),
            streams: vec![
                MediaStream {
                    url: format!("{}/video.m4s", self.base_url),
                    size: Some(VIDEO.len() as u64),
                },
                MediaStream {
                    url: format!("{}/audio.m4s", self.base_url),
                    size: Some(AUDIO.len() as u64),
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
        let mut parts = Vec::with_capacity(plan.streams.len());
        for (i, stream) in plan.streams.iter().enumerate() {
            let dest = dir.join(format!("{i}.m4s"));
            download_to_file(&self.client, &stream.url, &dest, progress).await?;
            parts.push(dest);
        }
        Ok(parts)
    }

    async fn merge(&self, parts: &[PathBuf], output: &Path) -> Result<()> {
        let mut merged = Vec::new();
        for part in parts {
            merged.extend(tokio::fs::read(part).await?);
        }
        tokio::fs::write(output, merged).await?;
        Ok(())
    }
}
