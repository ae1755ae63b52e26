//! Configuration types for bili-dl-core

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::{path::Path, path::PathBuf, time::Duration};

/// Download behavior configuration (directories, concurrency, progress reporting)
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DownloadConfig {
    /// Directory that receives finished files (default: "./downloads")
    #[serde(default = "default_download_dir")]
    pub download_dir: PathBuf,

    /// Directory for partial streams; each task gets its own subdirectory (default: "./temp")
    #[serde(default = "default_temp_dir")]
    pub temp_dir: PathBuf,

    /// Maximum number of lifecycles running at once in a queue (default: 3)
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent_downloads: usize,

    /// Interval between progress events while downloading (default: 500 ms)
    #[serde(default = "default_progress_interval", with = "millis_serde")]
    pub progress_interval: Duration,

    /// Weight of the newest sample in the throughput estimate, in (0, 1] (default: 0.5)
    ///
    /// 1.0 reports the raw rate of the last interval.
    #[serde(default = "default_rate_smoothing")]
    pub rate_smoothing: f64,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            download_dir: default_download_dir(),
            temp_dir: default_temp_dir(),
            max_concurrent_downloads: default_max_concurrent(),
            progress_interval: default_progress_interval(),
            rate_smoothing: default_rate_smoothing(),
        }
    }
}

/// Exponential backoff for bounded retries (transfer stage)
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BackoffConfig {
    /// Maximum number of retry attempts (default: 3)
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Initial delay before first retry (default: 1 second)
    #[serde(default = "default_initial_delay", with = "duration_serde")]
    pub initial_delay: Duration,

    /// Maximum delay between retries (default: 30 seconds)
    #[serde(default = "default_max_delay", with = "duration_serde")]
    pub max_delay: Duration,

    /// Multiplier for exponential backoff (default: 2.0)
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,

    /// Add random jitter to delays (default: true)
    #[serde(default = "default_true")]
    pub jitter: bool,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_delay: default_initial_delay(),
            max_delay: default_max_delay(),
            backoff_multiplier: default_backoff_multiplier(),
            jitter: true,
        }
    }
}

/// Retry configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Countdown length, in ticks, between failed address resolutions (default: 5)
    #[serde(default = "default_analysis_interval")]
    pub analysis_interval_secs: u32,

    /// Length of one countdown tick (default: 1 second)
    #[serde(default = "default_tick", with = "millis_serde")]
    pub tick: Duration,

    /// Bounded retry for transient transfer failures
    #[serde(default)]
    pub transfer: BackoffConfig,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            analysis_interval_secs: default_analysis_interval(),
            tick: default_tick(),
            transfer: BackoffConfig::default(),
        }
    }
}

/// Search suggestion configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SuggestConfig {
    /// Suggestion endpoint, queried with `keyword` and `highlight=1`
    #[serde(default = "default_suggest_endpoint")]
    pub endpoint: String,

    /// Quiet period before a query is sent (default: 100 ms)
    #[serde(default = "default_suggest_delay", with = "millis_serde")]
    pub delay: Duration,

    /// HTTP timeout for one suggestion request (default: 10 seconds)
    #[serde(default = "default_suggest_timeout", with = "duration_serde")]
    pub timeout: Duration,

    /// User-Agent header sent with suggestion requests
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for SuggestConfig {
    fn default() -> Self {
        Self {
            endpoint: default_suggest_endpoint(),
            delay: default_suggest_delay(),
            timeout: default_suggest_timeout(),
            user_agent: default_user_agent(),
        }
    }
}

/// Webhook configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct WebhookConfig {
    /// URL to POST to
    pub url: String,

    /// Optional authentication header value
    #[serde(default)]
    pub auth_header: Option<String>,

    /// Timeout for webhook requests (default: 30 seconds)
    #[serde(default = "default_webhook_timeout", with = "duration_serde")]
    pub timeout: Duration,
}

/// Notification configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NotificationConfig {
    /// Send a notification when a task finishes (default: true)
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Headline of finished notifications
    #[serde(default = "default_notification_title")]
    pub title: String,

    /// Webhooks receiving finished notifications as JSON
    #[serde(default)]
    pub webhooks: Vec<WebhookConfig>,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            title: default_notification_title(),
            webhooks: Vec::new(),
        }
    }
}

/// Main configuration
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Config {
    /// Download behavior settings
    #[serde(default)]
    pub download: DownloadConfig,

    /// Retry behavior
    #[serde(default)]
    pub retry: RetryConfig,

    /// Search suggestions
    #[serde(default)]
    pub suggest: SuggestConfig,

    /// Finished-task notifications
    #[serde(default)]
    pub notifications: NotificationConfig,
}

impl Config {
    /// Load a JSON configuration file and validate it
    ///
    /// Missing fields take their defaults, so `{}` is a valid file.
    pub async fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = tokio::fs::read_to_string(path).await.map_err(|e| {
            Error::Io(std::io::Error::new(
                e.kind(),
                format!("Failed to read config '{}': {}", path.display(), e),
            ))
        })?;
        let config: Config = serde_json::from_str(&raw)?;
        config.validate()?;
        tracing::debug!(path = %path.display(), "Configuration loaded");
        Ok(config)
    }

    /// Reject settings the engine cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.download.max_concurrent_downloads == 0 {
            return Err(Error::config(
                "download.max_concurrent_downloads",
                "at least one concurrent download is required",
            ));
        }
        let smoothing = self.download.rate_smoothing;
        if !(smoothing > 0.0 && smoothing <= 1.0) {
            return Err(Error::config(
                "download.rate_smoothing",
                format!("must be in (0, 1], got {smoothing}"),
            ));
        }
        if self.download.progress_interval.is_zero() {
            return Err(Error::config(
                "download.progress_interval",
                "progress interval must be non-zero",
            ));
        }
        if self.retry.tick.is_zero() {
            return Err(Error::config("retry.tick", "tick must be non-zero"));
        }
        if let Err(e) = url::Url::parse(&self.suggest.endpoint) {
            return Err(Error::config(
                "suggest.endpoint",
                format!("invalid URL '{}': {}", self.suggest.endpoint, e),
            ));
        }
        for webhook in &self.notifications.webhooks {
            if let Err(e) = url::Url::parse(&webhook.url) {
                return Err(Error::config(
                    "notifications.webhooks",
                    format!("invalid URL '{}': {}", webhook.url, e),
                ));
            }
        }
        Ok(())
    }
}

fn default_download_dir() -> PathBuf {
    PathBuf::from("downloads")
}

fn default_temp_dir() -> PathBuf {
    PathBuf::from("temp")
}

fn default_max_concurrent() -> usize {
    3
}

fn default_progress_interval() -> Duration {
    Duration::from_millis(500)
}

fn default_rate_smoothing() -> f64 {
    0.5
}

fn default_max_attempts() -> u32 {
    3
}

fn default_initial_delay() -> Duration {
    Duration::from_secs(1)
}

fn default_max_delay() -> Duration {
    Duration::from_secs(30)
}

fn default_backoff_multiplier() -> f64 {
    2.0
}

fn default_analysis_interval() -> u32 {
    5
}

fn default_tick() -> Duration {
    Duration::from_secs(1)
}

fn default_suggest_endpoint() -> String {
    "https://app.bilibili.com/x/v2/search/suggest3".to_string()
}

fn default_suggest_delay() -> Duration {
    Duration::from_millis(100)
}

fn default_suggest_timeout() -> Duration {
    Duration::from_secs(10)
}

fn default_user_agent() -> String {
    concat!("bili-dl-core/", env!("CARGO_PKG_VERSION")).to_string()
}

fn default_webhook_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_notification_title() -> String {
    "Bili-dl download finished".to_string()
}

fn default_true() -> bool {
    true
}

// Duration serialization helper (whole seconds)
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}

// Duration serialization helper (milliseconds)
mod millis_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_millis() as u64)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}
