//! Finished-task notifications
//!
//! The engine never draws anything itself. When a task finishes it hands one
//! [`NotificationRequest`] to a [`NotificationChannel`], which picks a
//! [`Notifier`]: the platform toast when one is installed and reports itself
//! available, otherwise the fallback. Listeners (webhooks, test recorders) get a
//! copy of every request regardless of which notifier displayed it.
//!
//! The channel is reference counted and explicitly torn down with
//! [`NotificationChannel::shutdown`], which disposes every notifier once.

use crate::config::{NotificationConfig, WebhookConfig};
use crate::error::{Error, Result};
use crate::types::NotificationRequest;
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Something that can present a finished-task notification
#[async_trait::async_trait]
pub trait Notifier: Send + Sync {
    /// Short name used in logs
    fn name(&self) -> &'static str;

    /// Whether the platform capability behind this notifier is present
    fn is_available(&self) -> bool {
        true
    }

    /// Present one notification
    async fn deliver(&self, request: &NotificationRequest) -> Result<()>;

    /// Release platform resources (icons, handles); called once on shutdown
    fn dispose(&self) {}
}

/// Fallback notifier that only writes the request to the log
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

#[async_trait::async_trait]
impl Notifier for LogNotifier {
    fn name(&self) -> &'static str {
        "log"
    }

    async fn deliver(&self, request: &NotificationRequest) -> Result<()> {
        tracing::info!(
            title = %request.title,
            subtitle = %request.subtitle,
            path = %request.output_path.display(),
            "Download notification"
        );
        Ok(())
    }
}

/// JSON body POSTed to webhooks
#[derive(Debug, Clone, Serialize)]
pub struct WebhookPayload {
    /// Always "finished"
    pub event: String,
    /// Notification headline
    pub title: String,
    /// Task details
    pub subtitle: String,
    /// Final output path
    pub output_path: PathBuf,
    /// Unix timestamp of the notification
    pub timestamp: i64,
}

/// Notifier that POSTs finished notifications to one webhook
pub struct WebhookNotifier {
    client: reqwest::Client,
    config: WebhookConfig,
}

impl WebhookNotifier {
    /// Create a notifier for one configured webhook
    pub fn new(config: WebhookConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
        }
    }
}

#[async_trait::async_trait]
impl Notifier for WebhookNotifier {
    fn name(&self) -> &'static str {
        "webhook"
    }

    async fn deliver(&self, request: &NotificationRequest) -> Result<()> {
        let payload = WebhookPayload {
            event: "finished".to_string(),
            title: request.title.clone(),
            subtitle: request.subtitle.clone(),
            output_path: request.output_path.clone(),
            timestamp: chrono::Utc::now().timestamp(),
        };

        let mut builder = self
            .client
            .post(&self.config.url)
            .json(&payload)
            .timeout(self.config.timeout);
        if let Some(auth) = &self.config.auth_header {
            builder = builder.header("Authorization", auth);
        }

        let response = builder.send().await?;
        if !response.status().is_success() {
            return Err(Error::Other(format!(
                "webhook {} returned status {}",
                self.config.url,
                response.status()
            )));
        }
        tracing::debug!(url = %self.config.url, "Webhook delivered");
        Ok(())
    }
}

struct ChannelInner {
    toast: Option<Arc<dyn Notifier>>,
    fallback: Arc<dyn Notifier>,
    listeners: Vec<Arc<dyn Notifier>>,
    closed: AtomicBool,
}

/// Owned, reference-counted route from finished tasks to notifiers
///
/// Clones share the same notifiers.
#[derive(Clone)]
pub struct NotificationChannel {
    inner: Arc<ChannelInner>,
}

impl NotificationChannel {
    /// Create a channel that presents through `fallback`
    pub fn new(fallback: Arc<dyn Notifier>) -> Self {
        Self {
            inner: Arc::new(ChannelInner {
                toast: None,
                fallback,
                listeners: Vec::new(),
                closed: AtomicBool::new(false),
            }),
        }
    }

    /// Channel with a log fallback and one listener per configured webhook
    pub fn from_config(config: &NotificationConfig) -> Self {
        config.webhooks.iter().cloned().fold(
            Self::new(Arc::new(LogNotifier)),
            |channel, webhook| channel.with_listener(Arc::new(WebhookNotifier::new(webhook))),
        )
    }

    /// Prefer `toast` whenever it reports itself available
    pub fn with_toast(self, toast: Arc<dyn Notifier>) -> Self {
        self.rebuild(|inner| inner.toast = Some(toast))
    }

    /// Send a copy of every request to `listener`
    pub fn with_listener(self, listener: Arc<dyn Notifier>) -> Self {
        self.rebuild(|inner| inner.listeners.push(listener))
    }

    fn rebuild(self, change: impl FnOnce(&mut ChannelInner)) -> Self {
        let mut inner = ChannelInner {
            toast: self.inner.toast.clone(),
            fallback: self.inner.fallback.clone(),
            listeners: self.inner.listeners.clone(),
            closed: AtomicBool::new(self.inner.closed.load(Ordering::SeqCst)),
        };
        change(&mut inner);
        Self {
            inner: Arc::new(inner),
        }
    }

    /// Name of the notifier that would present a request right now
    pub fn presenter_name(&self) -> &'static str {
        self.presenter().name()
    }

    fn presenter(&self) -> &Arc<dyn Notifier> {
        match &self.inner.toast {
            Some(toast) if toast.is_available() => toast,
            _ => &self.inner.fallback,
        }
    }

    /// Present `request`, then forward it to every listener
    ///
    /// Listeners run concurrently after the presenter has finished, so a slow
    /// webhook never holds back the toast. Listener failures are logged and do
    /// not affect the result, which reflects the presenting notifier only. A
    /// closed channel drops the request.
    pub async fn deliver(&self, request: &NotificationRequest) -> Result<()> {
        if self.is_closed() {
            tracing::debug!(title = %request.title, "Notification channel closed, dropping request");
            return Ok(());
        }

        let presenter = self.presenter();
        let presented = presenter.deliver(request).await.inspect_err(|e| {
            tracing::warn!(notifier = presenter.name(), error = %e, "Failed to present notification");
        });

        let forwarded = self.inner.listeners.iter().map(|listener| async move {
            if let Err(e) = listener.deliver(request).await {
                tracing::warn!(notifier = listener.name(), error = %e, "Notification listener failed");
            }
        });
        futures::future::join_all(forwarded).await;

        presented
    }

    /// Deliver in the background (fire and forget)
    pub fn notify(&self, request: NotificationRequest) {
        let channel = self.clone();
        tokio::spawn(async move {
            let _ = channel.deliver(&request).await;
        });
    }

    /// Whether [`shutdown`](Self::shutdown) has run
    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::SeqCst)
    }

    /// Dispose every notifier and stop accepting requests
    ///
    /// Idempotent: only the first call disposes.
    pub fn shutdown(&self) {
        if self.inner.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        if let Some(toast) = &self.inner.toast {
            toast.dispose();
        }
        self.inner.fallback.dispose();
        for listener in &self.inner.listeners {
            listener.dispose();
        }
        tracing::debug!("Notification channel shut down");
    }
}
