//! HTTP stream transfer helper for [`MediaBackend`](super::MediaBackend) implementations.

use crate::error::{Error, Result};
use futures::StreamExt;
use std::path::Path;
use tokio::io::AsyncWriteExt;

use super::TransferProgress;

/// Stream the body of `url` into `dest`, adding every chunk to `progress`
///
/// The file is created (or truncated) first. A body that breaks off mid-way is
/// reported as [`Error::Transfer`], which the lifecycle treats as retryable; an
/// error status is reported as [`Error::Network`]. Dropping the returned future
/// stops the transfer at the next chunk boundary.
pub async fn download_to_file(
    client: &reqwest::Client,
    url: &str,
    dest: &Path,
    progress: &TransferProgress,
) -> Result<u64> {
    let response = client.get(url).send().await?.error_for_status()?;

    if let Some(parent) = dest.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    let mut file = tokio::fs::File::create(dest).await?;

    let mut written = 0u64;
    let mut stream = response.bytes_stream();
    while let Some(chunk) = stream.next().await {
        let bytes = chunk.map_err(|e| Error::Transfer(format!("stream from {url} broke off: {e}")))?;
        file.write_all(&bytes).await?;
        written += bytes.len() as u64;
        progress.add(bytes.len() as u64);
    }
    file.flush().await?;

    tracing::debug!(url, path = %dest.display(), bytes = written, "Stream transferred");
    Ok(written)
}
