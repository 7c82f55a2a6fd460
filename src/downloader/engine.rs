//! Concurrent downloader (§4.3): bounded-parallelism batch download with
//! retry, cancellation, and progress reporting. Streams each response
//! body straight to disk rather than buffering it in memory.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures_util::StreamExt;
use tokio::fs::File;
use tokio::io::{AsyncSeekExt, AsyncWriteExt};
use tokio_util::sync::CancellationToken;

use crate::error::AppError;
use crate::http_client::ReqClient;
use crate::semaphore::Semaphore;
use crate::task_manager::updater::{ProgressDetails, TaskUpdater};

pub const DEFAULT_DOWNLOAD_CONCURRENCY: usize = 10;

#[derive(Clone)]
pub struct DownloaderConfig {
    pub concurrency: usize,
    pub retry_count: u32,
    pub retry_delay: Duration,
}

impl Default for DownloaderConfig {
    fn default() -> Self {
        Self {
            concurrency: DEFAULT_DOWNLOAD_CONCURRENCY,
            retry_count: 3,
            retry_delay: Duration::from_millis(500),
        }
    }
}

pub struct Downloader {
    client: Arc<ReqClient>,
    gate: Semaphore,
    config: DownloaderConfig,
}

impl Downloader {
    pub fn new(client: Arc<ReqClient>, config: DownloaderConfig) -> Self {
        let gate = Semaphore::new(config.concurrency);
        Self { client, gate, config }
    }

    /// Bounded-parallel batch download. Exactly one writer per
    /// destination path is assumed (the caller must not supply
    /// duplicates). Returns the count of successful downloads; the
    /// `Err` variant is reserved for argument-level failures — per-URL
    /// failures are only counted (§4.3).
    pub async fn batch_download(
        &self,
        image_urls: &[String],
        dest_paths: &[PathBuf],
        headers: HashMap<String, String>,
        updater: &TaskUpdater,
        cancel: CancellationToken,
    ) -> Result<usize, AppError> {
        let total = image_urls.len();
        if dest_paths.len() != total {
            return Err(AppError::InvalidRequest(
                "image URL and file path lists have different lengths".to_string(),
            ));
        }
        if total == 0 {
            updater.update_task_progress(0, 0);
            return Ok(0);
        }

        updater.update_task_progress(0, total as u64);

        let resolved = Arc::new(AtomicU64::new(0));
        let mut join_set = tokio::task::JoinSet::new();

        for (url, dest) in image_urls.iter().cloned().zip(dest_paths.iter().cloned()) {
            let Some(permit) = self.gate.acquire_owned_cancellable(&cancel).await else {
                // Cancelled while queued: exit without starting the request.
                break;
            };
            let client = self.client.clone();
            let headers = headers.clone();
            let task_cancel = cancel.clone();
            let resolved = resolved.clone();
            let retry_count = self.config.retry_count;
            let retry_delay = self.config.retry_delay;
            join_set.spawn(async move {
                let result = fetch_with_retry(&client, &url, &dest, &headers, retry_count, retry_delay, &task_cancel).await;
                drop(permit);
                let done = resolved.fetch_add(1, Ordering::SeqCst) + 1;
                (done, url, result)
            });
        }

        let mut success_count = 0usize;
        while let Some(joined) = join_set.join_next().await {
            let (done, url, result) = joined.map_err(|e| AppError::Internal(e.to_string()))?;
            if result.is_ok() {
                success_count += 1;
            }
            updater.update_task_progress_with_details(ProgressDetails {
                current: done,
                total: total as u64,
                phase: Some("downloading".to_string()),
                current_item: Some(url),
            });
        }

        Ok(success_count)
    }
}

/// Fetches a single URL to `dest`, retrying up to `retry_count` times
/// with a fixed delay between attempts (§4.3). Creates/truncates the
/// destination at the start and on every retry; removes it on final
/// failure.
async fn fetch_with_retry(
    client: &ReqClient,
    url: &str,
    dest: &Path,
    headers: &HashMap<String, String>,
    retry_count: u32,
    retry_delay: Duration,
    cancel: &CancellationToken,
) -> Result<(), AppError> {
    if let Some(parent) = dest.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    let mut file = File::create(dest).await?;

    let mut last_err = AppError::Internal("no attempt made".to_string());
    for attempt in 0..=retry_count {
        if cancel.is_cancelled() {
            let _ = tokio::fs::remove_file(dest).await;
            return Err(AppError::Cancelled);
        }
        if attempt > 0 {
            tokio::time::sleep(retry_delay).await;
            file.seek(std::io::SeekFrom::Start(0)).await?;
            file.set_len(0).await?;
        }

        match try_once(client, url, &mut file, headers, cancel).await {
            Ok(()) => return Ok(()),
            Err(e) => {
                if e.is_cancellation() {
                    let _ = tokio::fs::remove_file(dest).await;
                    return Err(e);
                }
                last_err = e;
            }
        }
    }

    let _ = tokio::fs::remove_file(dest).await;
    Err(last_err)
}

async fn try_once(
    client: &ReqClient,
    url: &str,
    file: &mut File,
    headers: &HashMap<String, String>,
    cancel: &CancellationToken,
) -> Result<(), AppError> {
    let response = tokio::select! {
        biased;
        _ = cancel.cancelled() => return Err(AppError::Cancelled),
        result = client.get_with_headers(url, headers) => result?,
    };
    if !response.status().is_success() {
        return Err(AppError::Protocol(response.status().as_u16()));
    }

    let mut stream = response.bytes_stream();
    loop {
        let next = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(AppError::Cancelled),
            chunk = stream.next() => chunk,
        };
        match next {
            Some(Ok(bytes)) => {
                file.write_all(&bytes).await?;
            }
            Some(Err(e)) => return Err(AppError::from(e)),
            None => break,
        }
    }
    file.flush().await?;
    Ok(())
}
