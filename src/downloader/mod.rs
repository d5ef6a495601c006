//! Parallel chunk downloader -- concurrent ranged transfers into one file.
//!
//! Split into focused submodules:
//! - [`partition`] - Byte-range planning
//! - [`output`] - Destination file and positional writes
//! - [`transfer`] - Per-partition ranged GET, streaming and retry
//! - [`progress`] - Periodic progress events

mod output;
mod partition;
mod progress;
mod transfer;

pub use partition::plan_partitions;

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio_util::sync::CancellationToken;

use crate::config::{Config, RetryConfig};
use crate::error::{PartitionError, PartitionErrorKind, Result};
use crate::types::{CompletedFile, Event};

use output::OutputFile;
use progress::{ProgressReporterParams, spawn_progress_reporter};
use transfer::{PartitionTask, run_partition};

/// Downloads a located artifact with one concurrent ranged request per partition.
#[derive(Clone)]
pub struct ChunkDownloader {
    client: reqwest::Client,
    segments: usize,
    retry: RetryConfig,
    event_tx: tokio::sync::broadcast::Sender<Event>,
    cancel_token: CancellationToken,
}

impl ChunkDownloader {
    /// Create a downloader splitting transfers into `segments` partitions.
    pub fn new(
        client: reqwest::Client,
        segments: usize,
        event_tx: tokio::sync::broadcast::Sender<Event>,
    ) -> Self {
        Self {
            client,
            segments,
            retry: RetryConfig::default(),
            event_tx,
            cancel_token: CancellationToken::new(),
        }
    }

    /// Create a downloader using the partition and retry settings of `config`.
    pub fn from_config(
        client: reqwest::Client,
        config: &Config,
        event_tx: tokio::sync::broadcast::Sender<Event>,
    ) -> Self {
        Self::new(client, config.segments, event_tx).with_retry(config.partition_retry.clone())
    }

    /// Replace the per-partition retry policy.
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Cancel in-flight partitions once `token` is cancelled.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel_token = token;
        self
    }

    /// Fetch `url` into `destination`.
    ///
    /// The destination is created (truncating any existing file) and sized to
    /// `content_length` before any partition starts. Every partition runs to
    /// completion; one partition failing does not stop the others. The
    /// returned [`CompletedFile`] lists every partition that failed.
    ///
    /// Only failing to create the destination is returned as an error.
    pub async fn download(
        &self,
        url: &str,
        content_length: u64,
        destination: &Path,
    ) -> Result<CompletedFile> {
        let output = OutputFile::create(destination, content_length).inspect_err(|e| {
            tracing::error!(path = %destination.display(), error = %e, "could not create file");
        })?;

        let ranges = plan_partitions(content_length, self.segments);
        let partitions = ranges.len();

        tracing::info!(
            url = %url,
            path = %destination.display(),
            content_length,
            partitions,
            "starting ranged download"
        );
        self.event_tx
            .send(Event::DownloadStarted {
                url: url.to_string(),
                path: destination.to_path_buf(),
                partitions,
                total_bytes: content_length,
            })
            .ok();

        let downloaded_bytes = Arc::new(AtomicU64::new(0));
        let progress_token = self.cancel_token.child_token();
        let progress_task = spawn_progress_reporter(ProgressReporterParams {
            total_bytes: content_length,
            started: std::time::Instant::now(),
            downloaded_bytes: Arc::clone(&downloaded_bytes),
            event_tx: self.event_tx.clone(),
            cancel_token: progress_token.clone(),
        });

        let url: Arc<str> = Arc::from(url);
        let handles: Vec<_> = ranges
            .iter()
            .map(|&range| {
                let task = PartitionTask {
                    client: self.client.clone(),
                    url: Arc::clone(&url),
                    range,
                    file: Arc::clone(&output.file),
                    downloaded_bytes: Arc::clone(&downloaded_bytes),
                    retry: self.retry.clone(),
                    event_tx: self.event_tx.clone(),
                    cancel_token: self.cancel_token.clone(),
                };
                tokio::spawn(run_partition(task))
            })
            .collect();

        // Join barrier: wait for every partition, success or failure
        let joined = futures::future::join_all(handles).await;

        let mut partition_errors = Vec::new();
        for (range, outcome) in ranges.iter().zip(joined) {
            match outcome {
                Ok(Ok(_written)) => {}
                Ok(Err(e)) => partition_errors.push(e),
                Err(join_error) => {
                    tracing::error!(range = %range, error = %join_error, "partition task failed");
                    partition_errors.push(PartitionError {
                        range: *range,
                        kind: PartitionErrorKind::TaskFailed(join_error.to_string()),
                    });
                }
            }
        }

        progress_token.cancel();
        progress_task.await.ok();

        let total_written = downloaded_bytes.load(Ordering::Relaxed);
        if partition_errors.is_empty() {
            tracing::info!(path = %destination.display(), bytes = total_written, "download complete");
        } else {
            tracing::warn!(
                path = %destination.display(),
                failed = partition_errors.len(),
                partitions,
                bytes = total_written,
                "download finished with failed partitions"
            );
        }

        self.event_tx
            .send(Event::DownloadComplete {
                path: destination.to_path_buf(),
                partitions_failed: if partition_errors.is_empty() {
                    None
                } else {
                    Some(partition_errors.len())
                },
            })
            .ok();

        Ok(CompletedFile {
            path: output.path.clone(),
            file: output.into_file()?,
            content_length,
            partitions,
            partition_errors,
        })
    }
}
