//! Single-partition ranged transfer with positional writes.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use reqwest::StatusCode;
use reqwest::header::RANGE;
use tokio_util::sync::CancellationToken;

use crate::config::RetryConfig;
use crate::error::{PartitionError, PartitionErrorKind};
use crate::retry::retry_with_backoff;
use crate::types::{ByteRange, Event};

use super::output::write_all_at;

/// Everything one partition task owns.
pub(super) struct PartitionTask {
    pub(super) client: reqwest::Client,
    pub(super) url: Arc<str>,
    pub(super) range: ByteRange,
    pub(super) file: Arc<std::fs::File>,
    pub(super) downloaded_bytes: Arc<AtomicU64>,
    pub(super) retry: RetryConfig,
    pub(super) event_tx: tokio::sync::broadcast::Sender<Event>,
    pub(super) cancel_token: CancellationToken,
}

/// Run one partition to completion, retrying transient failures.
pub(super) async fn run_partition(task: PartitionTask) -> Result<u64, PartitionError> {
    let range = task.range;
    let result = retry_with_backoff(&task.retry, &task.cancel_token, || fetch_range(&task)).await;

    match result {
        Ok(written) => {
            tracing::debug!(url = %task.url, range = %range, written, "partition complete");
            task.event_tx.send(Event::PartitionComplete { range }).ok();
            Ok(written)
        }
        Err(kind) => {
            tracing::warn!(url = %task.url, range = %range, error = %kind, "partition failed");
            task.event_tx
                .send(Event::PartitionFailed {
                    range,
                    error: kind.to_string(),
                })
                .ok();
            Err(PartitionError { range, kind })
        }
    }
}

/// One attempt at a partition. Progress is rolled back if the attempt fails.
async fn fetch_range(task: &PartitionTask) -> Result<u64, PartitionErrorKind> {
    let mut written = 0;
    let result = stream_range(task, &mut written).await;
    if result.is_err() && written > 0 {
        task.downloaded_bytes.fetch_sub(written, Ordering::Relaxed);
    }
    result
}

async fn stream_range(task: &PartitionTask, written: &mut u64) -> Result<u64, PartitionErrorKind> {
    let range = task.range;
    let expected = range.len();

    if task.cancel_token.is_cancelled() {
        return Err(PartitionErrorKind::Cancelled);
    }

    let request = task
        .client
        .get(task.url.as_ref())
        .header(RANGE, range.header_value())
        .send();
    let mut response = tokio::select! {
        response = request => response.map_err(PartitionErrorKind::Transport)?,
        _ = task.cancel_token.cancelled() => return Err(PartitionErrorKind::Cancelled),
    };

    let status = response.status();
    if status != StatusCode::PARTIAL_CONTENT {
        tracing::error!(
            range = %range,
            status = status.as_u16(),
            "server did not honor range request"
        );
        return Err(PartitionErrorKind::UnexpectedStatus {
            status: status.as_u16(),
        });
    }

    loop {
        let chunk = tokio::select! {
            chunk = response.chunk() => chunk.map_err(PartitionErrorKind::Transport)?,
            _ = task.cancel_token.cancelled() => return Err(PartitionErrorKind::Cancelled),
        };
        let Some(chunk) = chunk else {
            break;
        };

        let remaining = expected - *written;
        let overflow = chunk.len() as u64 > remaining;
        let take = (chunk.len() as u64).min(remaining) as usize;

        if take > 0 {
            let offset = range.start + *written;
            let file = Arc::clone(&task.file);
            let data = chunk.slice(..take);
            // Disk I/O goes to the blocking pool so other partitions keep streaming
            tokio::task::spawn_blocking(move || write_all_at(&file, &data, offset))
                .await
                .map_err(|e| PartitionErrorKind::TaskFailed(e.to_string()))?
                .map_err(PartitionErrorKind::Io)?;

            *written += take as u64;
            task.downloaded_bytes
                .fetch_add(take as u64, Ordering::Relaxed);
        }

        if overflow {
            return Err(PartitionErrorKind::ShortBody {
                expected,
                received: *written + (chunk.len() - take) as u64,
            });
        }
    }

    if *written < expected {
        return Err(PartitionErrorKind::ShortBody {
            expected,
            received: *written,
        });
    }

    Ok(*written)
}
