//! # snapshot-dl
//!
//! Locate and download Filecoin chain state snapshots from a public bucket.
//!
//! Snapshots are published roughly hourly under names derived from their
//! timestamp and the chain epoch of that timestamp. Given a date, the client
//! probes for the matching artifact, stepping forward an hour on each miss,
//! then fetches it with concurrent ranged requests written straight into
//! their final offsets of one file.
//!
//! ## Design Philosophy
//!
//! - **Library-first** - the demo binary is a thin wrapper around [`SnapshotClient`]
//! - **Sensible defaults** - points at the mainnet bucket out of the box
//! - **Event-driven** - consumers subscribe to [`Event`]s, no polling required
//! - **Explicit partial results** - failed partitions are reported, never hidden
//!
//! ## Quick Start
//!
//! ```no_run
//! use snapshot_dl::{Config, FetchOutcome, SnapshotClient};
//! use snapshot_dl::epoch::Timestamp;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = SnapshotClient::new(Config::default())?;
//!
//!     let mut events = client.subscribe();
//!     tokio::spawn(async move {
//!         while let Ok(event) = events.recv().await {
//!             println!("Event: {:?}", event);
//!         }
//!     });
//!
//!     let start = Timestamp::parse("2022-02-28_08-00-00")?;
//!     if let FetchOutcome::Downloaded(file) = client.locate_and_fetch(start).await? {
//!         let file = file.ensure_complete()?;
//!         println!("saved {}", file.path().display());
//!     }
//!
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Snapshot client tying locator and downloader together
pub mod client;
/// Configuration types
pub mod config;
/// Parallel ranged downloader (decomposed into focused submodules)
pub mod downloader;
/// Timestamp and epoch conversion
pub mod epoch;
/// Error types
pub mod error;
/// Bounded search for a published snapshot
pub mod locator;
/// Retry logic with exponential backoff
pub mod retry;
/// Remote store probes
pub mod store;
/// Core types and events
pub mod types;
/// Utility functions
pub mod utils;

// Re-export commonly used types
pub use client::{SnapshotClient, locate_and_fetch};
pub use config::{ArtifactNaming, Config, DiskSpaceConfig, RetryConfig};
pub use downloader::ChunkDownloader;
pub use epoch::{Epoch, Timestamp, to_epoch, to_timestamp};
pub use error::{Error, PartitionError, PartitionErrorKind, Result};
pub use locator::Locator;
pub use store::{ArtifactProbe, HttpStore};
pub use types::{ArtifactId, ByteRange, CompletedFile, Event, FetchOutcome, Located, ProbeOutcome};

use tokio_util::sync::CancellationToken;

/// Cancel `token` when a termination signal arrives.
///
/// - **Unix:** listens for SIGTERM and SIGINT, with fallbacks if signal registration fails.
/// - **Windows/other:** listens for Ctrl+C via `tokio::signal::ctrl_c()`.
///
/// # Example
///
/// ```no_run
/// use snapshot_dl::{Config, SnapshotClient, cancel_on_signal};
/// use tokio_util::sync::CancellationToken;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let token = CancellationToken::new();
///     tokio::spawn(cancel_on_signal(token.clone()));
///
///     let client = SnapshotClient::new(Config::default())?.with_cancellation(token);
///     // ...
///     Ok(())
/// }
/// ```
pub async fn cancel_on_signal(token: CancellationToken) {
    tokio::select! {
        _ = wait_for_signal() => {
            tracing::info!("cancelling in-flight work");
            token.cancel();
        }
        _ = token.cancelled() => {}
    }
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    // Registration may fail in restricted environments (containers, tests)
    let sigterm_result = signal(SignalKind::terminate());
    let sigint_result = signal(SignalKind::interrupt());

    match (sigterm_result, sigint_result) {
        (Ok(mut sigterm), Ok(mut sigint)) => {
            tokio::select! {
                _ = sigterm.recv() => {
                    tracing::info!("Received SIGTERM signal");
                }
                _ = sigint.recv() => {
                    tracing::info!("Received SIGINT signal (Ctrl+C)");
                }
            }
        }
        (Err(e), Ok(mut sigint)) => {
            tracing::warn!(error = %e, "Could not register SIGTERM handler, waiting for SIGINT only");
            sigint.recv().await;
            tracing::info!("Received SIGINT signal (Ctrl+C)");
        }
        (Ok(mut sigterm), Err(e)) => {
            tracing::warn!(error = %e, "Could not register SIGINT handler, waiting for SIGTERM only");
            sigterm.recv().await;
            tracing::info!("Received SIGTERM signal");
        }
        (Err(e), Err(_)) => {
            tracing::error!(error = %e, "Could not register any signal handlers, using ctrl_c fallback");
            tokio::signal::ctrl_c().await.ok();
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => {
            tracing::info!("Received Ctrl+C signal");
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C signal");
        }
    }
}
