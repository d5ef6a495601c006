//! Snapshot client -- locate a snapshot, then report or download it.

use std::io::Write;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::downloader::ChunkDownloader;
use crate::epoch::Timestamp;
use crate::error::Result;
use crate::locator::Locator;
use crate::store::{ArtifactProbe, HttpStore};
use crate::types::{Event, FetchOutcome, Located};
use crate::utils::{check_disk_space, resolve_output_path};

/// Capacity of the event channel before slow subscribers start lagging
const EVENT_CHANNEL_CAPACITY: usize = 1000;

/// Main entry point (cloneable, all shared state is Arc-wrapped)
#[derive(Clone)]
pub struct SnapshotClient {
    /// Configuration, validated once in [`SnapshotClient::new`]
    config: Arc<Config>,
    /// HTTP store, its client is shared with the downloader
    store: HttpStore,
    /// Existence check used by the locator
    probe: Arc<dyn ArtifactProbe>,
    /// Event broadcast channel sender (multiple subscribers supported)
    event_tx: tokio::sync::broadcast::Sender<Event>,
    /// Cancels probes and in-flight partitions
    cancel_token: CancellationToken,
}

impl SnapshotClient {
    /// Build a client from `config`.
    ///
    /// Fails with [`crate::Error::Config`] if the configuration is invalid.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use snapshot_dl::{Config, SnapshotClient};
    /// use snapshot_dl::epoch::Timestamp;
    ///
    /// # async fn example() -> snapshot_dl::Result<()> {
    /// let client = SnapshotClient::new(Config::default())?;
    /// let located = client.locate(Timestamp::parse("2022-02-28_08-00-00")?).await?;
    /// println!("{}", located.url);
    /// # Ok(())
    /// # }
    /// ```
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;
        let store = HttpStore::new(config.request_timeout)?;
        let (event_tx, _rx) = tokio::sync::broadcast::channel(EVENT_CHANNEL_CAPACITY);

        Ok(Self {
            config: Arc::new(config),
            probe: Arc::new(store.clone()),
            store,
            event_tx,
            cancel_token: CancellationToken::new(),
        })
    }

    /// Replace the existence check (the download path keeps using HTTP).
    pub fn with_probe(mut self, probe: Arc<dyn ArtifactProbe>) -> Self {
        self.probe = probe;
        self
    }

    /// Use `token` to cancel probing and downloading.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel_token = token;
        self
    }

    /// Subscribe to locate and download events
    ///
    /// Each subscriber receives every event. A subscriber that falls more
    /// than 1000 events behind gets `RecvError::Lagged`.
    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<Event> {
        self.event_tx.subscribe()
    }

    /// The configuration this client was built with
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Token cancelling this client's work
    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel_token
    }

    fn locator(&self) -> Locator {
        Locator::new(
            Arc::clone(&self.probe),
            self.config.host.clone(),
            self.config.naming.clone(),
            self.config.max_attempts,
            self.event_tx.clone(),
        )
        .with_cancellation(self.cancel_token.clone())
    }

    fn downloader(&self) -> ChunkDownloader {
        ChunkDownloader::from_config(self.store.client().clone(), &self.config, self.event_tx.clone())
            .with_cancellation(self.cancel_token.clone())
    }

    /// Find the first published artifact at or after `start`.
    pub async fn locate(&self, start: Timestamp) -> Result<Located> {
        self.locator().locate(start).await
    }

    /// Locate the artifact for `start`, then download it or just report its URL.
    ///
    /// In report-only mode nothing is written to disk. Otherwise the artifact
    /// is written to the configured output path (or its object name inside
    /// the download directory). Partition failures are attached to the
    /// returned file unless [`Config::strict`] is set, in which case they
    /// become [`crate::Error::IncompleteDownload`].
    pub async fn locate_and_fetch(&self, start: Timestamp) -> Result<FetchOutcome> {
        let located = self.locate(start).await?;

        if self.config.report_only {
            tracing::info!(url = %located.url, "report only, skipping download");
            return Ok(FetchOutcome::Reported(located.url));
        }

        let destination = resolve_output_path(&self.config, &located.artifact);
        check_disk_space(&destination, located.content_length, &self.config.disk_space)?;

        let completed = self
            .downloader()
            .download(&located.url, located.content_length, &destination)
            .await?;

        if self.config.strict {
            return completed.ensure_complete().map(FetchOutcome::Downloaded);
        }
        Ok(FetchOutcome::Downloaded(completed))
    }

    /// Locate the artifact for `start` and write its URL to `writer`.
    ///
    /// The URL is written exactly, without a trailing newline.
    pub async fn report_to<W: Write>(&self, start: Timestamp, writer: &mut W) -> Result<Located> {
        let located = self.locate(start).await?;
        writer.write_all(located.url.as_bytes())?;
        writer.flush()?;
        Ok(located)
    }
}

/// Locate and fetch the snapshot for a `YYYY-MM-DD_HH-MM-SS` date in one call.
///
/// # Examples
///
/// ```no_run
/// use snapshot_dl::{Config, FetchOutcome, locate_and_fetch};
///
/// # async fn example() -> snapshot_dl::Result<()> {
/// let config = Config { report_only: true, ..Config::default() };
/// if let FetchOutcome::Reported(url) = locate_and_fetch("2022-02-28_08-00-00", config).await? {
///     print!("{url}");
/// }
/// # Ok(())
/// # }
/// ```
pub async fn locate_and_fetch(start: &str, config: Config) -> Result<FetchOutcome> {
    let start = Timestamp::parse(start)?;
    SnapshotClient::new(config)?.locate_and_fetch(start).await
}
