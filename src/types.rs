//! Core types for snapshot-dl

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::config::ArtifactNaming;
use crate::epoch::{Epoch, Timestamp};
use crate::error::{Error, PartitionError, Result};

/// Half-open byte interval `[start, end)` of an artifact
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ByteRange {
    /// First byte offset (inclusive)
    pub start: u64,
    /// One past the last byte offset (exclusive)
    pub end: u64,
}

impl ByteRange {
    /// Number of bytes covered
    pub fn len(&self) -> u64 {
        self.end.saturating_sub(self.start)
    }

    /// True if the range covers no bytes
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Value for the HTTP `Range` request header.
    ///
    /// HTTP byte ranges are inclusive on both ends, so `[0, 8)` becomes
    /// `bytes=0-7`.
    pub fn header_value(&self) -> String {
        format!("bytes={}-{}", self.start, self.end.saturating_sub(1))
    }
}

impl std::fmt::Display for ByteRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "bytes {}-{}", self.start, self.end.saturating_sub(1))
    }
}

/// Object key of a snapshot artifact:
/// `{prefix}_{epoch}_{YYYY-MM-DD_HH-MM-SS}.{ext}`
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ArtifactId {
    /// Key prefix (e.g. "minimal_finality_stateroots")
    pub prefix: String,
    /// Epoch of the timestamp
    pub epoch: Epoch,
    /// Timestamp the artifact is named after
    pub timestamp: Timestamp,
    /// File extension without the dot
    pub extension: String,
}

impl ArtifactId {
    /// Name the artifact for `timestamp`.
    ///
    /// Fails with [`Error::InvalidEpoch`] for timestamps before genesis.
    pub fn for_timestamp(timestamp: Timestamp, naming: &ArtifactNaming) -> Result<Self> {
        let epoch = timestamp.epoch();
        if !epoch.is_valid() {
            return Err(Error::InvalidEpoch { epoch: epoch.get() });
        }
        Ok(Self {
            prefix: naming.prefix.clone(),
            epoch,
            timestamp,
            extension: naming.extension.clone(),
        })
    }

    /// Full URL of the artifact under `host`
    pub fn url(&self, host: &str) -> String {
        format!("{}/{}", host.trim_end_matches('/'), self)
    }
}

impl std::fmt::Display for ArtifactId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}_{}_{}.{}",
            self.prefix, self.epoch, self.timestamp, self.extension
        )
    }
}

/// A confirmed-existing artifact
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Located {
    /// Artifact identifier that matched
    pub artifact: ArtifactId,
    /// URL the artifact lives at
    pub url: String,
    /// Total size reported by the store
    pub content_length: u64,
    /// Number of probes it took (1 = found on the first try)
    pub probes: u32,
}

/// Outcome of a single existence probe
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ProbeOutcome {
    /// The store reported full or partial content available
    Found {
        /// Total size of the object
        content_length: u64,
    },
    /// Any other status
    Missing {
        /// HTTP status returned by the store
        status: u16,
    },
}

/// A fully joined download
///
/// Returned once every partition has finished, whether or not all of them
/// succeeded. Check [`CompletedFile::is_complete`] (or call
/// [`CompletedFile::ensure_complete`]) before trusting the contents.
#[derive(Debug)]
pub struct CompletedFile {
    /// Where the artifact was written
    pub path: PathBuf,
    /// Handle of the destination file
    pub file: std::fs::File,
    /// Expected artifact size
    pub content_length: u64,
    /// Number of partitions the transfer was split into
    pub partitions: usize,
    /// Failures recorded by individual partitions
    pub partition_errors: Vec<PartitionError>,
}

impl CompletedFile {
    /// True when every partition finished without error
    pub fn is_complete(&self) -> bool {
        self.partition_errors.is_empty()
    }

    /// Destination path
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Turn recorded partition failures into [`Error::IncompleteDownload`].
    pub fn ensure_complete(self) -> Result<Self> {
        match self.partition_errors.first() {
            None => Ok(self),
            Some(first) => Err(Error::IncompleteDownload {
                failed: self.partition_errors.len(),
                total: self.partitions,
                first_error: first.to_string(),
            }),
        }
    }
}

/// What [`crate::SnapshotClient::locate_and_fetch`] produced
#[derive(Debug)]
pub enum FetchOutcome {
    /// Report-only mode: the resolved URL, nothing was transferred
    Reported(String),
    /// The artifact was transferred to disk
    Downloaded(CompletedFile),
}

impl FetchOutcome {
    /// The completed file, if a transfer happened
    pub fn into_file(self) -> Option<CompletedFile> {
        match self {
            FetchOutcome::Downloaded(f) => Some(f),
            FetchOutcome::Reported(_) => None,
        }
    }

    /// The reported URL, in report-only mode
    pub fn reported_url(&self) -> Option<&str> {
        match self {
            FetchOutcome::Reported(url) => Some(url),
            FetchOutcome::Downloaded(_) => None,
        }
    }
}

/// Event emitted while locating and downloading a snapshot
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// A candidate is about to be probed
    Probing {
        /// Zero-based attempt number
        attempt: u32,
        /// Candidate URL
        url: String,
    },

    /// The candidate did not exist
    ProbeMissed {
        /// Zero-based attempt number
        attempt: u32,
        /// Candidate URL
        url: String,
        /// HTTP status returned by the store
        status: u16,
    },

    /// A candidate was found
    Located {
        /// Artifact URL
        url: String,
        /// Artifact size in bytes
        content_length: u64,
    },

    /// Probe budget ran out
    LocatorExhausted {
        /// Number of probes issued
        attempts: u32,
    },

    /// Transfer started
    DownloadStarted {
        /// Artifact URL
        url: String,
        /// Destination path
        path: PathBuf,
        /// Number of partitions
        partitions: usize,
        /// Artifact size in bytes
        total_bytes: u64,
    },

    /// Periodic progress update
    Downloading {
        /// Progress percentage (0.0 to 100.0)
        percent: f32,
        /// Current speed in bytes per second
        speed_bps: u64,
        /// Bytes written so far
        bytes_downloaded: u64,
        /// Artifact size in bytes
        total_bytes: u64,
    },

    /// A partition finished its range
    PartitionComplete {
        /// The finished range
        range: ByteRange,
    },

    /// A partition failed
    PartitionFailed {
        /// The failed range
        range: ByteRange,
        /// Error message
        error: String,
    },

    /// All partitions joined
    DownloadComplete {
        /// Destination path
        path: PathBuf,
        /// Number of partitions that failed
        #[serde(skip_serializing_if = "Option::is_none")]
        partitions_failed: Option<usize>,
    },
}
