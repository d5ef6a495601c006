//! Error types for snapshot-dl
//!
//! This module provides the error taxonomy for the library:
//! - Codec errors (unparsable dates, negative epochs)
//! - Locator errors (exhausted probe budget, transport failures)
//! - Per-partition download errors, recorded rather than propagated
//! - Local filesystem and configuration errors

use crate::types::ByteRange;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for snapshot-dl operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for snapshot-dl
///
/// Locator and setup failures surface through this type and terminate the
/// operation. Failures of individual download partitions are reported as
/// [`PartitionError`]s on the completed file instead.
#[derive(Debug, Error)]
pub enum Error {
    /// Input text does not match the `YYYY-MM-DD_HH-MM-SS` layout
    #[error("date cannot be parsed: {input:?} ({reason})")]
    DateParse {
        /// The text that failed to parse
        input: String,
        /// Parser diagnostic
        reason: String,
    },

    /// Negative epoch given to the inverse conversion
    #[error("epoch given must be >= 0, got {epoch}")]
    InvalidEpoch {
        /// The rejected epoch value
        epoch: i64,
    },

    /// Advancing a timestamp left the four-digit-year range
    #[error("timestamp {timestamp} plus {hours} hour(s) is out of range")]
    TimestampOutOfRange {
        /// The timestamp being advanced
        timestamp: String,
        /// Hours that were added
        hours: i64,
    },

    /// No artifact was found within the configured number of probes
    #[error("no snapshot found after {attempts} attempt(s)")]
    LocatorExhausted {
        /// Number of probes issued before giving up
        attempts: u32,
        /// URL of the last candidate probed (None when no probe was issued)
        last_url: Option<String>,
    },

    /// Network-level failure talking to the remote store
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The store confirmed an object but did not say how large it is
    #[error("no usable Content-Length for {url}")]
    MissingContentLength {
        /// URL of the object
        url: String,
    },

    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "host")
        key: Option<String>,
    },

    /// Local file creation or write failure
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Destination file could not be created
    #[error("could not create file {path}: {source}")]
    CreateFile {
        /// The path that could not be created
        path: PathBuf,
        /// Underlying I/O error
        source: std::io::Error,
    },

    /// Insufficient disk space for the artifact
    #[error("insufficient disk space: need {required} bytes, have {available} bytes")]
    InsufficientSpace {
        /// Number of bytes required for the operation
        required: u64,
        /// Number of bytes currently available on disk
        available: u64,
    },

    /// Failed to check disk space
    #[error("failed to check disk space: {0}")]
    DiskSpaceCheckFailed(String),

    /// One or more partitions failed and strict mode is enabled
    #[error("{failed} of {total} partitions failed, first error: {first_error}")]
    IncompleteDownload {
        /// Number of failed partitions
        failed: usize,
        /// Total number of partitions
        total: usize,
        /// Rendering of the first partition error
        first_error: String,
    },

    /// The operation was cancelled through its cancellation token
    #[error("operation cancelled")]
    Cancelled,

    /// Serialization error (config files, events)
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    /// Machine-readable error code, for callers that map errors to exit codes
    /// or structured output.
    pub fn code(&self) -> &'static str {
        match self {
            Error::DateParse { .. } => "date_parse",
            Error::InvalidEpoch { .. } => "invalid_epoch",
            Error::TimestampOutOfRange { .. } => "timestamp_out_of_range",
            Error::LocatorExhausted { .. } => "locator_exhausted",
            Error::Transport(_) => "transport_error",
            Error::MissingContentLength { .. } => "missing_content_length",
            Error::Config { .. } => "config_error",
            Error::Io(_) => "io_error",
            Error::CreateFile { .. } => "create_file_failed",
            Error::InsufficientSpace { .. } => "insufficient_space",
            Error::DiskSpaceCheckFailed(_) => "disk_space_check_failed",
            Error::IncompleteDownload { .. } => "incomplete_download",
            Error::Cancelled => "cancelled",
            Error::Serialization(_) => "serialization_error",
        }
    }

    pub(crate) fn config(message: impl Into<String>, key: &str) -> Self {
        Error::Config {
            message: message.into(),
            key: Some(key.to_string()),
        }
    }
}

/// Failure of a single download partition
///
/// Partition failures never abort sibling partitions; they are collected and
/// returned alongside the destination file.
#[derive(Debug, Error)]
#[error("partition {range}: {kind}")]
pub struct PartitionError {
    /// Byte range the partition was responsible for
    pub range: ByteRange,
    /// What went wrong
    pub kind: PartitionErrorKind,
}

/// Classification of a partition failure
#[derive(Debug, Error)]
pub enum PartitionErrorKind {
    /// Network-level failure on the ranged request or while streaming its body
    #[error("transport error: {0}")]
    Transport(#[source] reqwest::Error),

    /// Remote answered with something other than 206 Partial Content
    #[error("server response: {status}, expected: 206")]
    UnexpectedStatus {
        /// HTTP status returned by the remote
        status: u16,
    },

    /// Positional write into the destination file failed
    #[error("could not write to file: {0}")]
    Io(#[source] std::io::Error),

    /// Body ended before (or ran past) the end of the requested range
    #[error("received {received} of {expected} bytes")]
    ShortBody {
        /// Bytes the range called for
        expected: u64,
        /// Bytes actually written
        received: u64,
    },

    /// The transfer was cancelled before it finished
    #[error("cancelled")]
    Cancelled,

    /// The partition task panicked or was aborted
    #[error("partition task failed: {0}")]
    TaskFailed(String),
}
