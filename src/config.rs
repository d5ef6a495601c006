//! Configuration types for snapshot-dl

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{Error, Result};

/// Public bucket the mainnet snapshots are published to
pub const DEFAULT_HOST: &str = "https://fil-chain-snapshots-fallback.s3.amazonaws.com/mainnet";

/// Naming of snapshot objects in the bucket
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactNaming {
    /// Key prefix (default: "minimal_finality_stateroots")
    #[serde(default = "default_prefix")]
    pub prefix: String,

    /// File extension without the dot (default: "car")
    #[serde(default = "default_extension")]
    pub extension: String,
}

impl Default for ArtifactNaming {
    fn default() -> Self {
        Self {
            prefix: default_prefix(),
            extension: default_extension(),
        }
    }
}

/// Retry configuration for transient partition failures
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Maximum number of retry attempts (default: 3)
    #[serde(default = "default_retry_attempts")]
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

impl RetryConfig {
    /// A configuration that never retries
    pub fn disabled() -> Self {
        Self {
            max_attempts: 0,
            ..Self::default()
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_retry_attempts(),
            initial_delay: default_initial_delay(),
            max_delay: default_max_delay(),
            backoff_multiplier: default_backoff_multiplier(),
            jitter: true,
        }
    }
}

/// Pre-flight disk space check before a transfer starts
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DiskSpaceConfig {
    /// Enable disk space checking (default: true)
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Minimum free space to keep after the artifact is written (default: 1 GB)
    #[serde(default = "default_min_free_space")]
    pub min_free_space: u64,

    /// Multiplier applied to the artifact size (default: 1.0)
    #[serde(default = "default_size_multiplier")]
    pub size_multiplier: f64,
}

impl Default for DiskSpaceConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            min_free_space: default_min_free_space(),
            size_multiplier: default_size_multiplier(),
        }
    }
}

/// Main configuration for [`crate::SnapshotClient`]
///
/// Read-only once the client is built. [`Config::validate`] runs exactly
/// once, inside [`crate::SnapshotClient::new`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Config {
    /// Base URL of the bucket (default: [`DEFAULT_HOST`])
    #[serde(default = "default_host")]
    pub host: String,

    /// Maximum number of existence probes (default: 4)
    ///
    /// Each miss advances the candidate timestamp by one hour. Zero is
    /// accepted and makes every lookup fail without touching the network.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Explicit destination file (default: artifact name inside `download_dir`)
    #[serde(default)]
    pub output_path: Option<PathBuf>,

    /// Directory for derived destination paths (default: ".")
    #[serde(default = "default_download_dir")]
    pub download_dir: PathBuf,

    /// Print the resolved URL instead of downloading
    #[serde(default)]
    pub report_only: bool,

    /// Number of concurrent ranged transfers (default: 10)
    #[serde(default = "default_segments")]
    pub segments: usize,

    /// Timeout applied to every HTTP request (default: 1 hour)
    #[serde(default = "default_request_timeout", with = "duration_serde")]
    pub request_timeout: Duration,

    /// Fail the whole fetch if any partition fails (default: false)
    ///
    /// When disabled the completed file is returned with its partition
    /// errors attached.
    #[serde(default)]
    pub strict: bool,

    /// Object naming in the bucket
    #[serde(default)]
    pub naming: ArtifactNaming,

    /// Retry policy for individual partitions
    #[serde(default)]
    pub partition_retry: RetryConfig,

    /// Free space check before transfer
    #[serde(default)]
    pub disk_space: DiskSpaceConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: default_host(),
            max_attempts: default_max_attempts(),
            output_path: None,
            download_dir: default_download_dir(),
            report_only: false,
            segments: default_segments(),
            request_timeout: default_request_timeout(),
            strict: false,
            naming: ArtifactNaming::default(),
            partition_retry: RetryConfig::default(),
            disk_space: DiskSpaceConfig::default(),
        }
    }
}

impl Config {
    /// Configuration pointing at `host` with defaults for everything else
    pub fn with_host(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            ..Self::default()
        }
    }

    /// Parse a JSON configuration document
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Load a JSON configuration file
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    /// Check settings that would otherwise fail later in confusing ways.
    pub fn validate(&self) -> Result<()> {
        if self.host.trim().is_empty() {
            return Err(Error::config("host must not be empty", "host"));
        }
        let parsed = url::Url::parse(&self.host)
            .map_err(|e| Error::config(format!("invalid host URL {:?}: {}", self.host, e), "host"))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(Error::config(
                format!("unsupported URL scheme {:?}", parsed.scheme()),
                "host",
            ));
        }
        if self.segments == 0 {
            return Err(Error::config("segments must be at least 1", "segments"));
        }
        if self.request_timeout.is_zero() {
            return Err(Error::config(
                "request_timeout must be greater than zero",
                "request_timeout",
            ));
        }
        if self.naming.prefix.is_empty() {
            return Err(Error::config("prefix must not be empty", "naming.prefix"));
        }
        if self.partition_retry.backoff_multiplier < 1.0 {
            return Err(Error::config(
                "backoff_multiplier must be >= 1.0",
                "partition_retry.backoff_multiplier",
            ));
        }
        Ok(())
    }
}

fn default_host() -> String {
    DEFAULT_HOST.to_string()
}

fn default_prefix() -> String {
    "minimal_finality_stateroots".to_string()
}

fn default_extension() -> String {
    "car".to_string()
}

fn default_max_attempts() -> u32 {
    4
}

fn default_download_dir() -> PathBuf {
    PathBuf::from(".")
}

fn default_segments() -> usize {
    10
}

fn default_request_timeout() -> Duration {
    Duration::from_secs(3600)
}

fn default_true() -> bool {
    true
}

fn default_retry_attempts() -> u32 {
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

fn default_min_free_space() -> u64 {
    1024 * 1024 * 1024
}

fn default_size_multiplier() -> f64 {
    1.0
}

// Duration serialization helper
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
