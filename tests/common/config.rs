//! Test configuration helpers

use snapshot_dl::{Config, DiskSpaceConfig, RetryConfig};
use std::path::Path;
use std::time::Duration;
use wiremock::MockServer;

/// Configuration pointing at `server`, downloading into `download_dir`
pub fn test_config(server: &MockServer, download_dir: &Path) -> Config {
    Config {
        host: server.uri(),
        download_dir: download_dir.to_path_buf(),
        request_timeout: Duration::from_secs(10),
        partition_retry: RetryConfig {
            max_attempts: 1,
            initial_delay: Duration::from_millis(10),
            max_delay: Duration::from_millis(50),
            backoff_multiplier: 2.0,
            jitter: false,
        },
        disk_space: DiskSpaceConfig {
            min_free_space: 0,
            ..DiskSpaceConfig::default()
        },
        ..Config::default()
    }
}
