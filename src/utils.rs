//! Utility functions for destination paths and disk space

use crate::config::{Config, DiskSpaceConfig};
use crate::error::{Error, Result};
use crate::types::ArtifactId;
use std::path::{Path, PathBuf};

/// Destination file for `artifact`.
///
/// An explicit `output_path` wins; otherwise the artifact's object name is
/// placed inside `download_dir`.
///
/// # Examples
///
/// ```
/// use snapshot_dl::config::Config;
/// use snapshot_dl::epoch::Timestamp;
/// use snapshot_dl::types::ArtifactId;
/// use snapshot_dl::utils::resolve_output_path;
/// use std::path::Path;
///
/// let config = Config { download_dir: "/data".into(), ..Config::default() };
/// let ts = Timestamp::parse("2022-02-28_08-00-00").unwrap();
/// let artifact = ArtifactId::for_timestamp(ts, &config.naming).unwrap();
/// assert_eq!(
///     resolve_output_path(&config, &artifact),
///     Path::new("/data/minimal_finality_stateroots_1590960_2022-02-28_08-00-00.car"),
/// );
/// ```
pub fn resolve_output_path(config: &Config, artifact: &ArtifactId) -> PathBuf {
    match &config.output_path {
        Some(path) => path.clone(),
        None => config.download_dir.join(artifact.to_string()),
    }
}

/// Directory whose filesystem will hold `destination`
fn containing_dir(destination: &Path) -> &Path {
    match destination.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    }
}

/// Check there is room for a `content_length`-byte artifact at `destination`.
///
/// Requires `content_length * size_multiplier + min_free_space` bytes free on
/// the filesystem of the destination's directory. Does nothing when the check
/// is disabled.
pub fn check_disk_space(
    destination: &Path,
    content_length: u64,
    config: &DiskSpaceConfig,
) -> Result<()> {
    if !config.enabled {
        return Ok(());
    }

    let required = (content_length as f64 * config.size_multiplier) as u64;
    let required_with_buffer = required.saturating_add(config.min_free_space);

    let check_path = containing_dir(destination);
    let available = get_available_space(check_path).map_err(|e| {
        Error::DiskSpaceCheckFailed(format!(
            "Failed to check disk space for '{}': {}",
            check_path.display(),
            e
        ))
    })?;

    tracing::debug!(
        path = %check_path.display(),
        required = required_with_buffer,
        available,
        "disk space check"
    );

    if available < required_with_buffer {
        return Err(Error::InsufficientSpace {
            required: required_with_buffer,
            available,
        });
    }

    Ok(())
}

/// Get available disk space for the filesystem containing `path`
///
/// Returns the available disk space in bytes, or an IO error if the check fails.
pub fn get_available_space(path: &Path) -> std::io::Result<u64> {
    #[cfg(unix)]
    {
        use std::ffi::CString;
        use std::os::unix::ffi::OsStrExt;

        let c_path = CString::new(path.as_os_str().as_bytes())
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidInput, e))?;

        // SAFETY: c_path is a valid null-terminated string, stat is zeroed and
        // only read after statvfs reports success.
        unsafe {
            let mut stat: libc::statvfs = std::mem::zeroed();
            if libc::statvfs(c_path.as_ptr(), &mut stat) != 0 {
                return Err(std::io::Error::last_os_error());
            }

            // f_bavail counts blocks available to unprivileged users
            #[allow(clippy::unnecessary_cast)]
            let available_bytes = (stat.f_bavail as u64).saturating_mul(stat.f_frsize as u64);
            Ok(available_bytes)
        }
    }

    #[cfg(windows)]
    {
        use std::os::windows::ffi::OsStrExt;
        use winapi::um::fileapi::GetDiskFreeSpaceExW;

        let wide_path: Vec<u16> = path
            .as_os_str()
            .encode_wide()
            .chain(std::iter::once(0))
            .collect();

        // SAFETY: wide_path is null-terminated and every out-pointer refers to
        // a live u64 read only after the call succeeds.
        unsafe {
            let mut free_bytes_available: u64 = 0;
            let mut total_bytes: u64 = 0;
            let mut total_free_bytes: u64 = 0;

            if GetDiskFreeSpaceExW(
                wide_path.as_ptr(),
                &mut free_bytes_available as *mut u64 as *mut _,
                &mut total_bytes as *mut u64 as *mut _,
                &mut total_free_bytes as *mut u64 as *mut _,
            ) == 0
            {
                return Err(std::io::Error::last_os_error());
            }

            Ok(free_bytes_available)
        }
    }

    #[cfg(not(any(unix, windows)))]
    {
        let _ = path;
        Err(std::io::Error::new(
            std::io::ErrorKind::Unsupported,
            "Disk space checking is not supported on this platform",
        ))
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use crate::epoch::Timestamp;
    use tempfile::TempDir;

    fn artifact() -> ArtifactId {
        let ts = Timestamp::parse("2022-02-28_08-00-00").unwrap();
        ArtifactId::for_timestamp(ts, &Default::default()).unwrap()
    }

    #[test]
    fn output_path_defaults_to_artifact_name_in_download_dir() {
        let config = Config {
            download_dir: PathBuf::from("snapshots"),
            ..Config::default()
        };
        assert_eq!(
            resolve_output_path(&config, &artifact()),
            Path::new("snapshots/minimal_finality_stateroots_1590960_2022-02-28_08-00-00.car")
        );
    }

    #[test]
    fn explicit_output_path_wins() {
        let config = Config {
            output_path: Some(PathBuf::from("/tmp/latest.car")),
            ..Config::default()
        };
        assert_eq!(
            resolve_output_path(&config, &artifact()),
            Path::new("/tmp/latest.car")
        );
    }

    #[test]
    fn containing_dir_of_bare_file_name_is_cwd() {
        assert_eq!(containing_dir(Path::new("out.car")), Path::new("."));
        assert_eq!(containing_dir(Path::new("a/out.car")), Path::new("a"));
    }

    #[test]
    fn available_space_for_temp_dir() {
        let temp_dir = TempDir::new().unwrap();
        let available = get_available_space(temp_dir.path()).unwrap();
        assert!(available > 0);
    }

    #[test]
    fn available_space_for_missing_path_fails() {
        let result = get_available_space(Path::new("/nonexistent/path/that/should/not/exist"));
        assert!(result.is_err());
    }

    #[test]
    fn disk_space_check_passes_for_small_artifact() {
        let temp_dir = TempDir::new().unwrap();
        let config = DiskSpaceConfig {
            min_free_space: 0,
            ..DiskSpaceConfig::default()
        };
        check_disk_space(&temp_dir.path().join("x.car"), 1024, &config).unwrap();
    }

    #[test]
    fn disk_space_check_rejects_oversized_artifact() {
        let temp_dir = TempDir::new().unwrap();
        let err = check_disk_space(
            &temp_dir.path().join("x.car"),
            u64::MAX / 2,
            &DiskSpaceConfig::default(),
        )
        .unwrap_err();
        assert!(matches!(err, Error::InsufficientSpace { .. }));
    }

    #[test]
    fn disabled_disk_space_check_always_passes() {
        let config = DiskSpaceConfig {
            enabled: false,
            ..DiskSpaceConfig::default()
        };
        check_disk_space(Path::new("/nonexistent/dir/x.car"), u64::MAX, &config).unwrap();
    }

    #[test]
    fn disk_space_check_on_missing_dir_reports_failure() {
        let err = check_disk_space(
            Path::new("/nonexistent/path/that/should/not/exist/x.car"),
            1,
            &DiskSpaceConfig::default(),
        )
        .unwrap_err();
        assert!(matches!(err, Error::DiskSpaceCheckFailed(_)));
    }
}
