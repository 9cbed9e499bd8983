//! Configuration for the transform pipeline.
//!
//! All of this is read-only after process start: a config is built once from
//! the invocation options, validated, and then shared by every component of
//! the pipeline for the lifetime of the job.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default filename pattern for governed objects.
pub const DEFAULT_GOVERNED_SUFFIX: &str = ".fastq";

/// Default bounded wait for the object lock.
pub const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(30);

/// Default gzip compression level (flate2 default).
pub const DEFAULT_COMPRESSION_LEVEL: u32 = 6;

/// Settings shared by every component of a pipeline invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Root of the governed collection; only objects strictly under this
    /// root are ever transformed
    pub collection_root: PathBuf,
    /// Filename suffix an object must carry to be governed (e.g. ".fastq")
    pub governed_suffix: String,
    /// Scratch root inside the object store for swap files and lock files
    pub remote_scratch_root: PathBuf,
    /// Scratch root on the local filesystem for staged copies
    pub local_scratch_root: PathBuf,
    /// Remove remote scratch files when the job ends (off = debug retention)
    pub delete_remote_scratch: bool,
    /// Remove local scratch files when the job ends (off = debug retention)
    pub delete_local_scratch: bool,
    /// Bounded wait for the object lock before the job fails
    pub lock_timeout: Duration,
    /// Age after which a lock left by a crashed holder may be stolen
    pub lock_stale_after: Duration,
    /// Gzip level, 0 (store) through 9 (maximum)
    pub compression_level: u32,
}

impl PipelineConfig {
    /// Create a configuration for the given collection root with defaults
    /// for everything else.
    ///
    /// The remote scratch root defaults to a `.atrest` directory beside the
    /// collection root (scratch leaves never match the governed suffix, so
    /// they are invisible to the path filter); the local scratch root
    /// defaults to an `atrest` directory under the system temp dir. The
    /// staleness ceiling defaults to 10x the lock timeout.
    pub fn new<P: AsRef<Path>>(collection_root: P) -> Self {
        let collection_root = collection_root.as_ref().to_path_buf();
        let remote_scratch_root = collection_root
            .parent()
            .map(|p| p.join(".atrest"))
            .unwrap_or_else(|| PathBuf::from(".atrest"));
        Self {
            collection_root,
            governed_suffix: DEFAULT_GOVERNED_SUFFIX.to_string(),
            remote_scratch_root,
            local_scratch_root: std::env::temp_dir().join("atrest"),
            delete_remote_scratch: true,
            delete_local_scratch: true,
            lock_timeout: DEFAULT_LOCK_TIMEOUT,
            lock_stale_after: DEFAULT_LOCK_TIMEOUT * 10,
            compression_level: DEFAULT_COMPRESSION_LEVEL,
        }
    }

    /// Set the governed filename suffix
    pub fn with_governed_suffix<S: Into<String>>(mut self, suffix: S) -> Self {
        self.governed_suffix = suffix.into();
        self
    }

    /// Set the remote scratch root
    pub fn with_remote_scratch_root<P: AsRef<Path>>(mut self, root: P) -> Self {
        self.remote_scratch_root = root.as_ref().to_path_buf();
        self
    }

    /// Set the local scratch root
    pub fn with_local_scratch_root<P: AsRef<Path>>(mut self, root: P) -> Self {
        self.local_scratch_root = root.as_ref().to_path_buf();
        self
    }

    /// Set both retention toggles (true = delete scratch when the job ends)
    pub fn with_scratch_deletion(mut self, delete_remote: bool, delete_local: bool) -> Self {
        self.delete_remote_scratch = delete_remote;
        self.delete_local_scratch = delete_local;
        self
    }

    /// Set the lock timeout, keeping the staleness ceiling at 10x
    pub fn with_lock_timeout(mut self, timeout: Duration) -> Self {
        self.lock_timeout = timeout;
        self.lock_stale_after = timeout * 10;
        self
    }

    /// Set the staleness ceiling independently of the timeout
    pub fn with_lock_stale_after(mut self, stale_after: Duration) -> Self {
        self.lock_stale_after = stale_after;
        self
    }

    /// Set the gzip compression level
    pub fn with_compression_level(mut self, level: u32) -> Self {
        self.compression_level = level;
        self
    }

    /// Directory under the remote scratch root where lock files live.
    pub fn lock_dir(&self) -> PathBuf {
        self.remote_scratch_root.join("locks")
    }

    /// Validate the configuration.
    pub fn validate(&self) -> crate::Result<()> {
        if self.collection_root.as_os_str().is_empty() {
            return Err(crate::AtRestError::configuration(
                "collection root must not be empty",
            ));
        }
        if self.governed_suffix.is_empty() || !self.governed_suffix.starts_with('.') {
            return Err(crate::AtRestError::configuration(format!(
                "governed suffix must start with '.': {:?}",
                self.governed_suffix
            )));
        }
        if self.remote_scratch_root.as_os_str().is_empty()
            || self.local_scratch_root.as_os_str().is_empty()
        {
            return Err(crate::AtRestError::configuration(
                "scratch roots must not be empty",
            ));
        }
        if self.compression_level > 9 {
            return Err(crate::AtRestError::configuration(format!(
                "compression level must be 0-9, got {}",
                self.compression_level
            )));
        }
        if self.lock_stale_after < self.lock_timeout {
            return Err(crate::AtRestError::configuration(
                "lock staleness ceiling must not be shorter than the lock timeout",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = PipelineConfig::new("/zone/home/a/iplant");
        assert_eq!(config.governed_suffix, ".fastq");
        assert!(config.delete_remote_scratch);
        assert!(config.delete_local_scratch);
        assert_eq!(config.compression_level, DEFAULT_COMPRESSION_LEVEL);
        assert_eq!(config.lock_stale_after, config.lock_timeout * 10);
        assert_eq!(
            config.remote_scratch_root,
            PathBuf::from("/zone/home/a/.atrest")
        );
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_lock_dir_under_remote_scratch() {
        let config = PipelineConfig::new("/zone/home/a/iplant");
        assert_eq!(config.lock_dir(), PathBuf::from("/zone/home/a/.atrest/locks"));
    }

    #[test]
    fn test_validate_rejects_bad_suffix() {
        let config = PipelineConfig::new("/zone/home/a/iplant").with_governed_suffix("fastq");
        assert!(config.validate().is_err());

        let config = PipelineConfig::new("/zone/home/a/iplant").with_governed_suffix("");
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_bad_level() {
        let config = PipelineConfig::new("/zone/home/a/iplant").with_compression_level(10);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_stale_window_below_timeout() {
        let config = PipelineConfig::new("/zone/home/a/iplant")
            .with_lock_timeout(Duration::from_secs(30))
            .with_lock_stale_after(Duration::from_secs(1));
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_with_lock_timeout_scales_staleness() {
        let config =
            PipelineConfig::new("/zone/home/a/iplant").with_lock_timeout(Duration::from_secs(2));
        assert_eq!(config.lock_stale_after, Duration::from_secs(20));
        assert!(config.validate().is_ok());
    }
}
