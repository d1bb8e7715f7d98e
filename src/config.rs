//! Configuration for the conversion handler.
//!
//! Every filesystem location the handler touches is a field here rather than
//! a constant buried in the code, so tests and non-Lambda deployments can
//! point the handler at their own directories. Defaults match the Lambda
//! layout: archive in the read-only `/opt` layer, everything else in `/tmp`.

use crate::error::HandlerError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default LibreOffice export filter token for `--convert-to`.
pub const DEFAULT_EXPORT_FILTER: &str = "pdf:writer_pdf_Export";

/// Configuration for an [`crate::handler::EventHandler`].
///
/// Built via [`HandlerConfig::builder()`] or using
/// [`HandlerConfig::default()`].
///
/// # Example
/// ```rust
/// use office2pdf_lambda::HandlerConfig;
///
/// let config = HandlerConfig::builder()
///     .scratch_dir("/mnt/scratch")
///     .conversion_timeout_secs(60)
///     .build()
///     .unwrap();
/// assert_eq!(config.engine_path().to_str(), Some("/mnt/scratch/lo/instdir/program/soffice.bin"));
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HandlerConfig {
    /// Compressed LibreOffice installation. Default: `/opt/lo.tar.br`.
    pub archive_path: PathBuf,

    /// Writable scratch root reused across warm invocations. Default: `/tmp`.
    ///
    /// The engine is unpacked here and input files are staged under their
    /// object key relative to this directory.
    pub scratch_dir: PathBuf,

    /// Engine executable relative to `scratch_dir`.
    /// Default: `lo/instdir/program/soffice.bin`.
    pub engine_relative_path: PathBuf,

    /// `HOME` for the engine process. LibreOffice writes its user profile and
    /// lock files there. If None, uses `scratch_dir`.
    pub home_dir: Option<PathBuf>,

    /// Filter token passed to `--convert-to`. Default: `pdf:writer_pdf_Export`.
    pub export_filter: String,

    /// Upper bound on a single engine run, in seconds. Default: 120.
    ///
    /// A hung soffice would otherwise burn the whole Lambda time budget.
    pub conversion_timeout_secs: u64,

    /// Extra attempts after a transient engine failure. Default: 1.
    ///
    /// Only the first-start restart exit code counts as transient; every
    /// other failure is returned immediately.
    pub max_conversion_retries: u32,

    /// Delay before a retry, in milliseconds. Default: 500.
    pub retry_backoff_ms: u64,
}

impl Default for HandlerConfig {
    fn default() -> Self {
        Self {
            archive_path: PathBuf::from(lo_unpack::DEFAULT_ARCHIVE_PATH),
            scratch_dir: PathBuf::from(lo_unpack::DEFAULT_TARGET_DIR),
            engine_relative_path: PathBuf::from(lo_unpack::DEFAULT_ENGINE_PATH),
            home_dir: None,
            export_filter: DEFAULT_EXPORT_FILTER.to_string(),
            conversion_timeout_secs: 120,
            max_conversion_retries: 1,
            retry_backoff_ms: 500,
        }
    }
}

impl HandlerConfig {
    /// Create a new builder for `HandlerConfig`.
    pub fn builder() -> HandlerConfigBuilder {
        HandlerConfigBuilder {
            config: Self::default(),
        }
    }

    /// Absolute path of the engine executable.
    pub fn engine_path(&self) -> PathBuf {
        self.scratch_dir.join(&self.engine_relative_path)
    }

    pub fn home_dir(&self) -> &Path {
        self.home_dir.as_deref().unwrap_or(&self.scratch_dir)
    }

    pub fn conversion_timeout(&self) -> Duration {
        Duration::from_secs(self.conversion_timeout_secs)
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }
}

/// Builder for [`HandlerConfig`].
#[derive(Debug)]
pub struct HandlerConfigBuilder {
    config: HandlerConfig,
}

impl HandlerConfigBuilder {
    pub fn archive_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.archive_path = path.into();
        self
    }

    pub fn scratch_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.scratch_dir = path.into();
        self
    }

    pub fn engine_relative_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.engine_relative_path = path.into();
        self
    }

    pub fn home_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.home_dir = Some(path.into());
        self
    }

    pub fn export_filter(mut self, filter: impl Into<String>) -> Self {
        self.config.export_filter = filter.into();
        self
    }

    pub fn conversion_timeout_secs(mut self, secs: u64) -> Self {
        self.config.conversion_timeout_secs = secs;
        self
    }

    pub fn max_conversion_retries(mut self, n: u32) -> Self {
        self.config.max_conversion_retries = n;
        self
    }

    pub fn retry_backoff_ms(mut self, ms: u64) -> Self {
        self.config.retry_backoff_ms = ms;
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<HandlerConfig, HandlerError> {
        let c = &self.config;
        if c.conversion_timeout_secs == 0 {
            return Err(HandlerError::InvalidConfig(
                "Conversion timeout must be ≥ 1 second".into(),
            ));
        }
        if c.export_filter.trim().is_empty() {
            return Err(HandlerError::InvalidConfig(
                "Export filter must not be empty".into(),
            ));
        }
        if c.engine_relative_path.as_os_str().is_empty() || c.engine_relative_path.is_absolute() {
            return Err(HandlerError::InvalidConfig(format!(
                "Engine path must be relative to the scratch dir, got '{}'",
                c.engine_relative_path.display()
            )));
        }
        if c.scratch_dir.as_os_str().is_empty() {
            return Err(HandlerError::InvalidConfig(
                "Scratch dir must not be empty".into(),
            ));
        }
        Ok(self.config)
    }
}
