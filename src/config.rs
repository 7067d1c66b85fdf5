//! Configuration types for office-to-OpenDocument conversion.
//!
//! All conversion behaviour is controlled through [`ConversionConfig`], built
//! via its [`ConversionConfigBuilder`]. One struct, shared behind an `Arc` by
//! every clone of [`crate::Converter`], so concurrent requests read the same
//! settings without locking.

use crate::error::ConvertError;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Default upload ceiling: 100 MiB.
pub const DEFAULT_MAX_INPUT_BYTES: usize = 100 * 1024 * 1024;

/// Configuration for a conversion.
///
/// Built via [`ConversionConfig::builder()`] or using
/// [`ConversionConfig::default()`].
///
/// # Example
/// ```rust
/// use office2odf::ConversionConfig;
///
/// let config = ConversionConfig::builder()
///     .soffice_path("/usr/bin/soffice")
///     .external_timeout_secs(120)
///     .build()
///     .unwrap();
/// assert_eq!(config.external_timeout_secs, 120);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversionConfig {
    /// LibreOffice executable. Default: `soffice` (resolved through `PATH`).
    pub soffice_path: PathBuf,

    /// Wall-clock limit for one LibreOffice run, in seconds. Range: 1–3600. Default: 60.
    ///
    /// LibreOffice is known to hang on malformed and password-protected
    /// inputs; on expiry the child is killed and the request fails with
    /// [`ConvertError::ExternalTimeout`].
    pub external_timeout_secs: u64,

    /// Directory for temporary input/output artifacts. Default: the OS temp dir.
    pub work_dir: Option<PathBuf>,

    /// Reject uploads larger than this many bytes. `None` disables the check.
    /// Default: 100 MiB.
    pub max_input_bytes: Option<usize>,

    /// Use in-process translation for the formats that support it. Default: true.
    ///
    /// When false every supported format goes through LibreOffice, trading
    /// speed for layout fidelity.
    pub native_enabled: bool,
}

impl Default for ConversionConfig {
    fn default() -> Self {
        Self {
            soffice_path: PathBuf::from("soffice"),
            external_timeout_secs: 60,
            work_dir: None,
            max_input_bytes: Some(DEFAULT_MAX_INPUT_BYTES),
            native_enabled: true,
        }
    }
}

impl ConversionConfig {
    /// Create a new builder for `ConversionConfig`.
    pub fn builder() -> ConversionConfigBuilder {
        ConversionConfigBuilder {
            config: Self::default(),
        }
    }

    pub fn external_timeout(&self) -> Duration {
        Duration::from_secs(self.external_timeout_secs)
    }

    /// Directory temp artifacts are created in.
    pub fn resolved_work_dir(&self) -> PathBuf {
        self.work_dir.clone().unwrap_or_else(std::env::temp_dir)
    }
}

/// Builder for [`ConversionConfig`].
#[derive(Debug)]
pub struct ConversionConfigBuilder {
    config: ConversionConfig,
}

impl ConversionConfigBuilder {
    pub fn soffice_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.soffice_path = path.into();
        self
    }

    pub fn external_timeout_secs(mut self, secs: u64) -> Self {
        self.config.external_timeout_secs = secs;
        self
    }

    pub fn work_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.work_dir = Some(dir.into());
        self
    }

    pub fn max_input_bytes(mut self, limit: Option<usize>) -> Self {
        self.config.max_input_bytes = limit;
        self
    }

    pub fn native_enabled(mut self, v: bool) -> Self {
        self.config.native_enabled = v;
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ConversionConfig, ConvertError> {
        let c = &self.config;
        if c.external_timeout_secs == 0 || c.external_timeout_secs > 3600 {
            return Err(ConvertError::InvalidConfig(format!(
                "External timeout must be 1–3600 seconds, got {}",
                c.external_timeout_secs
            )));
        }
        if c.soffice_path.as_os_str().is_empty() {
            return Err(ConvertError::InvalidConfig(
                "LibreOffice path must not be empty".into(),
            ));
        }
        if c.max_input_bytes == Some(0) {
            return Err(ConvertError::InvalidConfig(
                "max_input_bytes must be ≥ 1 (use None to disable)".into(),
            ));
        }
        if let Some(ref dir) = c.work_dir {
            if !dir.is_dir() {
                return Err(ConvertError::InvalidConfig(format!(
                    "Work directory '{}' does not exist",
                    dir.display()
                )));
            }
        }
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let c = ConversionConfig::default();
        assert_eq!(c.soffice_path, PathBuf::from("soffice"));
        assert_eq!(c.external_timeout(), Duration::from_secs(60));
        assert_eq!(c.max_input_bytes, Some(DEFAULT_MAX_INPUT_BYTES));
        assert!(c.native_enabled);
        assert_eq!(c.resolved_work_dir(), std::env::temp_dir());
    }

    #[test]
    fn builder_rejects_zero_timeout() {
        let err = ConversionConfig::builder()
            .external_timeout_secs(0)
            .build()
            .unwrap_err();
        assert!(matches!(err, ConvertError::InvalidConfig(_)));
    }

    #[test]
    fn builder_rejects_missing_work_dir() {
        let err = ConversionConfig::builder()
            .work_dir("/definitely/not/a/real/dir")
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("does not exist"));
    }

    #[test]
    fn builder_accepts_existing_work_dir() {
        let dir = tempfile::tempdir().unwrap();
        let c = ConversionConfig::builder()
            .work_dir(dir.path())
            .native_enabled(false)
            .max_input_bytes(None)
            .build()
            .unwrap();
        assert_eq!(c.resolved_work_dir(), dir.path());
        assert!(!c.native_enabled);
        assert_eq!(c.max_input_bytes, None);
    }
}
