//! Conversion dispatch: validate, classify, run one strategy, check output.
//!
//! ```text
//! Received ─▶ Validated ─▶ StrategySelected ─▶ Converting ─▶ Completed
//!     │            │               │                │
//!     └─ Rejected  └─ InvalidInput └─ Unsupported   └─ adapter error / EmptyOutput
//! ```
//!
//! There is exactly one attempt per request. Adapter errors pass through
//! with their own kind so callers can tell a malformed document from a
//! broken LibreOffice install.

use crate::config::ConversionConfig;
use crate::error::ConvertError;
use crate::external::ExternalConverter;
use crate::format::{self, FormatDescriptor, Strategy};
use crate::native;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// One uploaded document, borrowed for the duration of a conversion.
#[derive(Debug, Clone, Copy)]
pub struct ConversionRequest<'a> {
    pub filename: &'a str,
    pub content: &'a [u8],
}

/// A request that passed validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedName {
    /// File name without directory components or extension.
    pub base_name: String,
    /// Extension as uploaded, without the dot.
    pub extension: String,
}

impl<'a> ConversionRequest<'a> {
    pub fn new(filename: &'a str, content: &'a [u8]) -> Self {
        Self { filename, content }
    }

    /// Check the name and content, returning the name split at its last `.`.
    ///
    /// Directory components (`/` or `\`) are discarded first, so a client
    /// cannot steer the output path.
    pub fn validate(&self, max_input_bytes: Option<usize>) -> Result<ValidatedName, ConvertError> {
        let name = self
            .filename
            .rsplit(['/', '\\'])
            .next()
            .unwrap_or(self.filename)
            .trim();

        let Some((base, extension)) = name.rsplit_once('.') else {
            return Err(ConvertError::invalid_input(format!(
                "file name '{}' has no extension",
                self.filename
            )));
        };
        if base.is_empty() {
            return Err(ConvertError::invalid_input(format!(
                "file name '{}' has no base name",
                self.filename
            )));
        }
        if extension.is_empty() {
            return Err(ConvertError::invalid_input(format!(
                "file name '{}' has an empty extension",
                self.filename
            )));
        }
        if self.content.is_empty() {
            return Err(ConvertError::invalid_input("uploaded file is empty"));
        }
        if let Some(limit) = max_input_bytes {
            if self.content.len() > limit {
                return Err(ConvertError::invalid_input(format!(
                    "uploaded file is {} bytes; the limit is {} bytes",
                    self.content.len(),
                    limit
                )));
            }
        }

        Ok(ValidatedName {
            base_name: base.to_string(),
            extension: extension.to_string(),
        })
    }
}

/// A converted document. Ownership of the bytes passes to the caller.
#[derive(Debug, Clone)]
pub struct ConversionResult {
    /// The OpenDocument bytes; never empty.
    pub bytes: Vec<u8>,
    /// `<base>.<target_extension>`.
    pub filename: String,
    pub descriptor: FormatDescriptor,
}

/// Summary of [`Converter::convert_file`], suitable for JSON reports.
#[derive(Debug, Clone, Serialize)]
pub struct ConvertedFile {
    pub input: PathBuf,
    pub output: PathBuf,
    pub bytes: usize,
    pub descriptor: FormatDescriptor,
    pub duration_ms: u64,
}

/// The conversion dispatcher.
///
/// Holds only immutable configuration behind an `Arc`; clone it freely and
/// call it from as many tasks as needed.
///
/// # Example
/// ```rust,no_run
/// use office2odf::{ConversionConfig, Converter};
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let converter = Converter::new(ConversionConfig::default());
/// let content = std::fs::read("report.xlsx")?;
/// let result = converter.convert("report.xlsx", &content).await?;
/// assert_eq!(result.filename, "report.ods");
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, Default)]
pub struct Converter {
    config: Arc<ConversionConfig>,
}

impl Converter {
    pub fn new(config: ConversionConfig) -> Self {
        Self {
            config: Arc::new(config),
        }
    }

    pub fn config(&self) -> &ConversionConfig {
        &self.config
    }

    /// Registry lookup with this converter's policy applied.
    ///
    /// With `native_enabled = false` every format is routed to LibreOffice.
    pub fn resolve(&self, extension: &str) -> Option<FormatDescriptor> {
        let descriptor = format::resolve(extension)?;
        if self.config.native_enabled {
            Some(descriptor)
        } else {
            Some(FormatDescriptor {
                strategy: Strategy::External,
                ..descriptor
            })
        }
    }

    /// Convert one uploaded document to its OpenDocument counterpart.
    ///
    /// # Errors
    /// - [`ConvertError::InvalidInput`]: bad file name, empty or oversized content
    /// - [`ConvertError::UnsupportedFormat`]: extension not in the registry
    /// - [`ConvertError::StructuralConversionFailure`]: native translation failed
    /// - [`ConvertError::ExternalProcessFailure`], [`ConvertError::ExternalOutputMissing`],
    ///   [`ConvertError::ExternalTimeout`]: LibreOffice failed
    /// - [`ConvertError::EmptyOutput`]: a strategy produced zero bytes
    pub async fn convert(
        &self,
        filename: &str,
        content: &[u8],
    ) -> Result<ConversionResult, ConvertError> {
        let start = Instant::now();
        let request = ConversionRequest::new(filename, content);
        let name = request.validate(self.config.max_input_bytes)?;
        let extension = name.extension.to_ascii_lowercase();

        let descriptor = self.resolve(&extension).ok_or_else(|| {
            debug!("Rejecting unsupported extension .{}", extension);
            ConvertError::UnsupportedFormat {
                extension: extension.clone(),
                supported: format::supported_extensions(),
            }
        })?;

        info!(
            "Converting {} ({} bytes) as {} via {:?}",
            filename,
            content.len(),
            descriptor.family,
            descriptor.strategy
        );

        let bytes = match descriptor.strategy {
            Strategy::Native => self.convert_native(descriptor, &extension, content).await?,
            Strategy::External => {
                ExternalConverter::new(&self.config)
                    .convert(content, &extension, descriptor.target_extension)
                    .await?
            }
        };

        if bytes.is_empty() {
            warn!("{} produced an empty document", filename);
            return Err(ConvertError::EmptyOutput);
        }

        let output_name = format!("{}.{}", name.base_name, descriptor.target_extension);
        info!(
            "Successfully converted {} to {} ({} bytes, {}ms)",
            filename,
            output_name,
            bytes.len(),
            start.elapsed().as_millis()
        );

        Ok(ConversionResult {
            bytes,
            filename: output_name,
            descriptor,
        })
    }

    /// Native translation is CPU-bound; keep it off the async workers.
    async fn convert_native(
        &self,
        descriptor: FormatDescriptor,
        extension: &str,
        content: &[u8],
    ) -> Result<Vec<u8>, ConvertError> {
        let extension = extension.to_owned();
        let content = content.to_vec();
        tokio::task::spawn_blocking(move || native::convert(descriptor.family, &extension, &content))
            .await
            .map_err(|e| ConvertError::Internal(format!("native conversion task failed: {e}")))?
    }

    /// Synchronous wrapper around [`Converter::convert`].
    ///
    /// Creates a temporary tokio runtime internally; do not call it from
    /// inside an async context.
    pub fn convert_sync(
        &self,
        filename: &str,
        content: &[u8],
    ) -> Result<ConversionResult, ConvertError> {
        tokio::runtime::Runtime::new()
            .map_err(|e| ConvertError::Internal(format!("Failed to create tokio runtime: {}", e)))?
            .block_on(self.convert(filename, content))
    }

    /// Convert a file on disk into `output_dir`.
    ///
    /// Uses atomic write (temp file + rename) so a failed or interrupted
    /// conversion never leaves a partial document behind.
    pub async fn convert_file(
        &self,
        input: impl AsRef<Path>,
        output_dir: impl AsRef<Path>,
    ) -> Result<ConvertedFile, ConvertError> {
        let start = Instant::now();
        let input = input.as_ref();
        let output_dir = output_dir.as_ref();

        let filename = input
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| {
                ConvertError::invalid_input(format!("'{}' is not a file path", input.display()))
            })?;
        let content = tokio::fs::read(input).await.map_err(|e| {
            ConvertError::invalid_input(format!("cannot read '{}': {e}", input.display()))
        })?;

        let result = self.convert(&filename, &content).await?;
        let path = output_dir.join(&result.filename);

        tokio::fs::create_dir_all(output_dir)
            .await
            .map_err(|e| ConvertError::OutputWriteFailed {
                path: path.clone(),
                source: e,
            })?;

        let tmp_path = path.with_extension(format!("{}.tmp", result.descriptor.target_extension));
        tokio::fs::write(&tmp_path, &result.bytes)
            .await
            .map_err(|e| ConvertError::OutputWriteFailed {
                path: path.clone(),
                source: e,
            })?;

        if let Err(e) = tokio::fs::rename(&tmp_path, &path).await {
            let _ = tokio::fs::remove_file(&tmp_path).await;
            return Err(ConvertError::OutputWriteFailed { path, source: e });
        }

        Ok(ConvertedFile {
            input: input.to_path_buf(),
            output: path,
            bytes: result.bytes.len(),
            descriptor: result.descriptor,
            duration_ms: start.elapsed().as_millis() as u64,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::format::DocumentFamily;

    fn name(filename: &str) -> Result<ValidatedName, ConvertError> {
        ConversionRequest::new(filename, b"x").validate(None)
    }

    #[test]
    fn splits_at_the_last_dot() {
        let n = name("q3.report.final.XLSX").unwrap();
        assert_eq!(n.base_name, "q3.report.final");
        assert_eq!(n.extension, "XLSX");
    }

    #[test]
    fn directory_components_are_stripped() {
        assert_eq!(name("../../etc/report.xlsx").unwrap().base_name, "report");
        assert_eq!(name(r"C:\Users\me\deck.pptx").unwrap().base_name, "deck");
    }

    #[test]
    fn malformed_names_are_invalid_input() {
        for bad in ["README", ".xlsx", "report.", "", "dir/"] {
            let err = name(bad).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::InvalidInput, "{bad:?}");
        }
    }

    #[test]
    fn size_limit_is_enforced() {
        let content = vec![0u8; 11];
        let err = ConversionRequest::new("a.docx", &content)
            .validate(Some(10))
            .unwrap_err();
        assert!(err.to_string().contains("limit"));
        assert!(ConversionRequest::new("a.docx", &content)
            .validate(Some(11))
            .is_ok());
    }

    #[test]
    fn native_can_be_disabled() {
        let converter = Converter::new(
            ConversionConfig::builder()
                .native_enabled(false)
                .build()
                .unwrap(),
        );
        let d = converter.resolve("xlsx").unwrap();
        assert_eq!(d.strategy, Strategy::External);
        assert_eq!(d.family, DocumentFamily::Spreadsheet);
        assert_eq!(d.target_extension, "ods");

        let default = Converter::default();
        assert_eq!(default.resolve("xlsx").unwrap().strategy, Strategy::Native);
        assert!(default.resolve("txt").is_none());
    }

    #[tokio::test]
    async fn unsupported_extension_is_reported_lowercased() {
        let err = Converter::default()
            .convert("Notes.TXT", b"hello")
            .await
            .unwrap_err();
        match err {
            ConvertError::UnsupportedFormat { extension, supported } => {
                assert_eq!(extension, "txt");
                assert!(supported.contains(&"docx"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn convert_sync_runs_without_a_runtime() {
        let err = Converter::default()
            .convert_sync("broken.docx", b"not a zip")
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::StructuralConversionFailure);
    }
}
