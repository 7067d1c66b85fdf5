//! Conversion by delegation to a headless LibreOffice process.
//!
//! ## Protocol
//!
//! ```text
//! content ──▶ <work_dir>/office2odf-XXXXXX.<ext>             (TempArtifact::Input)
//!         ──▶ soffice --headless --convert-to <target>
//!                     --outdir <work_dir> <input>
//!         ──▶ <work_dir>/office2odf-XXXXXX.<target>          (TempArtifact::Output)
//!         ──▶ bytes
//! ```
//!
//! LibreOffice picks its import filter from the file suffix, so the input
//! keeps the caller's extension exactly. Its only feedback is the exit code
//! and stderr; the output location is derived, never reported.
//!
//! Both artifacts are guards created before the child starts. They are
//! removed when the call returns, fails, times out, or its future is
//! dropped, so temp files cannot pile up under load.

use crate::config::ConversionConfig;
use crate::error::ConvertError;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::process::Command;
use tracing::{debug, info, warn};

/// Which side of the conversion a temp file belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactKind {
    Input,
    Output,
}

/// A temp file removed when dropped.
///
/// Removal failures are logged and swallowed: cleanup must never replace
/// the conversion's own result or error.
#[derive(Debug)]
pub struct TempArtifact {
    path: PathBuf,
    kind: ArtifactKind,
}

impl TempArtifact {
    pub fn new(path: impl Into<PathBuf>, kind: ArtifactKind) -> Self {
        Self {
            path: path.into(),
            kind,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn kind(&self) -> ArtifactKind {
        self.kind
    }
}

impl Drop for TempArtifact {
    fn drop(&mut self) {
        match std::fs::remove_file(&self.path) {
            Ok(()) => debug!("Removed {:?} artifact {}", self.kind, self.path.display()),
            // The output never appears when the converter fails.
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!("{:?} artifact {} already gone", self.kind, self.path.display())
            }
            Err(e) => warn!(
                "Failed to remove {:?} artifact {}: {}",
                self.kind,
                self.path.display(),
                e
            ),
        }
    }
}

/// Runs LibreOffice on one document at a time; cheap to clone and share.
#[derive(Debug, Clone)]
pub struct ExternalConverter {
    soffice: PathBuf,
    timeout: Duration,
    work_dir: PathBuf,
}

impl ExternalConverter {
    pub fn new(config: &ConversionConfig) -> Self {
        Self {
            soffice: config.soffice_path.clone(),
            timeout: config.external_timeout(),
            work_dir: config.resolved_work_dir(),
        }
    }

    /// Convert `content` (a `.original_ext` file) to `target_ext`.
    ///
    /// # Errors
    /// - [`ConvertError::ExternalProcessFailure`]: non-zero exit, or the
    ///   binary could not be launched (`exit_code: None`)
    /// - [`ConvertError::ExternalOutputMissing`]: zero exit, no output file
    /// - [`ConvertError::ExternalTimeout`]: the child was killed
    /// - [`ConvertError::Internal`]: temp-file I/O
    pub async fn convert(
        &self,
        content: &[u8],
        original_ext: &str,
        target_ext: &str,
    ) -> Result<Vec<u8>, ConvertError> {
        let start = Instant::now();
        let input = self.create_input(original_ext, content).await?;

        let output = TempArtifact::new(
            expected_output(input.path(), target_ext),
            ArtifactKind::Output,
        );
        debug!(
            "Running {} on {} ({} bytes) → {}",
            self.soffice.display(),
            input.path().display(),
            content.len(),
            output.path().display()
        );

        self.run(input.path(), target_ext).await?;

        let bytes = match tokio::fs::read(output.path()).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                warn!(
                    "LibreOffice exited cleanly but {} does not exist",
                    output.path().display()
                );
                return Err(ConvertError::ExternalOutputMissing {
                    expected: output.path().to_path_buf(),
                });
            }
            Err(e) => return Err(ConvertError::Internal(format!("read converted output: {e}"))),
        };

        info!(
            "LibreOffice converted .{} → .{} in {}ms ({} bytes)",
            original_ext,
            target_ext,
            start.elapsed().as_millis(),
            bytes.len()
        );
        Ok(bytes)
    }

    /// Write `content` to a fresh suffixed temp file and hand it to a guard.
    ///
    /// The file is filled through its own handle before the path is kept, all
    /// on one blocking task. If the caller is dropped meanwhile, the task's
    /// result (the guard) is dropped with it and the file is removed.
    async fn create_input(
        &self,
        original_ext: &str,
        content: &[u8],
    ) -> Result<TempArtifact, ConvertError> {
        let work_dir = self.work_dir.clone();
        let suffix = format!(".{original_ext}");
        let content = content.to_vec();

        tokio::task::spawn_blocking(move || {
            let mut file = tempfile::Builder::new()
                .prefix("office2odf-")
                .suffix(&suffix)
                .tempfile_in(&work_dir)
                .map_err(|e| {
                    ConvertError::Internal(format!(
                        "create temp input in {}: {e}",
                        work_dir.display()
                    ))
                })?;
            file.write_all(&content)
                .and_then(|()| file.flush())
                .map_err(|e| ConvertError::Internal(format!("write temp input: {e}")))?;
            // The handle is closed so the converter can open the file itself.
            let (_handle, path) = file
                .keep()
                .map_err(|e| ConvertError::Internal(format!("keep temp input: {e}")))?;
            Ok(TempArtifact::new(path, ArtifactKind::Input))
        })
        .await
        .map_err(|e| ConvertError::Internal(format!("temp input task failed: {e}")))?
    }

    async fn run(&self, input: &Path, target_ext: &str) -> Result<(), ConvertError> {
        let outdir = input.parent().unwrap_or(&self.work_dir);
        let child = Command::new(&self.soffice)
            .arg("--headless")
            .arg("--convert-to")
            .arg(target_ext)
            .arg("--outdir")
            .arg(outdir)
            .arg(input)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| ConvertError::ExternalProcessFailure {
                exit_code: None,
                stderr: format!("failed to launch '{}': {e}", self.soffice.display()),
            })?;

        // Dropping `wait_with_output` on timeout drops the child, which kills it.
        let output = match tokio::time::timeout(self.timeout, child.wait_with_output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => {
                return Err(ConvertError::ExternalProcessFailure {
                    exit_code: None,
                    stderr: format!("failed to wait for converter: {e}"),
                })
            }
            Err(_) => {
                warn!(
                    "LibreOffice did not finish within {}s; killed",
                    self.timeout.as_secs()
                );
                return Err(ConvertError::ExternalTimeout {
                    secs: self.timeout.as_secs(),
                });
            }
        };

        let stdout = String::from_utf8_lossy(&output.stdout);
        if !stdout.trim().is_empty() {
            debug!("LibreOffice stdout: {}", stdout.trim());
        }

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            let stderr = if stderr.is_empty() {
                "unknown converter error".to_string()
            } else {
                stderr
            };
            warn!("LibreOffice failed ({}): {}", output.status, stderr);
            return Err(ConvertError::ExternalProcessFailure {
                exit_code: output.status.code(),
                stderr,
            });
        }
        Ok(())
    }
}

/// `<dir>/<stem>.<target_ext>` for an input `<dir>/<stem>.<ext>`.
pub fn expected_output(input: &Path, target_ext: &str) -> PathBuf {
    input.with_extension(target_ext)
}
