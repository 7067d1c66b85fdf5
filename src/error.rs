//! Error types for the office2odf library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`ConvertError`] (**fatal**): the request cannot produce a document
//!   (bad input, unknown extension, converter crashed, empty result).
//!   Returned as `Err(ConvertError)` from [`crate::Converter::convert`].
//!
//! * [`SlideFault`] (**non-fatal**): one slide or shape of a presentation
//!   could not be read. The slide still yields a page; faults are collected
//!   for logging and never escalate to a request failure.
//!
//! Every fatal error exposes a stable [`ErrorKind`] so transport layers can
//! map it to a status code without parsing messages.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the office2odf library.
#[derive(Debug, Error)]
pub enum ConvertError {
    // ── Client errors ─────────────────────────────────────────────────────
    /// The request itself is malformed (no extension, empty upload, too large).
    #[error("Invalid input: {reason}")]
    InvalidInput { reason: String },

    /// The extension is not in the format registry.
    #[error("Unsupported file format '.{extension}'\nSupported: {}", .supported.join(", "))]
    UnsupportedFormat {
        extension: String,
        supported: Vec<&'static str>,
    },

    /// The admission gate refused the client before conversion started.
    #[error("Request rejected for client '{client}'; retry after {retry_after_secs}s")]
    Rejected {
        client: String,
        retry_after_secs: u64,
    },

    // ── Native strategy ───────────────────────────────────────────────────
    /// The in-process translator could not read or serialise the document.
    #[error("{family} conversion failed: {detail}")]
    StructuralConversionFailure { family: String, detail: String },

    // ── External strategy ─────────────────────────────────────────────────
    /// The converter exited non-zero or could not be launched.
    #[error("LibreOffice conversion failed ({}): {stderr}", exit_display(.exit_code))]
    ExternalProcessFailure {
        exit_code: Option<i32>,
        stderr: String,
    },

    /// The converter exited zero but the expected file is not there.
    #[error("LibreOffice reported success but produced no output at '{}'", .expected.display())]
    ExternalOutputMissing { expected: PathBuf },

    /// The converter did not finish within the configured timeout.
    #[error("LibreOffice conversion timed out after {secs}s\nIncrease --timeout or check the input is not password-protected.")]
    ExternalTimeout { secs: u64 },

    // ── Output checks ─────────────────────────────────────────────────────
    /// A strategy reported success but the converted file has zero bytes.
    #[error("Converted file is empty")]
    EmptyOutput,

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not create or write the converted file on disk.
    #[error("Failed to write output file '{}': {source}", .path.display())]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error (task panic, temp-file I/O).
    #[error("Internal error: {0}")]
    Internal(String),
}

fn exit_display(code: &Option<i32>) -> String {
    match code {
        Some(c) => format!("exit code {c}"),
        None => "not started".to_string(),
    }
}

/// Machine-distinguishable failure category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    InvalidInput,
    UnsupportedFormat,
    Rejected,
    StructuralConversionFailure,
    ExternalProcessFailure,
    ExternalOutputMissing,
    ExternalTimeout,
    EmptyOutput,
    Internal,
}

impl ErrorKind {
    /// Stable snake_case identifier, identical to the serde form.
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::InvalidInput => "invalid_input",
            ErrorKind::UnsupportedFormat => "unsupported_format",
            ErrorKind::Rejected => "rejected",
            ErrorKind::StructuralConversionFailure => "structural_conversion_failure",
            ErrorKind::ExternalProcessFailure => "external_process_failure",
            ErrorKind::ExternalOutputMissing => "external_output_missing",
            ErrorKind::ExternalTimeout => "external_timeout",
            ErrorKind::EmptyOutput => "empty_output",
            ErrorKind::Internal => "internal",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl ConvertError {
    /// The stable category of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            ConvertError::InvalidInput { .. } => ErrorKind::InvalidInput,
            ConvertError::UnsupportedFormat { .. } => ErrorKind::UnsupportedFormat,
            ConvertError::Rejected { .. } => ErrorKind::Rejected,
            ConvertError::StructuralConversionFailure { .. } => {
                ErrorKind::StructuralConversionFailure
            }
            ConvertError::ExternalProcessFailure { .. } => ErrorKind::ExternalProcessFailure,
            ConvertError::ExternalOutputMissing { .. } => ErrorKind::ExternalOutputMissing,
            ConvertError::ExternalTimeout { .. } => ErrorKind::ExternalTimeout,
            ConvertError::EmptyOutput => ErrorKind::EmptyOutput,
            ConvertError::OutputWriteFailed { .. }
            | ConvertError::InvalidConfig(_)
            | ConvertError::Internal(_) => ErrorKind::Internal,
        }
    }

    /// True when the caller sent something the service cannot accept
    /// (a 4xx in HTTP terms). Everything else is a server-side failure.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::InvalidInput | ErrorKind::UnsupportedFormat | ErrorKind::Rejected
        )
    }

    pub(crate) fn invalid_input(reason: impl Into<String>) -> Self {
        ConvertError::InvalidInput {
            reason: reason.into(),
        }
    }

    pub(crate) fn structural(family: impl fmt::Display, detail: impl fmt::Display) -> Self {
        ConvertError::StructuralConversionFailure {
            family: family.to_string(),
            detail: detail.to_string(),
        }
    }
}

/// A non-fatal fault while reading one slide of a presentation.
///
/// Collected by the presentation adapter and logged in aggregate. The slide
/// still produces its page.
#[derive(Debug, Clone, Error, Serialize, Deserialize)]
pub enum SlideFault {
    /// A single shape's text could not be decoded; the shape was skipped.
    #[error("Slide {slide}: shape {shape} skipped: {detail}")]
    ShapeUnreadable {
        slide: usize,
        shape: usize,
        detail: String,
    },

    /// The slide part could not be read; shapes after the fault were lost.
    #[error("Slide {slide}: content unreadable: {detail}")]
    SlideUnreadable { slide: usize, detail: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unsupported_format_lists_extensions() {
        let e = ConvertError::UnsupportedFormat {
            extension: "txt".into(),
            supported: vec!["docx", "xlsx"],
        };
        let msg = e.to_string();
        assert!(msg.contains(".txt"), "got: {msg}");
        assert!(msg.contains("docx, xlsx"), "got: {msg}");
        assert!(e.is_client_error());
    }

    #[test]
    fn process_failure_display_carries_stderr() {
        let e = ConvertError::ExternalProcessFailure {
            exit_code: Some(77),
            stderr: "Error: source file could not be loaded".into(),
        };
        let msg = e.to_string();
        assert!(msg.contains("exit code 77"));
        assert!(msg.contains("could not be loaded"));
        assert!(!e.is_client_error());
    }

    #[test]
    fn launch_failure_display() {
        let e = ConvertError::ExternalProcessFailure {
            exit_code: None,
            stderr: "No such file or directory".into(),
        };
        assert!(e.to_string().contains("not started"));
    }

    #[test]
    fn kinds_are_distinct_for_external_failures() {
        let failed = ConvertError::ExternalProcessFailure {
            exit_code: Some(1),
            stderr: String::new(),
        };
        let missing = ConvertError::ExternalOutputMissing {
            expected: PathBuf::from("/tmp/x.odt"),
        };
        let timeout = ConvertError::ExternalTimeout { secs: 60 };
        assert_ne!(failed.kind(), missing.kind());
        assert_ne!(failed.kind(), timeout.kind());
        assert_ne!(missing.kind(), timeout.kind());
    }

    #[test]
    fn kind_serialises_snake_case() {
        let json = serde_json::to_string(&ErrorKind::ExternalOutputMissing).unwrap();
        assert_eq!(json, "\"external_output_missing\"");
        assert_eq!(
            ErrorKind::StructuralConversionFailure.to_string(),
            "structural_conversion_failure"
        );
    }

    #[test]
    fn slide_fault_display() {
        let f = SlideFault::ShapeUnreadable {
            slide: 2,
            shape: 4,
            detail: "bad escape".into(),
        };
        let msg = f.to_string();
        assert!(msg.contains("Slide 2"));
        assert!(msg.contains("shape 4"));
    }
}
