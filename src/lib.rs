//! # office2odf
//!
//! Convert Microsoft Office documents to their OpenDocument equivalents.
//!
//! ## Why two strategies?
//!
//! LibreOffice converts almost anything with good layout fidelity, but each
//! run starts a heavyweight process, takes seconds, and is known to hang on
//! malformed or password-protected files. The common OOXML formats can be
//! translated in-process in milliseconds when only the content matters, so
//! every extension is routed to exactly one of:
//!
//! * **Native**: parse the package in-process and write a minimal ODF
//!   document (cell values, paragraph text, shape text).
//! * **External**: hand the file to `soffice --headless --convert-to`.
//!
//! ## Pipeline Overview
//!
//! ```text
//! filename + bytes
//!  │
//!  ├─ 1. Validate  base name, extension, non-empty, size limit
//!  ├─ 2. Classify  extension → family + strategy (format registry)
//!  ├─ 3. Convert   native adapter (spawn_blocking) │ LibreOffice child process
//!  ├─ 4. Check     output must be non-empty
//!  └─ 5. Output    bytes + "<base>.<ods|odt|odp>"
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use office2odf::{ConversionConfig, Converter};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let converter = Converter::new(ConversionConfig::default());
//!     let content = std::fs::read("slides.pptx")?;
//!     let result = converter.convert("slides.pptx", &content).await?;
//!     std::fs::write(&result.filename, &result.bytes)?;
//!     eprintln!("{} ({} bytes)", result.filename, result.bytes.len());
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `office2odf` binary (clap + anyhow + tracing-subscriber + indicatif) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! office2odf = { version = "0.1", default-features = false }
//! ```
//!
//! ## Supported Formats
//!
//! | Family | Native | LibreOffice | Output |
//! |--------|--------|-------------|--------|
//! | Spreadsheet | xlsx, xls, xlsm | xlsb, xltx, xltm | `.ods` |
//! | Word processing | docx | doc, dotx, dotm | `.odt` |
//! | Presentation | pptx, ppt, ppsx, pps | potx, potm | `.odp` |
//! | Publisher | | pub | `.odt` |
//! | Access | | mdb, accdb | `.ods` |

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod convert;
pub mod error;
pub mod external;
pub mod format;
pub mod gate;
pub mod native;
pub mod odf;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{ConversionConfig, ConversionConfigBuilder};
pub use convert::{ConversionRequest, ConversionResult, ConvertedFile, Converter};
pub use error::{ConvertError, ErrorKind, SlideFault};
pub use external::{ArtifactKind, ExternalConverter, TempArtifact};
pub use format::{
    resolve, supported_extensions, supported_formats, DocumentFamily, FormatDescriptor,
    FormatGroup, Strategy,
};
pub use gate::{AdmissionGate, AllowAll, FixedWindowLimiter};
