//! In-process structural translation, one adapter per document family.
//!
//! Each adapter is split in two halves so they can be tested separately:
//! a *reader* that parses the Office package into a small in-memory model,
//! and a *writer* that renders that model as an OpenDocument package.
//!
//! ```text
//! xlsx/xls  ──▶ spreadsheet::read_active_sheet ──▶ rows   ──▶ spreadsheet::write_ods
//! docx      ──▶ document::read_paragraphs      ──▶ paras  ──▶ document::write_odt
//! pptx/pps  ──▶ presentation::read_slides      ──▶ slides ──▶ presentation::render_pages
//! ```
//!
//! Translation is lossy by construction: only cell values, paragraph text and
//! shape text survive. Everything here is synchronous and CPU-bound; the
//! dispatcher runs it under `spawn_blocking`.

pub mod document;
pub mod presentation;
pub mod spreadsheet;

use crate::error::ConvertError;
use crate::format::DocumentFamily;
use std::io::{Cursor, Read};
use zip::ZipArchive;

/// Convert `content` with the native adapter for `family`.
///
/// A serialised package of zero bytes is reported as a structural failure:
/// it can only come from a writer bug and must never reach the caller as a
/// successful conversion.
pub fn convert(
    family: DocumentFamily,
    extension: &str,
    content: &[u8],
) -> Result<Vec<u8>, ConvertError> {
    let bytes = match family {
        DocumentFamily::Spreadsheet => spreadsheet::convert(extension, content)?,
        DocumentFamily::WordProcessing => document::convert(content)?,
        DocumentFamily::Presentation => presentation::convert(content)?,
        DocumentFamily::Drawing | DocumentFamily::Database => {
            return Err(ConvertError::structural(
                family,
                "no in-process translator for this family",
            ))
        }
    };

    ensure_serialised(family, bytes)
}

/// Reject a zero-byte package produced by a writer.
fn ensure_serialised(family: DocumentFamily, bytes: Vec<u8>) -> Result<Vec<u8>, ConvertError> {
    if bytes.is_empty() {
        return Err(ConvertError::structural(family, "serialised document is empty"));
    }
    Ok(bytes)
}

pub(crate) type Package<'a> = ZipArchive<Cursor<&'a [u8]>>;

/// Open an OOXML package held in memory.
pub(crate) fn open_package(content: &[u8]) -> Result<Package<'_>, String> {
    ZipArchive::new(Cursor::new(content)).map_err(|e| format!("not an Office Open XML package: {e}"))
}

/// Read one part of a package as UTF-8 text.
pub(crate) fn read_part(package: &mut Package<'_>, name: &str) -> Result<String, String> {
    let mut file = package
        .by_name(name)
        .map_err(|e| format!("missing part '{name}': {e}"))?;
    let mut content = String::new();
    file.read_to_string(&mut content)
        .map_err(|e| format!("failed to read part '{name}': {e}"))?;
    Ok(content)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn families_without_translator_fail_structurally() {
        for family in [DocumentFamily::Drawing, DocumentFamily::Database] {
            let err = convert(family, "pub", b"anything").unwrap_err();
            assert!(matches!(err, ConvertError::StructuralConversionFailure { .. }));
        }
    }

    #[test]
    fn empty_serialisation_is_a_structural_failure() {
        let err = ensure_serialised(DocumentFamily::Presentation, Vec::new()).unwrap_err();
        match err {
            ConvertError::StructuralConversionFailure { ref family, ref detail } => {
                assert_eq!(family, &DocumentFamily::Presentation.to_string());
                assert!(detail.contains("empty"), "got: {detail}");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn non_empty_serialisation_passes_through() {
        let bytes = ensure_serialised(DocumentFamily::Spreadsheet, b"PK".to_vec()).unwrap();
        assert_eq!(bytes, b"PK");
    }

    #[test]
    fn garbage_input_is_a_structural_failure() {
        for (family, ext) in [
            (DocumentFamily::Spreadsheet, "xlsx"),
            (DocumentFamily::WordProcessing, "docx"),
            (DocumentFamily::Presentation, "pptx"),
        ] {
            let err = convert(family, ext, b"definitely not a zip").unwrap_err();
            assert_eq!(
                err.kind(),
                crate::error::ErrorKind::StructuralConversionFailure,
                "{ext}"
            );
        }
    }
}
