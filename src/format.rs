//! Format registry: file extension → document family and conversion strategy.
//!
//! The registry is a single `match`, so every extension has exactly one
//! descriptor and lookup order can never change the answer. Some
//! presentation extensions (`pps`, `ppsx`) are readable by both strategies;
//! they resolve to [`Strategy::Native`]. The native arms are listed first and
//! the external arm for those two extensions does not exist.
//!
//! Lookup lower-cases internally and tolerates one leading `.`, so callers
//! may pass the extension exactly as it appeared in the file name.

use serde::Serialize;
use std::fmt;

/// The kind of document an extension belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentFamily {
    Spreadsheet,
    WordProcessing,
    Presentation,
    /// Desktop publishing (Publisher).
    Drawing,
    /// Desktop databases (Access), exported as tabular data.
    Database,
}

impl DocumentFamily {
    /// OpenDocument extension produced for this family.
    pub fn target_extension(self) -> &'static str {
        match self {
            DocumentFamily::Spreadsheet | DocumentFamily::Database => "ods",
            DocumentFamily::Presentation => "odp",
            DocumentFamily::WordProcessing | DocumentFamily::Drawing => "odt",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            DocumentFamily::Spreadsheet => "Spreadsheet",
            DocumentFamily::WordProcessing => "Word-processing",
            DocumentFamily::Presentation => "Presentation",
            DocumentFamily::Drawing => "Drawing",
            DocumentFamily::Database => "Database",
        }
    }
}

impl fmt::Display for DocumentFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// How a document is converted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    /// In-process structural translation (content only).
    Native,
    /// Headless LibreOffice subprocess.
    External,
}

/// Everything the dispatcher needs to know about one extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FormatDescriptor {
    pub family: DocumentFamily,
    pub strategy: Strategy,
    pub target_extension: &'static str,
}

impl FormatDescriptor {
    const fn new(family: DocumentFamily, strategy: Strategy, target: &'static str) -> Self {
        Self {
            family,
            strategy,
            target_extension: target,
        }
    }
}

/// One row of the capability listing.
#[derive(Debug, Clone, Serialize)]
pub struct FormatGroup {
    pub family: DocumentFamily,
    pub strategy: Strategy,
    pub target_extension: &'static str,
    pub extensions: &'static [&'static str],
}

const NATIVE_SPREADSHEET: &[&str] = &["xlsx", "xls", "xlsm"];
const NATIVE_WORD: &[&str] = &["docx"];
const NATIVE_PRESENTATION: &[&str] = &["pptx", "ppt", "ppsx", "pps"];
const EXTERNAL_SPREADSHEET: &[&str] = &["xlsb", "xltx", "xltm"];
const EXTERNAL_WORD: &[&str] = &["doc", "dotx", "dotm"];
const EXTERNAL_PRESENTATION: &[&str] = &["potx", "potm"];
const EXTERNAL_DRAWING: &[&str] = &["pub"];
const EXTERNAL_DATABASE: &[&str] = &["mdb", "accdb"];

/// Resolve an extension to its descriptor, or `None` if unsupported.
pub fn resolve(extension: &str) -> Option<FormatDescriptor> {
    use DocumentFamily::*;
    use Strategy::*;

    let ext = extension.strip_prefix('.').unwrap_or(extension);
    let ext = ext.to_ascii_lowercase();

    let (family, strategy) = match ext.as_str() {
        "xlsx" | "xls" | "xlsm" => (Spreadsheet, Native),
        "docx" => (WordProcessing, Native),
        "pptx" | "ppt" | "ppsx" | "pps" => (Presentation, Native),
        "xlsb" | "xltx" | "xltm" => (Spreadsheet, External),
        "doc" | "dotx" | "dotm" => (WordProcessing, External),
        "potx" | "potm" => (Presentation, External),
        "pub" => (Drawing, External),
        "mdb" | "accdb" => (Database, External),
        _ => return None,
    };

    Some(FormatDescriptor::new(
        family,
        strategy,
        family.target_extension(),
    ))
}

/// The read-only registry grouped by family and strategy.
pub fn supported_formats() -> Vec<FormatGroup> {
    use DocumentFamily::*;
    use Strategy::*;

    [
        (Spreadsheet, Native, NATIVE_SPREADSHEET),
        (WordProcessing, Native, NATIVE_WORD),
        (Presentation, Native, NATIVE_PRESENTATION),
        (Spreadsheet, External, EXTERNAL_SPREADSHEET),
        (WordProcessing, External, EXTERNAL_WORD),
        (Presentation, External, EXTERNAL_PRESENTATION),
        (Drawing, External, EXTERNAL_DRAWING),
        (Database, External, EXTERNAL_DATABASE),
    ]
    .into_iter()
    .map(|(family, strategy, extensions)| FormatGroup {
        family,
        strategy,
        target_extension: family.target_extension(),
        extensions,
    })
    .collect()
}

/// Every supported extension, sorted and de-duplicated.
pub fn supported_extensions() -> Vec<&'static str> {
    let mut all: Vec<&'static str> = supported_formats()
        .iter()
        .flat_map(|g| g.extensions.iter().copied())
        .collect();
    all.sort_unstable();
    all.dedup();
    all
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_listed_extension_resolves_to_its_group() {
        for group in supported_formats() {
            for ext in group.extensions {
                let d = resolve(ext).unwrap_or_else(|| panic!("{ext} should resolve"));
                assert_eq!(d.family, group.family, "{ext}");
                assert_eq!(d.strategy, group.strategy, "{ext}");
                assert_eq!(d.target_extension, group.target_extension, "{ext}");
            }
        }
    }

    #[test]
    fn target_table_is_fixed_per_family() {
        assert_eq!(resolve("xlsx").unwrap().target_extension, "ods");
        assert_eq!(resolve("xlsb").unwrap().target_extension, "ods");
        assert_eq!(resolve("docx").unwrap().target_extension, "odt");
        assert_eq!(resolve("doc").unwrap().target_extension, "odt");
        assert_eq!(resolve("pptx").unwrap().target_extension, "odp");
        assert_eq!(resolve("potm").unwrap().target_extension, "odp");
        assert_eq!(resolve("pub").unwrap().target_extension, "odt");
        assert_eq!(resolve("mdb").unwrap().target_extension, "ods");
        assert_eq!(resolve("accdb").unwrap().target_extension, "ods");
    }

    #[test]
    fn overlapping_slideshow_extensions_prefer_native() {
        for ext in ["pps", "ppsx", "PPS", "PpSx"] {
            let d = resolve(ext).unwrap();
            assert_eq!(d.strategy, Strategy::Native, "{ext}");
            assert_eq!(d.family, DocumentFamily::Presentation);
        }
    }

    #[test]
    fn lookup_is_case_insensitive_and_idempotent() {
        let a = resolve("XLSX");
        let b = resolve(".xlsx");
        let c = resolve("xlsx");
        assert_eq!(a, c);
        assert_eq!(b, c);
        for _ in 0..3 {
            assert_eq!(resolve("docx"), resolve("docx"));
        }
    }

    #[test]
    fn unknown_extensions_are_not_found() {
        for ext in ["txt", "pdf", "", ".", "odt", "xlsx.bak", "docxx"] {
            assert!(resolve(ext).is_none(), "{ext:?} should be unsupported");
        }
    }

    #[test]
    fn supported_extensions_are_unique_and_sorted() {
        let exts = supported_extensions();
        let mut sorted = exts.clone();
        sorted.sort_unstable();
        sorted.dedup();
        assert_eq!(exts, sorted);
        assert_eq!(exts.len(), 19);
        assert!(exts.contains(&"accdb"));
    }

    #[test]
    fn capability_listing_serialises() {
        let json = serde_json::to_value(supported_formats()).unwrap();
        let first = &json[0];
        assert_eq!(first["family"], "spreadsheet");
        assert_eq!(first["strategy"], "native");
        assert_eq!(first["extensions"][0], "xlsx");
    }
}
