//! OpenDocument packaging: ZIP container, manifest, and XML text helpers.
//!
//! An ODF file is a ZIP archive whose first entry is an uncompressed
//! `mimetype` file. Readers (LibreOffice included) sniff those first bytes,
//! so [`PackageWriter::new`] writes it before anything else. The manifest
//! lists every part and is written last, once all parts are known.

use std::io::{Cursor, Write};
use zip::result::ZipResult;
use zip::write::{SimpleFileOptions, ZipWriter};
use zip::CompressionMethod;

const GENERATOR: &str = concat!("office2odf/", env!("CARGO_PKG_VERSION"));

/// The three document classes the native adapters produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OdfKind {
    Text,
    Spreadsheet,
    Presentation,
}

impl OdfKind {
    pub fn mimetype(self) -> &'static str {
        match self {
            OdfKind::Text => "application/vnd.oasis.opendocument.text",
            OdfKind::Spreadsheet => "application/vnd.oasis.opendocument.spreadsheet",
            OdfKind::Presentation => "application/vnd.oasis.opendocument.presentation",
        }
    }

    fn body_element(self) -> &'static str {
        match self {
            OdfKind::Text => "office:text",
            OdfKind::Spreadsheet => "office:spreadsheet",
            OdfKind::Presentation => "office:presentation",
        }
    }
}

const NAMESPACES: &str = concat!(
    r#"xmlns:office="urn:oasis:names:tc:opendocument:xmlns:office:1.0" "#,
    r#"xmlns:style="urn:oasis:names:tc:opendocument:xmlns:style:1.0" "#,
    r#"xmlns:text="urn:oasis:names:tc:opendocument:xmlns:text:1.0" "#,
    r#"xmlns:table="urn:oasis:names:tc:opendocument:xmlns:table:1.0" "#,
    r#"xmlns:draw="urn:oasis:names:tc:opendocument:xmlns:drawing:1.0" "#,
    r#"xmlns:fo="urn:oasis:names:tc:opendocument:xmlns:xsl-fo-compatible:1.0" "#,
    r#"xmlns:svg="urn:oasis:names:tc:opendocument:xmlns:svg-compatible:1.0" "#,
    r#"xmlns:presentation="urn:oasis:names:tc:opendocument:xmlns:presentation:1.0" "#,
    r#"xmlns:meta="urn:oasis:names:tc:opendocument:xmlns:meta:1.0" "#,
    r#"office:version="1.3""#,
);

/// Streaming writer for an ODF package held in memory.
pub struct PackageWriter {
    zip: ZipWriter<Cursor<Vec<u8>>>,
    mimetype: &'static str,
    entries: Vec<(String, &'static str)>,
}

impl PackageWriter {
    /// Start a package and write its `mimetype` entry.
    pub fn new(kind: OdfKind) -> ZipResult<Self> {
        let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
        let stored = SimpleFileOptions::default().compression_method(CompressionMethod::Stored);
        zip.start_file("mimetype", stored)?;
        zip.write_all(kind.mimetype().as_bytes())?;
        Ok(Self {
            zip,
            mimetype: kind.mimetype(),
            entries: Vec::new(),
        })
    }

    /// Add a deflated part and record it in the manifest.
    pub fn add_file(&mut self, path: &str, content: &[u8]) -> ZipResult<()> {
        let options =
            SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
        self.zip.start_file(path, options)?;
        self.zip.write_all(content)?;
        self.entries.push((path.to_string(), media_type(path)));
        Ok(())
    }

    /// Write the manifest, close the archive and return its bytes.
    pub fn finish(mut self) -> ZipResult<Vec<u8>> {
        let manifest = self.manifest();
        let options =
            SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
        self.zip.start_file("META-INF/manifest.xml", options)?;
        self.zip.write_all(manifest.as_bytes())?;
        Ok(self.zip.finish()?.into_inner())
    }

    fn manifest(&self) -> String {
        let mut out = String::from(
            r#"<?xml version="1.0" encoding="UTF-8"?>
<manifest:manifest xmlns:manifest="urn:oasis:names:tc:opendocument:xmlns:manifest:1.0" manifest:version="1.3">
"#,
        );
        out.push_str(&format!(
            "  <manifest:file-entry manifest:full-path=\"/\" manifest:version=\"1.3\" manifest:media-type=\"{}\"/>\n",
            self.mimetype
        ));
        for (path, media) in &self.entries {
            out.push_str(&format!(
                "  <manifest:file-entry manifest:full-path=\"{}\" manifest:media-type=\"{}\"/>\n",
                escape_xml(path),
                media
            ));
        }
        out.push_str("</manifest:manifest>\n");
        out
    }
}

fn media_type(path: &str) -> &'static str {
    if path.ends_with(".xml") {
        "text/xml"
    } else {
        "application/octet-stream"
    }
}

/// Assemble a complete package around an already-rendered body.
///
/// `body` is the inner XML of `<office:text>`, `<office:spreadsheet>` or
/// `<office:presentation>` depending on `kind`.
pub fn package(kind: OdfKind, body: &str) -> ZipResult<Vec<u8>> {
    let mut writer = PackageWriter::new(kind)?;
    writer.add_file("content.xml", content_xml(kind, body).as_bytes())?;
    writer.add_file("styles.xml", styles_xml(kind).as_bytes())?;
    writer.add_file("meta.xml", meta_xml().as_bytes())?;
    writer.finish()
}

fn content_xml(kind: OdfKind, body: &str) -> String {
    let element = kind.body_element();
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<office:document-content {NAMESPACES}><office:body><{element}>{body}</{element}></office:body></office:document-content>
"#
    )
}

fn styles_xml(kind: OdfKind) -> String {
    // Presentations reference a master page by name from every draw:page.
    let master = match kind {
        OdfKind::Presentation => concat!(
            r#"<office:automatic-styles><style:page-layout style:name="PM1">"#,
            r#"<style:page-layout-properties fo:page-width="28cm" fo:page-height="15.75cm" style:print-orientation="landscape"/>"#,
            r#"</style:page-layout></office:automatic-styles>"#,
            r#"<office:master-styles><style:master-page style:name="Default" style:page-layout-name="PM1"/></office:master-styles>"#,
        ),
        OdfKind::Text | OdfKind::Spreadsheet => concat!(
            r#"<office:automatic-styles><style:page-layout style:name="PM1"/></office:automatic-styles>"#,
            r#"<office:master-styles><style:master-page style:name="Default" style:page-layout-name="PM1"/></office:master-styles>"#,
        ),
    };
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<office:document-styles {NAMESPACES}><office:styles/>{master}</office:document-styles>
"#
    )
}

fn meta_xml() -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<office:document-meta {NAMESPACES}><office:meta><meta:generator>{GENERATOR}</meta:generator></office:meta></office:document-meta>
"#
    )
}

/// Escape the five XML special characters.
pub fn escape_xml(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            // Control characters other than tab/newline are illegal in XML 1.0.
            c if (c as u32) < 0x20 && c != '\t' && c != '\n' && c != '\r' => {}
            c => out.push(c),
        }
    }
    out
}

/// Append paragraph text as ODF inline content.
///
/// ODF collapses whitespace inside `text:p`, so tabs, line breaks and runs
/// of spaces need their own elements to survive a round trip.
pub fn push_text(out: &mut String, text: &str) {
    let mut spaces = 0usize;
    let mut at_start = true;

    let flush = |out: &mut String, spaces: &mut usize, at_start: bool| {
        match *spaces {
            0 => {}
            // A single space is kept literally unless it leads the paragraph.
            1 if !at_start => out.push(' '),
            n => {
                let (literal, extra) = if at_start { (0, n) } else { (1, n - 1) };
                if literal == 1 {
                    out.push(' ');
                }
                if extra == 1 {
                    out.push_str("<text:s/>");
                } else {
                    out.push_str(&format!(r#"<text:s text:c="{extra}"/>"#));
                }
            }
        }
        *spaces = 0;
    };

    for ch in text.chars() {
        match ch {
            ' ' => spaces += 1,
            '\t' => {
                flush(out, &mut spaces, at_start);
                out.push_str("<text:tab/>");
                at_start = false;
            }
            '\n' | '\u{000B}' => {
                flush(out, &mut spaces, at_start);
                out.push_str("<text:line-break/>");
                at_start = true;
            }
            '\r' => {}
            c => {
                flush(out, &mut spaces, at_start);
                out.push_str(&escape_xml(c.encode_utf8(&mut [0u8; 4])));
                at_start = false;
            }
        }
    }
    flush(out, &mut spaces, at_start);
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;

    fn read_entry(bytes: &[u8], name: &str) -> String {
        let mut archive = zip::ZipArchive::new(Cursor::new(bytes)).unwrap();
        let mut s = String::new();
        archive.by_name(name).unwrap().read_to_string(&mut s).unwrap();
        s
    }

    #[test]
    fn mimetype_is_first_and_stored() {
        let bytes = package(OdfKind::Spreadsheet, "").unwrap();
        let mut archive = zip::ZipArchive::new(Cursor::new(bytes.as_slice())).unwrap();
        let first = archive.by_index(0).unwrap();
        assert_eq!(first.name(), "mimetype");
        assert_eq!(first.compression(), CompressionMethod::Stored);
        drop(first);
        assert_eq!(
            read_entry(&bytes, "mimetype"),
            "application/vnd.oasis.opendocument.spreadsheet"
        );
        // ODF readers sniff the mimetype at a fixed offset.
        assert_eq!(&bytes[30..38], b"mimetype");
    }

    #[test]
    fn manifest_lists_every_part() {
        let bytes = package(OdfKind::Text, "<text:p/>").unwrap();
        let manifest = read_entry(&bytes, "META-INF/manifest.xml");
        for part in ["content.xml", "styles.xml", "meta.xml"] {
            assert!(manifest.contains(part), "missing {part}");
        }
        assert!(manifest.contains("application/vnd.oasis.opendocument.text"));
    }

    #[test]
    fn content_wraps_body_in_family_element() {
        let bytes = package(OdfKind::Presentation, "<draw:page/>").unwrap();
        let content = read_entry(&bytes, "content.xml");
        assert!(content.contains("<office:presentation><draw:page/></office:presentation>"));
        let styles = read_entry(&bytes, "styles.xml");
        assert!(styles.contains(r#"style:name="Default""#));
    }

    #[test]
    fn escape_special_characters() {
        assert_eq!(escape_xml(r#"a<b>&"c'"#), "a&lt;b&gt;&amp;&quot;c&apos;");
        assert_eq!(escape_xml("bell\u{7}"), "bell");
    }

    #[test]
    fn push_text_preserves_whitespace_structure() {
        let mut out = String::new();
        push_text(&mut out, "a\tb\nc");
        assert_eq!(out, "a<text:tab/>b<text:line-break/>c");

        let mut out = String::new();
        push_text(&mut out, "x   y");
        assert_eq!(out, r#"x <text:s text:c="2"/>y"#);

        let mut out = String::new();
        push_text(&mut out, "  lead");
        assert_eq!(out, r#"<text:s text:c="2"/>lead"#);

        let mut out = String::new();
        push_text(&mut out, "one two");
        assert_eq!(out, "one two");
    }
}
