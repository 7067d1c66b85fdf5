//! Word-processing → ODT: body paragraphs in order, text only.
//!
//! Only paragraphs that are direct children of `w:body` are exported;
//! paragraphs inside tables, text boxes, headers and footers are not part of
//! the body sequence. Empty paragraphs are kept as empty `text:p` elements,
//! so the output has exactly one paragraph per source paragraph.

use crate::error::ConvertError;
use crate::format::DocumentFamily;
use crate::native::{open_package, read_part};
use crate::odf::{self, push_text, OdfKind};
use quick_xml::events::Event;
use quick_xml::Reader;
use tracing::info;

const DOCUMENT_PART: &str = "word/document.xml";

pub fn convert(content: &[u8]) -> Result<Vec<u8>, ConvertError> {
    let fail = |detail: String| ConvertError::structural(DocumentFamily::WordProcessing, detail);

    let mut package = open_package(content).map_err(fail)?;
    let xml = read_part(&mut package, DOCUMENT_PART).map_err(fail)?;
    let paragraphs = read_paragraphs(&xml).map_err(fail)?;
    info!("Document read: {} paragraphs", paragraphs.len());
    write_odt(&paragraphs)
}

/// Extract the text of every body-level paragraph of `word/document.xml`.
///
/// Run content maps as Word displays it: `w:t` is literal text, `w:tab`
/// becomes `\t`, `w:br` and `w:cr` become `\n`.
pub fn read_paragraphs(xml: &str) -> Result<Vec<String>, String> {
    let mut reader = Reader::from_str(xml);
    let mut stack: Vec<Vec<u8>> = Vec::new();
    let mut paragraphs = Vec::new();
    // Depth of the open body paragraph, if any.
    let mut open: Option<(usize, String)> = None;

    loop {
        let event = reader
            .read_event()
            .map_err(|e| format!("malformed {DOCUMENT_PART} at byte {}: {e}", reader.buffer_position()))?;

        match event {
            Event::Start(e) => {
                let name = e.local_name().as_ref().to_vec();
                if name == b"p" && parent_is(&stack, b"body") && open.is_none() {
                    open = Some((stack.len() + 1, String::new()));
                } else if let Some((depth, text)) = open.as_mut() {
                    if in_paragraph_flow(&stack, *depth) {
                        push_run_control(text, &name, &stack);
                    }
                }
                stack.push(name);
            }
            Event::Empty(e) => {
                let name = e.local_name();
                let name = name.as_ref();
                if name == b"p" && parent_is(&stack, b"body") {
                    paragraphs.push(String::new());
                } else if let Some((depth, text)) = open.as_mut() {
                    if in_paragraph_flow(&stack, *depth) {
                        push_run_control(text, name, &stack);
                    }
                }
            }
            Event::Text(e) => {
                if let Some((depth, text)) = open.as_mut() {
                    if parent_is(&stack, b"t")
                        && grandparent_is(&stack, b"r")
                        && in_paragraph_flow(&stack, *depth)
                    {
                        let decoded = e
                            .unescape()
                            .map_err(|err| format!("bad text in {DOCUMENT_PART}: {err}"))?;
                        text.push_str(&decoded);
                    }
                }
            }
            Event::CData(e) => {
                if let Some((depth, text)) = open.as_mut() {
                    if parent_is(&stack, b"t")
                        && grandparent_is(&stack, b"r")
                        && in_paragraph_flow(&stack, *depth)
                    {
                        text.push_str(&String::from_utf8_lossy(&e));
                    }
                }
            }
            Event::End(_) => {
                if matches!(open, Some((depth, _)) if depth == stack.len()) {
                    if let Some((_, text)) = open.take() {
                        paragraphs.push(text);
                    }
                }
                stack.pop();
            }
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(paragraphs)
}

/// Elements that carry their own content inside a run (text boxes, drawings,
/// alternate renderings). Their text is not part of the paragraph.
const EMBEDDED_CONTENT: [&[u8]; 5] = [
    b"txbxContent",
    b"AlternateContent",
    b"pict",
    b"drawing",
    b"object",
];

/// True while no embedded-content element is open below the body paragraph.
///
/// `depth` is the stack length once the paragraph was pushed, so the
/// paragraph's descendants start at index `depth`.
fn in_paragraph_flow(stack: &[Vec<u8>], depth: usize) -> bool {
    stack
        .get(depth..)
        .is_none_or(|inner| !inner.iter().any(|n| EMBEDDED_CONTENT.contains(&n.as_slice())))
}

fn parent_is(stack: &[Vec<u8>], name: &[u8]) -> bool {
    stack.last().is_some_and(|n| n == name)
}

fn grandparent_is(stack: &[Vec<u8>], name: &[u8]) -> bool {
    stack.len() >= 2 && stack[stack.len() - 2] == name
}

fn push_run_control(text: &mut String, name: &[u8], stack: &[Vec<u8>]) {
    if !parent_is(stack, b"r") {
        return;
    }
    match name {
        b"tab" => text.push('\t'),
        b"br" | b"cr" => text.push('\n'),
        _ => {}
    }
}

/// Render paragraphs as an ODT package, one `text:p` each.
pub fn write_odt(paragraphs: &[String]) -> Result<Vec<u8>, ConvertError> {
    let mut body = String::new();
    for paragraph in paragraphs {
        if paragraph.is_empty() {
            body.push_str("<text:p/>");
            continue;
        }
        body.push_str("<text:p>");
        push_text(&mut body, paragraph);
        body.push_str("</text:p>");
    }

    odf::package(OdfKind::Text, &body).map_err(|e| {
        ConvertError::structural(
            DocumentFamily::WordProcessing,
            format!("failed to write ODT package: {e}"),
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(body: &str) -> String {
        format!(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:body>{body}<w:sectPr/></w:body></w:document>"#
        )
    }

    #[test]
    fn paragraphs_in_document_order() {
        let xml = doc(concat!(
            r#"<w:p><w:r><w:t>Hello</w:t></w:r><w:r><w:t xml:space="preserve"> World</w:t></w:r></w:p>"#,
            r#"<w:p><w:r><w:t>Second</w:t></w:r></w:p>"#,
        ));
        assert_eq!(read_paragraphs(&xml).unwrap(), vec!["Hello World", "Second"]);
    }

    #[test]
    fn empty_paragraphs_are_preserved() {
        let xml = doc(r#"<w:p><w:r><w:t>a</w:t></w:r></w:p><w:p/><w:p><w:pPr/></w:p><w:p><w:r><w:t>b</w:t></w:r></w:p>"#);
        assert_eq!(read_paragraphs(&xml).unwrap(), vec!["a", "", "", "b"]);
    }

    #[test]
    fn tabs_and_breaks_inside_runs() {
        let xml = doc(concat!(
            r#"<w:p><w:pPr><w:tabs><w:tab w:val="left" w:pos="720"/></w:tabs></w:pPr>"#,
            r#"<w:r><w:t>a</w:t><w:tab/><w:t>b</w:t><w:br/><w:t>c</w:t></w:r></w:p>"#,
        ));
        assert_eq!(read_paragraphs(&xml).unwrap(), vec!["a\tb\nc"]);
    }

    #[test]
    fn table_paragraphs_are_not_body_paragraphs() {
        let xml = doc(concat!(
            r#"<w:p><w:r><w:t>before</w:t></w:r></w:p>"#,
            r#"<w:tbl><w:tr><w:tc><w:p><w:r><w:t>cell</w:t></w:r></w:p></w:tc></w:tr></w:tbl>"#,
            r#"<w:p><w:r><w:t>after</w:t></w:r></w:p>"#,
        ));
        assert_eq!(read_paragraphs(&xml).unwrap(), vec!["before", "after"]);
    }

    #[test]
    fn text_box_content_stays_out_of_the_paragraph() {
        let text_box = r#"<w:txbxContent><w:p><w:r><w:t>BOX</w:t></w:r></w:p></w:txbxContent>"#;
        let xml = doc(&format!(
            concat!(
                r#"<w:p><w:r><w:t>Body</w:t></w:r>"#,
                r#"<w:r><mc:AlternateContent xmlns:mc="http://schemas.openxmlformats.org/markup-compatibility/2006">"#,
                r#"<mc:Choice Requires="wps"><w:drawing><wps:txbx>{tb}</wps:txbx></w:drawing></mc:Choice>"#,
                r#"<mc:Fallback><w:pict><v:textbox>{tb}</v:textbox></w:pict></mc:Fallback>"#,
                r#"</mc:AlternateContent></w:r>"#,
                r#"<w:r><w:tab/><w:t>tail</w:t></w:r></w:p>"#,
                r#"<w:p><w:r><w:t>Next</w:t></w:r></w:p>"#,
            ),
            tb = text_box
        ));
        assert_eq!(read_paragraphs(&xml).unwrap(), vec!["Body\ttail", "Next"]);
    }

    #[test]
    fn hyperlink_runs_belong_to_the_paragraph() {
        let xml = doc(r#"<w:p><w:r><w:t>see </w:t></w:r><w:hyperlink><w:r><w:t>here</w:t></w:r></w:hyperlink></w:p>"#);
        assert_eq!(read_paragraphs(&xml).unwrap(), vec!["see here"]);
    }

    #[test]
    fn escaped_entities_are_decoded() {
        let xml = doc(r#"<w:p><w:r><w:t>Fish &amp; Chips &lt;3</w:t></w:r></w:p>"#);
        assert_eq!(read_paragraphs(&xml).unwrap(), vec!["Fish & Chips <3"]);
    }

    #[test]
    fn malformed_xml_is_an_error() {
        let err = read_paragraphs("<w:document><w:body><w:p></w:body>").unwrap_err();
        assert!(err.contains("malformed"), "got: {err}");
    }

    #[test]
    fn odt_has_one_paragraph_per_source_paragraph() {
        let odt = write_odt(&["Hello World".into(), String::new(), "x".into()]).unwrap();
        let mut archive = zip::ZipArchive::new(std::io::Cursor::new(odt.as_slice())).unwrap();
        let mut content = String::new();
        std::io::Read::read_to_string(&mut archive.by_name("content.xml").unwrap(), &mut content)
            .unwrap();
        assert!(content.contains("<office:text><text:p>Hello World</text:p><text:p/><text:p>x</text:p></office:text>"));
    }
}
