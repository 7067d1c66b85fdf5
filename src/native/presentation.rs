//! Presentation → ODP: one page per slide, one text frame per text shape.
//!
//! The slide-to-page correspondence is strict: a deck with N slides always
//! produces N `draw:page` elements, whatever happens while reading them.
//! Faults are contained at the narrowest level possible:
//!
//! * a shape whose text cannot be decoded is skipped, later shapes continue;
//! * a slide part that is missing or malformed keeps the shapes read before
//!   the fault and still yields its (possibly empty) page.
//!
//! Only a broken package (not a ZIP, no `ppt/presentation.xml`) or a failed
//! save fails the request.
//!
//! Group shapes (`p:grpSp`) are not exported as opaque containers: their
//! members are flattened into the slide's shape list in document order, so
//! text inside a group still reaches the page.

use crate::error::{ConvertError, SlideFault};
use crate::format::DocumentFamily;
use crate::native::{open_package, read_part};
use crate::odf::{self, push_text, OdfKind};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::collections::HashMap;
use tracing::{debug, info, warn};

/// Outcome of reading one shape.
#[derive(Debug, Clone, PartialEq)]
pub enum ShapeModel {
    /// The shape carries a non-empty, trimmed text payload.
    Text(String),
    /// The shape has no text frame, or only whitespace.
    NoText,
    /// The shape's text could not be read.
    Unreadable(String),
}

/// One slide after reading: shapes in native order, plus a slide-level fault.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SlideModel {
    pub shapes: Vec<ShapeModel>,
    pub fault: Option<String>,
}

/// The rendered `office:presentation` body and what went into it.
#[derive(Debug, Default)]
pub struct PresentationBody {
    pub xml: String,
    pub pages: usize,
    pub frames: usize,
    pub faults: Vec<SlideFault>,
}

pub fn convert(content: &[u8]) -> Result<Vec<u8>, ConvertError> {
    let slides = read_slides(content)?;
    let body = render_pages(&slides);

    if !body.faults.is_empty() {
        warn!(
            "Presentation had {} unreadable shapes/slides across {} slides; they were skipped",
            body.faults.len(),
            body.pages
        );
    }
    info!(
        "Presentation translated: {} pages, {} text frames",
        body.pages, body.frames
    );

    odf::package(OdfKind::Presentation, &body.xml).map_err(|e| {
        ConvertError::structural(
            DocumentFamily::Presentation,
            format!("failed to write ODP package: {e}"),
        )
    })
}

/// Read every slide of a `.pptx`/`.ppsx` package in presentation order.
pub fn read_slides(content: &[u8]) -> Result<Vec<SlideModel>, ConvertError> {
    let fail = |detail: String| ConvertError::structural(DocumentFamily::Presentation, detail);

    let mut package = open_package(content).map_err(fail)?;
    let presentation = read_part(&mut package, "ppt/presentation.xml").map_err(fail)?;
    let rels = read_part(&mut package, "ppt/_rels/presentation.xml.rels").map_err(fail)?;
    let slide_paths = slide_order(&presentation, &rels).map_err(fail)?;
    info!("Presentation has {} slides", slide_paths.len());

    let slides = slide_paths
        .iter()
        .enumerate()
        .map(|(idx, path)| match path {
            Some(path) => match read_part(&mut package, path) {
                Ok(xml) => parse_slide(&xml),
                Err(e) => SlideModel {
                    shapes: Vec::new(),
                    fault: Some(e),
                },
            },
            None => SlideModel {
                shapes: Vec::new(),
                fault: Some(format!("slide {} has no relationship target", idx + 1)),
            },
        })
        .collect();

    Ok(slides)
}

/// Resolve `p:sldIdLst` to part names through the presentation relationships.
///
/// Every `p:sldId` yields one entry; an id without a matching relationship
/// yields `None` so the slide still gets its page.
pub fn slide_order(presentation_xml: &str, rels_xml: &str) -> Result<Vec<Option<String>>, String> {
    let targets = relationship_targets(rels_xml)?;

    let mut reader = Reader::from_str(presentation_xml);
    let mut order = Vec::new();
    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) | Ok(Event::Empty(e)) if e.local_name().as_ref() == b"sldId" => {
                let target = relationship_id(&e).and_then(|id| targets.get(&id).cloned());
                order.push(target.map(|t| resolve_target("ppt", &t)));
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(format!("malformed ppt/presentation.xml: {e}")),
            _ => {}
        }
    }
    Ok(order)
}

/// The `r:id` attribute (prefixed `id`, as opposed to the numeric `id`).
fn relationship_id(e: &BytesStart<'_>) -> Option<String> {
    e.attributes()
        .flatten()
        .find(|a| a.key.prefix().is_some() && a.key.local_name().as_ref() == b"id")
        .map(|a| String::from_utf8_lossy(&a.value).into_owned())
}

fn relationship_targets(rels_xml: &str) -> Result<HashMap<String, String>, String> {
    let mut reader = Reader::from_str(rels_xml);
    let mut targets = HashMap::new();
    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) | Ok(Event::Empty(e))
                if e.local_name().as_ref() == b"Relationship" =>
            {
                let mut id = None;
                let mut target = None;
                for attr in e.attributes().flatten() {
                    let value = attr
                        .unescape_value()
                        .map(|v| v.into_owned())
                        .unwrap_or_else(|_| String::from_utf8_lossy(&attr.value).into_owned());
                    match attr.key.local_name().as_ref() {
                        b"Id" => id = Some(value),
                        b"Target" => target = Some(value),
                        _ => {}
                    }
                }
                if let (Some(id), Some(target)) = (id, target) {
                    targets.insert(id, target);
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(format!("malformed presentation relationships: {e}")),
            _ => {}
        }
    }
    Ok(targets)
}

/// Resolve a relationship target against the directory of its source part.
fn resolve_target(base_dir: &str, target: &str) -> String {
    if let Some(absolute) = target.strip_prefix('/') {
        return absolute.to_string();
    }
    let mut segments: Vec<&str> = base_dir.split('/').filter(|s| !s.is_empty()).collect();
    for segment in target.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            s => segments.push(s),
        }
    }
    segments.join("/")
}

#[derive(Default)]
struct ShapeState {
    paragraphs: Vec<String>,
    paragraph: Option<String>,
    has_text_body: bool,
    fault: Option<String>,
}

impl ShapeState {
    fn finish(mut self) -> ShapeModel {
        if let Some(detail) = self.fault {
            return ShapeModel::Unreadable(detail);
        }
        if let Some(open) = self.paragraph.take() {
            self.paragraphs.push(open);
        }
        if !self.has_text_body {
            return ShapeModel::NoText;
        }
        let text = self.paragraphs.join("\n");
        let text = text.trim();
        if text.is_empty() {
            ShapeModel::NoText
        } else {
            ShapeModel::Text(text.to_string())
        }
    }
}

/// Read the shapes of one slide part in document order.
///
/// Shapes nested in groups are flattened into the same sequence.
pub fn parse_slide(xml: &str) -> SlideModel {
    let mut reader = Reader::from_str(xml);
    let mut stack: Vec<Vec<u8>> = Vec::new();
    let mut slide = SlideModel::default();
    let mut shape: Option<ShapeState> = None;

    loop {
        let event = match reader.read_event() {
            Ok(event) => event,
            Err(e) => {
                let detail = format!("malformed slide XML at byte {}: {e}", reader.buffer_position());
                if let Some(mut open) = shape.take() {
                    open.fault.get_or_insert_with(|| detail.clone());
                    slide.shapes.push(open.finish());
                }
                slide.fault = Some(detail);
                break;
            }
        };

        match event {
            Event::Start(e) => {
                let name = e.local_name().as_ref().to_vec();
                match (name.as_slice(), shape.as_mut()) {
                    (b"sp", None) => shape = Some(ShapeState::default()),
                    (b"txBody", Some(s)) => s.has_text_body = true,
                    (b"p", Some(s)) if s.has_text_body => s.paragraph = Some(String::new()),
                    _ => {}
                }
                stack.push(name);
            }
            Event::Empty(e) => match (e.local_name().as_ref(), shape.as_mut()) {
                (b"sp", None) => slide.shapes.push(ShapeModel::NoText),
                (b"txBody", Some(s)) => s.has_text_body = true,
                (b"p", Some(s)) if s.has_text_body => s.paragraphs.push(String::new()),
                (b"br", Some(s)) => {
                    if let Some(p) = s.paragraph.as_mut() {
                        p.push('\n');
                    }
                }
                _ => {}
            },
            Event::Text(e) => {
                if let Some(s) = shape.as_mut() {
                    if stack.last().is_some_and(|n| n == b"t") && s.fault.is_none() {
                        match e.unescape() {
                            Ok(text) => {
                                if let Some(p) = s.paragraph.as_mut() {
                                    p.push_str(&text);
                                }
                            }
                            Err(err) => s.fault = Some(format!("undecodable text: {err}")),
                        }
                    }
                }
            }
            Event::End(e) => {
                match (e.local_name().as_ref(), shape.as_mut()) {
                    (b"p", Some(s)) => {
                        if let Some(p) = s.paragraph.take() {
                            s.paragraphs.push(p);
                        }
                    }
                    (b"sp", Some(_)) => {
                        if let Some(done) = shape.take() {
                            slide.shapes.push(done.finish());
                        }
                    }
                    _ => {}
                }
                stack.pop();
            }
            Event::Eof => break,
            _ => {}
        }
    }

    slide
}

/// Render slides as `draw:page` elements, collecting faults.
///
/// Each slide yields exactly one page; text shapes become stacked frames.
pub fn render_pages(slides: &[SlideModel]) -> PresentationBody {
    let mut body = PresentationBody::default();

    for (idx, slide) in slides.iter().enumerate() {
        let number = idx + 1;
        body.xml.push_str(&format!(
            r#"<draw:page draw:name="page{number}" draw:master-page-name="Default">"#
        ));

        let mut frames_on_page = 0usize;
        for (shape_idx, shape) in slide.shapes.iter().enumerate() {
            match shape {
                ShapeModel::Text(text) => {
                    push_frame(&mut body.xml, number, frames_on_page, text);
                    frames_on_page += 1;
                }
                ShapeModel::NoText => {}
                ShapeModel::Unreadable(detail) => {
                    debug!("Skipping shape {} on slide {}: {}", shape_idx + 1, number, detail);
                    body.faults.push(SlideFault::ShapeUnreadable {
                        slide: number,
                        shape: shape_idx + 1,
                        detail: detail.clone(),
                    });
                }
            }
        }
        if let Some(ref detail) = slide.fault {
            debug!("Slide {} partially read: {}", number, detail);
            body.faults.push(SlideFault::SlideUnreadable {
                slide: number,
                detail: detail.clone(),
            });
        }

        body.xml.push_str("</draw:page>");
        body.pages += 1;
        body.frames += frames_on_page;
        debug!("Processed slide {} with {} text shapes", number, frames_on_page);
    }

    body
}

fn push_frame(out: &mut String, page: usize, index: usize, text: &str) {
    // Frames are stacked top to bottom on a 28 × 15.75 cm page.
    let y = 1.0 + (index as f64) * 2.5;
    out.push_str(&format!(
        r#"<draw:frame draw:name="page{page}-text{}" draw:layer="layout" svg:x="1.5cm" svg:y="{y:.2}cm" svg:width="25cm" svg:height="2.25cm"><draw:text-box>"#,
        index + 1
    ));
    for line in text.split('\n') {
        if line.is_empty() {
            out.push_str("<text:p/>");
        } else {
            out.push_str("<text:p>");
            push_text(out, line);
            out.push_str("</text:p>");
        }
    }
    out.push_str("</draw:text-box></draw:frame>");
}
