//! Spreadsheet → ODS: active sheet only, cell values only.
//!
//! Workbooks are read with calamine. Only the sheet the author left active
//! is exported, as a single table named `Sheet1`. Rows are anchored at `A1`:
//! calamine trims leading empty rows and columns from a range, so they are
//! padded back to keep every value at its original position.

use crate::error::ConvertError;
use crate::format::DocumentFamily;
use crate::native::{open_package, read_part};
use crate::odf::{self, push_text, OdfKind};
use calamine::{Data, Range, Reader, Xls, Xlsx};
use quick_xml::events::Event;
use quick_xml::Reader as XmlReader;
use std::fmt::Display;
use std::io::{Cursor, Read, Seek};
use tracing::{debug, info};

/// Name of the single table in every exported spreadsheet.
pub const SHEET_NAME: &str = "Sheet1";

/// A cell value after translation, positionally preserved.
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    Empty,
    Text(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    /// ISO-8601 date-time, e.g. `2024-03-01T00:00:00`.
    Date(String),
    /// Spreadsheet error code such as `#DIV/0!`.
    Error(String),
}

pub type Row = Vec<CellValue>;

pub fn convert(extension: &str, content: &[u8]) -> Result<Vec<u8>, ConvertError> {
    let rows = read_active_sheet(extension, content)?;
    info!(
        "Spreadsheet read: {} rows, {} columns",
        rows.len(),
        max_columns(&rows)
    );
    write_ods(&rows)
}

/// Read every row of the active sheet.
pub fn read_active_sheet(extension: &str, content: &[u8]) -> Result<Vec<Row>, ConvertError> {
    let fail = |detail: String| ConvertError::structural(DocumentFamily::Spreadsheet, detail);

    let range = match extension.to_ascii_lowercase().as_str() {
        "xls" => {
            let mut workbook: Xls<_> = Xls::new(Cursor::new(content))
                .map_err(|e| fail(format!("failed to open workbook: {e}")))?;
            // Legacy binary workbooks: calamine does not expose the active tab.
            sheet_range(&mut workbook, 0).map_err(fail)?
        }
        _ => {
            let active = active_tab_of(content);
            let mut workbook: Xlsx<_> = Xlsx::new(Cursor::new(content))
                .map_err(|e| fail(format!("failed to open workbook: {e}")))?;
            sheet_range(&mut workbook, active).map_err(fail)?
        }
    };

    Ok(range_to_rows(&range))
}

fn sheet_range<RS, R>(workbook: &mut R, index: usize) -> Result<Range<Data>, String>
where
    RS: Read + Seek,
    R: Reader<RS>,
    R::Error: Display,
{
    let count = workbook.sheet_names().len();
    if count == 0 {
        return Err("workbook has no worksheets".to_string());
    }
    let index = if index < count {
        index
    } else {
        debug!("Active tab {} out of range ({} sheets); using first", index, count);
        0
    };
    match workbook.worksheet_range_at(index) {
        Some(Ok(range)) => Ok(range),
        Some(Err(e)) => Err(format!("failed to read sheet {index}: {e}")),
        None => Err(format!("sheet {index} not found")),
    }
}

/// Active tab index from `xl/workbook.xml`, or 0 when absent/unreadable.
fn active_tab_of(content: &[u8]) -> usize {
    let Ok(mut package) = open_package(content) else {
        return 0;
    };
    read_part(&mut package, "xl/workbook.xml")
        .map(|xml| active_tab(&xml))
        .unwrap_or(0)
}

/// Parse `<bookViews><workbookView activeTab="N"/></bookViews>`.
pub fn active_tab(workbook_xml: &str) -> usize {
    let mut reader = XmlReader::from_str(workbook_xml);
    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) | Ok(Event::Empty(e))
                if e.local_name().as_ref() == b"workbookView" =>
            {
                return e
                    .attributes()
                    .flatten()
                    .find(|a| a.key.local_name().as_ref() == b"activeTab")
                    .and_then(|a| std::str::from_utf8(&a.value).ok()?.trim().parse().ok())
                    .unwrap_or(0);
            }
            Ok(Event::Eof) | Err(_) => return 0,
            _ => {}
        }
    }
}

fn range_to_rows(range: &Range<Data>) -> Vec<Row> {
    let Some((start_row, start_col)) = range.start() else {
        return Vec::new();
    };

    let mut rows: Vec<Row> = (0..start_row).map(|_| Vec::new()).collect();
    for source in range.rows() {
        let mut row: Row = (0..start_col).map(|_| CellValue::Empty).collect();
        row.extend(source.iter().map(cell_value));
        rows.push(row);
    }
    rows
}

fn cell_value(data: &Data) -> CellValue {
    match data {
        Data::Empty => CellValue::Empty,
        Data::String(s) => CellValue::Text(s.clone()),
        Data::Int(i) => CellValue::Int(*i),
        Data::Float(f) => CellValue::Float(*f),
        Data::Bool(b) => CellValue::Bool(*b),
        Data::DateTime(dt) => {
            if dt.is_duration() {
                CellValue::Float(dt.as_f64())
            } else {
                match dt.as_datetime() {
                    // chrono is built without `alloc` here; its Debug form is ISO 8601.
                    Some(ndt) => CellValue::Date(format!("{ndt:?}")),
                    None => CellValue::Float(dt.as_f64()),
                }
            }
        }
        Data::DateTimeIso(s) => CellValue::Date(s.clone()),
        Data::DurationIso(s) => CellValue::Text(s.clone()),
        Data::Error(e) => CellValue::Error(e.to_string()),
    }
}

fn max_columns(rows: &[Row]) -> usize {
    rows.iter().map(Vec::len).max().unwrap_or(0)
}

/// Render rows as a single-table ODS package.
pub fn write_ods(rows: &[Row]) -> Result<Vec<u8>, ConvertError> {
    let mut body = String::new();
    body.push_str(&format!(r#"<table:table table:name="{SHEET_NAME}">"#));
    body.push_str(&format!(
        r#"<table:table-column table:number-columns-repeated="{}"/>"#,
        max_columns(rows).max(1)
    ));

    for row in rows {
        body.push_str("<table:table-row>");
        if row.is_empty() {
            // A row needs at least one cell to be valid.
            body.push_str("<table:table-cell/>");
        }
        for cell in row {
            push_cell(&mut body, cell);
        }
        body.push_str("</table:table-row>");
    }
    body.push_str("</table:table>");

    odf::package(OdfKind::Spreadsheet, &body).map_err(|e| {
        ConvertError::structural(
            DocumentFamily::Spreadsheet,
            format!("failed to write ODS package: {e}"),
        )
    })
}

fn push_cell(out: &mut String, cell: &CellValue) {
    match cell {
        CellValue::Empty => out.push_str("<table:table-cell/>"),
        CellValue::Text(s) | CellValue::Error(s) => push_string_cell(out, s),
        CellValue::Int(i) => push_float_cell(out, &i.to_string()),
        CellValue::Float(f) if f.is_finite() => push_float_cell(out, &f.to_string()),
        CellValue::Float(f) => push_string_cell(out, &f.to_string()),
        CellValue::Bool(b) => out.push_str(&format!(
            r#"<table:table-cell office:value-type="boolean" office:boolean-value="{b}"><text:p>{}</text:p></table:table-cell>"#,
            if *b { "TRUE" } else { "FALSE" }
        )),
        CellValue::Date(iso) => {
            let iso = odf::escape_xml(iso);
            out.push_str(&format!(
                r#"<table:table-cell office:value-type="date" office:date-value="{iso}"><text:p>{iso}</text:p></table:table-cell>"#
            ));
        }
    }
}

fn push_string_cell(out: &mut String, text: &str) {
    out.push_str(r#"<table:table-cell office:value-type="string"><text:p>"#);
    push_text(out, text);
    out.push_str("</text:p></table:table-cell>");
}

fn push_float_cell(out: &mut String, value: &str) {
    out.push_str(&format!(
        r#"<table:table-cell office:value-type="float" office:value="{value}"><text:p>{value}</text:p></table:table-cell>"#
    ));
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read as _;

    fn content_of(ods: &[u8]) -> String {
        let mut archive = zip::ZipArchive::new(Cursor::new(ods)).unwrap();
        let mut s = String::new();
        archive
            .by_name("content.xml")
            .unwrap()
            .read_to_string(&mut s)
            .unwrap();
        s
    }

    #[test]
    fn active_tab_is_read_from_workbook_view() {
        let xml = r#"<workbook xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main">
            <bookViews><workbookView xWindow="0" activeTab="2"/></bookViews>
            <sheets/></workbook>"#;
        assert_eq!(active_tab(xml), 2);
    }

    #[test]
    fn active_tab_defaults_to_first_sheet() {
        assert_eq!(active_tab("<workbook><sheets/></workbook>"), 0);
        assert_eq!(active_tab(r#"<workbook><bookViews><workbookView/></bookViews></workbook>"#), 0);
        assert_eq!(active_tab("not xml at all <<<"), 0);
    }

    #[test]
    fn writes_typed_cells_in_order() {
        let rows = vec![
            vec![CellValue::Text("Name".into()), CellValue::Text("Age".into())],
            vec![CellValue::Text("Alice".into()), CellValue::Float(30.0)],
            vec![CellValue::Text("Bob".into()), CellValue::Int(25)],
        ];
        let ods = write_ods(&rows).unwrap();
        let content = content_of(&ods);

        assert!(content.contains(r#"table:name="Sheet1""#));
        assert_eq!(content.matches("<table:table-row>").count(), 3);
        let alice = content.find("Alice").unwrap();
        let bob = content.find("Bob").unwrap();
        assert!(alice < bob);
        assert!(content.contains(r#"office:value="30""#));
        assert!(content.contains(r#"office:value="25""#));
        assert!(content.contains(r#"table:number-columns-repeated="2""#));
    }

    #[test]
    fn empty_cells_keep_their_position() {
        let rows = vec![
            vec![],
            vec![CellValue::Empty, CellValue::Bool(true), CellValue::Empty],
        ];
        let content = content_of(&write_ods(&rows).unwrap());
        assert!(content.contains(
            r#"<table:table-row><table:table-cell/></table:table-row><table:table-row><table:table-cell/><table:table-cell office:value-type="boolean" office:boolean-value="true">"#
        ));
    }

    #[test]
    fn special_values() {
        let rows = vec![vec![
            CellValue::Error("#DIV/0!".into()),
            CellValue::Float(f64::NAN),
            CellValue::Date("2024-03-01T00:00:00".into()),
            CellValue::Text("a < b & c".into()),
        ]];
        let content = content_of(&write_ods(&rows).unwrap());
        assert!(content.contains("#DIV/0!"));
        assert!(content.contains("NaN"));
        assert!(content.contains(r#"office:date-value="2024-03-01T00:00:00""#));
        assert!(content.contains("a &lt; b &amp; c"));
    }

    #[test]
    fn empty_sheet_still_produces_a_package() {
        let ods = write_ods(&[]).unwrap();
        assert!(!ods.is_empty());
        assert!(content_of(&ods).contains(r#"table:name="Sheet1""#));
    }
}
