//! XLSX first-worksheet extraction.
//!
//! An XLSX file is a zip archive of XML parts. This reader pulls the shared
//! string table and the first worksheet, and turns the sheet grid into rows
//! keyed by the header line. Column gaps encoded in cell references are not
//! reconstructed — cells land in document order.

use std::io::{Cursor, Read, Seek};

use quick_xml::events::Event;
use quick_xml::Reader;
use serde_json::{Map, Value};

use super::Row;
use crate::error::ParseError;

pub fn parse_first_worksheet(bytes: &[u8]) -> Result<Vec<Row>, ParseError> {
    let mut archive = zip::ZipArchive::new(Cursor::new(bytes))
        .map_err(|e| ParseError::Workbook(format!("failed to open workbook: {}", e)))?;

    let shared = match read_entry(&mut archive, "xl/sharedStrings.xml") {
        Some(xml) => parse_shared_strings(&xml)?,
        None => Vec::new(),
    };

    let sheet_name = first_worksheet_name(&archive).ok_or(ParseError::MissingWorksheet)?;
    let sheet_xml =
        read_entry(&mut archive, &sheet_name).ok_or(ParseError::MissingWorksheet)?;

    let grid = parse_sheet_xml(&sheet_xml, &shared)?;
    Ok(rows_from_grid(grid))
}

fn first_worksheet_name<R: Read + Seek>(archive: &zip::ZipArchive<R>) -> Option<String> {
    // sheet1.xml is the conventional first sheet; fall back to the
    // lexicographically first worksheet part.
    let mut names: Vec<&str> = archive
        .file_names()
        .filter(|n| n.starts_with("xl/worksheets/") && n.ends_with(".xml"))
        .collect();
    names.sort_unstable();
    if names.iter().any(|n| *n == "xl/worksheets/sheet1.xml") {
        return Some("xl/worksheets/sheet1.xml".to_string());
    }
    names.first().map(|n| n.to_string())
}

fn read_entry<R: Read + Seek>(archive: &mut zip::ZipArchive<R>, name: &str) -> Option<String> {
    let mut entry = archive.by_name(name).ok()?;
    let mut content = String::new();
    entry.read_to_string(&mut content).ok()?;
    Some(content)
}

/// Parses `xl/sharedStrings.xml`: one string per `<si>`, with rich-text
/// runs concatenated.
fn parse_shared_strings(xml: &str) -> Result<Vec<String>, ParseError> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(false);

    let mut strings = Vec::new();
    let mut current = String::new();
    let mut in_text = false;

    loop {
        match reader.read_event() {
            Ok(Event::Start(ref e)) => match e.local_name().as_ref() {
                b"si" => current.clear(),
                b"t" => in_text = true,
                _ => {}
            },
            Ok(Event::End(ref e)) => match e.local_name().as_ref() {
                b"si" => strings.push(std::mem::take(&mut current)),
                b"t" => in_text = false,
                _ => {}
            },
            Ok(Event::Text(e)) => {
                if in_text {
                    current.push_str(&e.xml_content().unwrap_or_default());
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(ParseError::Workbook(format!(
                    "shared strings XML error: {}",
                    e
                )));
            }
            _ => {}
        }
    }

    Ok(strings)
}

/// Cell value type from the `t` attribute.
#[derive(PartialEq)]
enum CellType {
    SharedString,
    Inline,
    Other,
}

fn parse_sheet_xml(xml: &str, shared: &[String]) -> Result<Vec<Vec<Value>>, ParseError> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(false);

    let mut grid: Vec<Vec<Value>> = Vec::new();
    let mut row: Vec<Value> = Vec::new();
    let mut cell_type = CellType::Other;
    let mut cell_text = String::new();
    let mut in_value = false;

    loop {
        match reader.read_event() {
            Ok(Event::Start(ref e)) => match e.local_name().as_ref() {
                b"row" => row.clear(),
                b"c" => {
                    cell_type = cell_type_of(e);
                    cell_text.clear();
                }
                b"v" | b"t" => in_value = true,
                _ => {}
            },
            Ok(Event::Empty(ref e)) => {
                if e.local_name().as_ref() == b"c" {
                    row.push(Value::String(String::new()));
                }
            }
            Ok(Event::End(ref e)) => match e.local_name().as_ref() {
                b"row" => grid.push(std::mem::take(&mut row)),
                b"c" => row.push(resolve_cell(&cell_type, &cell_text, shared)),
                b"v" | b"t" => in_value = false,
                _ => {}
            },
            Ok(Event::Text(e)) => {
                if in_value {
                    cell_text.push_str(&e.xml_content().unwrap_or_default());
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(ParseError::Workbook(format!("worksheet XML error: {}", e)));
            }
            _ => {}
        }
    }

    Ok(grid)
}

fn cell_type_of(e: &quick_xml::events::BytesStart<'_>) -> CellType {
    for attr in e.attributes().flatten() {
        if attr.key.local_name().as_ref() == b"t" {
            return match attr.value.as_ref() {
                b"s" => CellType::SharedString,
                b"inlineStr" | b"str" => CellType::Inline,
                _ => CellType::Other,
            };
        }
    }
    CellType::Other
}

fn resolve_cell(cell_type: &CellType, text: &str, shared: &[String]) -> Value {
    match cell_type {
        CellType::SharedString => {
            let resolved = text
                .parse::<usize>()
                .ok()
                .and_then(|i| shared.get(i))
                .cloned()
                .unwrap_or_default();
            Value::String(resolved)
        }
        CellType::Inline => Value::String(text.to_string()),
        CellType::Other => match text.parse::<f64>().ok().and_then(serde_json::Number::from_f64)
        {
            Some(number) => Value::Number(number),
            None => Value::String(text.to_string()),
        },
    }
}

fn rows_from_grid(grid: Vec<Vec<Value>>) -> Vec<Row> {
    let mut iter = grid.into_iter().filter(|row| {
        row.iter()
            .any(|v| !matches!(v, Value::String(s) if s.is_empty()))
    });

    let headers: Vec<String> = match iter.next() {
        Some(header_row) => header_row
            .into_iter()
            .enumerate()
            .map(|(i, v)| match v {
                Value::String(s) if !s.is_empty() => s,
                Value::String(_) => format!("column_{}", i + 1),
                other => other.to_string(),
            })
            .collect(),
        None => return Vec::new(),
    };

    iter.map(|cells| {
        let mut row = Map::new();
        for (i, cell) in cells.into_iter().enumerate() {
            if let Some(header) = headers.get(i) {
                row.insert(header.clone(), cell);
            }
        }
        row
    })
    .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use zip::write::SimpleFileOptions;

    fn build_workbook(entries: &[(&str, &str)]) -> Vec<u8> {
        let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
        for (name, content) in entries {
            writer
                .start_file(*name, SimpleFileOptions::default())
                .unwrap();
            writer.write_all(content.as_bytes()).unwrap();
        }
        writer.finish().unwrap().into_inner()
    }

    const SHARED: &str = r#"<?xml version="1.0"?>
        <sst xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main">
            <si><t>sku</t></si>
            <si><t>qty</t></si>
            <si><t>A-1</t></si>
        </sst>"#;

    const SHEET: &str = r#"<?xml version="1.0"?>
        <worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main">
            <sheetData>
                <row r="1">
                    <c r="A1" t="s"><v>0</v></c>
                    <c r="B1" t="s"><v>1</v></c>
                </row>
                <row r="2">
                    <c r="A2" t="s"><v>2</v></c>
                    <c r="B2"><v>3</v></c>
                </row>
            </sheetData>
        </worksheet>"#;

    #[test]
    fn test_parse_worksheet_with_shared_strings() {
        let bytes = build_workbook(&[
            ("xl/sharedStrings.xml", SHARED),
            ("xl/worksheets/sheet1.xml", SHEET),
        ]);

        let rows = parse_first_worksheet(&bytes).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["sku"], "A-1");
        assert_eq!(rows[0]["qty"], 3.0);
    }

    #[test]
    fn test_inline_strings() {
        let sheet = r#"<worksheet><sheetData>
            <row><c t="inlineStr"><is><t>name</t></is></c></row>
            <row><c t="inlineStr"><is><t>Ann</t></is></c></row>
        </sheetData></worksheet>"#;
        let bytes = build_workbook(&[("xl/worksheets/sheet1.xml", sheet)]);

        let rows = parse_first_worksheet(&bytes).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["name"], "Ann");
    }

    #[test]
    fn test_missing_worksheet() {
        let bytes = build_workbook(&[("xl/sharedStrings.xml", SHARED)]);
        assert!(matches!(
            parse_first_worksheet(&bytes),
            Err(ParseError::MissingWorksheet)
        ));
    }

    #[test]
    fn test_not_a_zip() {
        assert!(matches!(
            parse_first_worksheet(b"definitely not a workbook"),
            Err(ParseError::Workbook(_))
        ));
    }

    #[test]
    fn test_empty_sheet_yields_no_rows() {
        let sheet = r#"<worksheet><sheetData/></worksheet>"#;
        let bytes = build_workbook(&[("xl/worksheets/sheet1.xml", sheet)]);
        assert!(parse_first_worksheet(&bytes).unwrap().is_empty());
    }
}
