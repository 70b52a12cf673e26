//! Best-effort row extraction from tabular inputs.
//!
//! These parsers are deliberately not byte-exact format implementations:
//! they recover the header-and-rows shape the remote pipeline needs and
//! reject inputs they cannot make sense of.

pub mod tabular;
pub mod workbook;

use serde_json::{Map, Value};

use crate::detect::FileKind;
use crate::error::ParseError;

/// A parsed row: column name → cell value.
pub type Row = Map<String, Value>;

/// Routes raw bytes to the parser for the given kind.
///
/// Supports the three row-shaped kinds; anything else is a caller error
/// surfaced as an unexpected-shape parse failure.
pub fn parse_rows(kind: FileKind, bytes: &[u8]) -> Result<Vec<Row>, ParseError> {
    match kind {
        FileKind::TabularCsv => tabular::parse_csv(as_utf8(bytes)?),
        FileKind::TabularExcel => workbook::parse_first_worksheet(bytes),
        FileKind::JsonMetadata => tabular::parse_json_rows(as_utf8(bytes)?),
        other => Err(ParseError::UnexpectedJsonShape(format!(
            "{} is not row-shaped",
            other
        ))),
    }
}

fn as_utf8(bytes: &[u8]) -> Result<&str, ParseError> {
    std::str::from_utf8(bytes).map_err(|_| ParseError::NotUtf8)
}
