use serde_json::{Map, Value};

use super::Row;
use crate::error::ParseError;

/// Parses CSV text: first line is the header row, remaining lines become
/// rows keyed by header. Fields are comma-split with surrounding quotes
/// stripped — embedded commas inside quoted fields are not handled.
pub fn parse_csv(input: &str) -> Result<Vec<Row>, ParseError> {
    let mut lines = input.lines().filter(|l| !l.trim().is_empty());

    let headers: Vec<String> = lines
        .next()
        .ok_or(ParseError::EmptyCsv)?
        .split(',')
        .map(|h| strip_quotes(h).to_string())
        .collect();

    let mut rows = Vec::new();
    for line in lines {
        let mut row = Map::new();
        for (i, field) in line.split(',').enumerate() {
            if let Some(header) = headers.get(i) {
                row.insert(
                    header.clone(),
                    Value::String(strip_quotes(field).to_string()),
                );
            }
        }
        rows.push(row);
    }

    Ok(rows)
}

fn strip_quotes(field: &str) -> &str {
    let trimmed = field.trim();
    trimmed
        .strip_prefix('"')
        .and_then(|s| s.strip_suffix('"'))
        .unwrap_or(trimmed)
}

/// Parses JSON into rows. A top-level array must hold objects; a bare
/// object is wrapped into a one-element array.
pub fn parse_json_rows(input: &str) -> Result<Vec<Row>, ParseError> {
    let value: Value = serde_json::from_str(input)?;

    match value {
        Value::Object(object) => Ok(vec![object]),
        Value::Array(items) => items
            .into_iter()
            .map(|item| match item {
                Value::Object(object) => Ok(object),
                other => Err(ParseError::UnexpectedJsonShape(type_name(&other).to_string())),
            })
            .collect(),
        other => Err(ParseError::UnexpectedJsonShape(type_name(&other).to_string())),
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
