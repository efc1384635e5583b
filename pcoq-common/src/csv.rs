//! CSV parsing and serialization
//!
//! Rows are ordered JSON maps so that a parsed upload, a bulk-update request
//! body and an export request body all share one representation. Column order
//! follows the header line (parsing) or the caller's header list (writing).
//!
//! Quoting follows RFC 4180: a field is wrapped in double quotes, with inner
//! quotes doubled, when it contains a comma, quote, CR or LF. Fields with
//! leading or trailing whitespace are quoted as well, because the parser trims
//! unquoted cells.

use crate::{Error, Result};
use serde::Serialize;
use serde_json::{Map, Value};
use std::borrow::Cow;
use tracing::debug;

/// One CSV record keyed by column name, in column order
pub type CsvRow = Map<String, Value>;

/// A parsed CSV file
///
/// The column set is fixed by the header line; every row carries exactly
/// those columns.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CsvTable {
    pub headers: Vec<String>,
    pub rows: Vec<CsvRow>,
}

impl CsvTable {
    /// Parse CSV text whose first non-blank record is the header line
    ///
    /// Header names are trimmed. Columns with an empty header are ignored.
    /// Short rows are padded with empty strings; surplus cells are dropped.
    pub fn parse(text: &str) -> Result<Self> {
        let mut records = tokenize(text)?.into_iter().filter(|r| !r.is_blank());

        let header_record = records
            .next()
            .ok_or_else(|| Error::csv(1, "missing header row"))?;

        // (cell index, column name)
        let mut columns: Vec<(usize, String)> = Vec::with_capacity(header_record.fields.len());
        for (index, field) in header_record.fields.into_iter().enumerate() {
            let name = field.text.trim().to_string();
            if name.is_empty() {
                debug!(column = index + 1, "Ignoring CSV column with empty header");
                continue;
            }
            if columns.iter().any(|(_, existing)| *existing == name) {
                return Err(Error::csv(
                    header_record.line,
                    format!("duplicate column name '{}'", name),
                ));
            }
            columns.push((index, name));
        }

        if columns.is_empty() {
            return Err(Error::csv(header_record.line, "header row has no column names"));
        }

        let rows = records
            .map(|record| {
                let line = record.line;
                let field_count = record.fields.len();
                let mut cells: Vec<Option<String>> =
                    record.fields.into_iter().map(|f| Some(f.into_text())).collect();

                let mut row = CsvRow::new();
                for (index, name) in &columns {
                    let value = cells
                        .get_mut(*index)
                        .and_then(Option::take)
                        .unwrap_or_default();
                    row.insert(name.clone(), Value::String(value));
                }

                let last_column = columns.last().map(|(i, _)| *i).unwrap_or(0);
                if field_count > last_column + 1 {
                    debug!(line, field_count, "Dropping surplus CSV cells");
                }
                row
            })
            .collect();

        Ok(Self {
            headers: columns.into_iter().map(|(_, name)| name).collect(),
            rows,
        })
    }

    /// Serialize back to CSV text
    pub fn to_csv(&self) -> String {
        write_csv(&self.headers, &self.rows)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Serialize rows as CSV using `headers` for column order
///
/// Lines are joined with `\n` without a trailing newline. Missing cells are
/// written empty.
pub fn write_csv(headers: &[String], rows: &[CsvRow]) -> String {
    let mut lines = Vec::with_capacity(rows.len() + 1);
    lines.push(
        headers
            .iter()
            .map(|h| quote_field(h))
            .collect::<Vec<_>>()
            .join(","),
    );

    for row in rows {
        let line = headers
            .iter()
            .map(|header| {
                let cell = row.get(header).map(cell_text).unwrap_or_default();
                quote_field(&cell).into_owned()
            })
            .collect::<Vec<_>>()
            .join(",");
        lines.push(line);
    }

    lines.join("\n")
}

/// Column names of the first row, in order
pub fn headers_of(rows: &[CsvRow]) -> Vec<String> {
    rows.first()
        .map(|row| row.keys().cloned().collect())
        .unwrap_or_default()
}

/// Text form of a JSON value as it appears in a CSV cell
///
/// Strings verbatim, null as empty, scalars via their display form, nested
/// arrays/objects as compact JSON.
pub fn cell_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        other => other.to_string(),
    }
}

fn quote_field(field: &str) -> Cow<'_, str> {
    let needs_quotes = field.contains(|c: char| matches!(c, ',' | '"' | '\n' | '\r'))
        || field.trim() != field;

    if needs_quotes {
        Cow::Owned(format!("\"{}\"", field.replace('"', "\"\"")))
    } else {
        Cow::Borrowed(field)
    }
}

struct RawField {
    text: String,
    quoted: bool,
}

impl RawField {
    fn into_text(self) -> String {
        if self.quoted {
            self.text
        } else {
            self.text.trim().to_string()
        }
    }
}

struct RawRecord {
    /// 1-based line the record starts on
    line: usize,
    fields: Vec<RawField>,
}

impl RawRecord {
    fn is_blank(&self) -> bool {
        self.fields.len() == 1 && !self.fields[0].quoted && self.fields[0].text.trim().is_empty()
    }
}

/// Split text into records and fields, resolving quotes
fn tokenize(text: &str) -> Result<Vec<RawRecord>> {
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);

    let mut records = Vec::new();
    let mut fields = Vec::new();
    let mut field = String::new();
    let mut quoted = false;
    let mut in_quotes = false;
    let mut line = 1;
    let mut record_line = 1;
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        if in_quotes {
            match c {
                '"' if chars.peek() == Some(&'"') => {
                    chars.next();
                    field.push('"');
                }
                '"' => in_quotes = false,
                '\n' => {
                    line += 1;
                    field.push(c);
                }
                _ => field.push(c),
            }
            continue;
        }

        match c {
            // Opening quote, possibly after whitespace
            '"' if !quoted && field.trim().is_empty() => {
                field.clear();
                in_quotes = true;
                quoted = true;
            }
            ',' => {
                fields.push(RawField {
                    text: std::mem::take(&mut field),
                    quoted,
                });
                quoted = false;
            }
            '\r' if chars.peek() == Some(&'\n') => {}
            '\r' | '\n' => {
                fields.push(RawField {
                    text: std::mem::take(&mut field),
                    quoted,
                });
                records.push(RawRecord {
                    line: record_line,
                    fields: std::mem::take(&mut fields),
                });
                quoted = false;
                line += 1;
                record_line = line;
            }
            _ => field.push(c),
        }
    }

    if in_quotes {
        return Err(Error::csv(record_line, "unterminated quoted field"));
    }

    if !field.is_empty() || !fields.is_empty() || quoted {
        fields.push(RawField { text: field, quoted });
        records.push(RawRecord {
            line: record_line,
            fields,
        });
    }

    Ok(records)
}
