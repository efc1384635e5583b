//! Match uploaded rows against existing PCO people
//!
//! Each row is looked up by email first, then phone, then first and last
//! name. The first lookup that returns anyone decides the match.

use pcoq_common::csv::{cell_text, CsvRow, CsvTable};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::pco_client::PcoClient;
use crate::models::Person;

const FIRST_NAME_PATTERNS: &[&str] = &["first", "fname"];
const LAST_NAME_PATTERNS: &[&str] = &["last", "lname"];
const EMAIL_PATTERNS: &[&str] = &["email", "e-mail"];
const PHONE_PATTERNS: &[&str] = &["phone", "telephone", "mobile", "cell"];

/// Columns requested by the caller; any left out are detected from the headers
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnSelection {
    pub first_name_column: Option<String>,
    pub last_name_column: Option<String>,
    pub email_column: Option<String>,
    pub phone_column: Option<String>,
}

/// Columns actually used for matching
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchColumns {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
}

/// First header containing one of the patterns, case-insensitively
pub fn detect_column(headers: &[String], patterns: &[&str]) -> Option<String> {
    patterns.iter().find_map(|pattern| {
        headers
            .iter()
            .find(|header| header.to_lowercase().contains(pattern))
            .cloned()
    })
}

impl MatchColumns {
    /// Combine explicit choices with detected columns
    ///
    /// Fails when an explicit column is not a header, or when nothing usable
    /// for matching is left.
    pub fn resolve(headers: &[String], selection: &ColumnSelection) -> Result<Self, String> {
        let pick = |explicit: &Option<String>, patterns: &[&str]| -> Result<Option<String>, String> {
            match explicit.as_deref().map(str::trim).filter(|c| !c.is_empty()) {
                Some(column) if headers.iter().any(|h| h == column) => Ok(Some(column.to_string())),
                Some(column) => Err(format!("Unknown column: {}", column)),
                None => Ok(detect_column(headers, patterns)),
            }
        };

        let columns = Self {
            first_name: pick(&selection.first_name_column, FIRST_NAME_PATTERNS)?,
            last_name: pick(&selection.last_name_column, LAST_NAME_PATTERNS)?,
            email: pick(&selection.email_column, EMAIL_PATTERNS)?,
            phone: pick(&selection.phone_column, PHONE_PATTERNS)?,
        };

        if columns.first_name.is_none()
            && columns.last_name.is_none()
            && columns.email.is_none()
            && columns.phone.is_none()
        {
            return Err("No name, email or phone column to match on".to_string());
        }
        Ok(columns)
    }
}

/// A row that resolved to a PCO person
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordMatch {
    pub row_index: usize,
    pub csv_record: CsvRow,
    pub pco_person: Person,
    /// "email", "phone" or "name"
    pub matched_by: String,
}

/// A row with no PCO counterpart
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Unmatched {
    pub row_index: usize,
    pub record: CsvRow,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchSummary {
    pub total: usize,
    pub matched: usize,
    pub unmatched: usize,
    /// Percentage with one decimal, e.g. "66.7%"
    pub match_rate: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct MatchReport {
    pub columns: MatchColumns,
    pub matches: Vec<RecordMatch>,
    pub unmatched: Vec<Unmatched>,
    pub summary: MatchSummary,
}

fn value_of(record: &CsvRow, column: Option<&String>) -> Option<String> {
    column
        .and_then(|c| record.get(c))
        .map(cell_text)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[derive(Debug)]
enum RowOutcome {
    Matched(Person, &'static str),
    /// Every lookup that ran came back empty, or none could run
    Unmatched(String),
    /// At least one lookup errored and none matched
    LookupFailed(String),
}

async fn match_row(client: &PcoClient, columns: &MatchColumns, record: &CsvRow) -> RowOutcome {
    let mut failures = Vec::new();
    let mut tried = false;

    if let Some(email) = value_of(record, columns.email.as_ref()) {
        tried = true;
        match client.search_by_email(&email, Some(1)).await {
            Ok(people) => {
                if let Some(person) = people.into_iter().next() {
                    return RowOutcome::Matched(person, "email");
                }
            }
            Err(e) => failures.push(format!("email lookup failed: {}", e)),
        }
    }

    if let Some(phone) = value_of(record, columns.phone.as_ref()) {
        tried = true;
        match client.search_by_phone(&phone, Some(1)).await {
            Ok(people) => {
                if let Some(person) = people.into_iter().next() {
                    return RowOutcome::Matched(person, "phone");
                }
            }
            Err(e) => failures.push(format!("phone lookup failed: {}", e)),
        }
    }

    let first = value_of(record, columns.first_name.as_ref());
    let last = value_of(record, columns.last_name.as_ref());
    if let (Some(first), Some(last)) = (first, last) {
        tried = true;
        match client.search_by_name(&first, &last, Some(1)).await {
            Ok(people) => {
                if let Some(person) = people.into_iter().next() {
                    return RowOutcome::Matched(person, "name");
                }
            }
            Err(e) => failures.push(format!("name lookup failed: {}", e)),
        }
    }

    if !tried {
        RowOutcome::Unmatched("No name, email or phone value in row".to_string())
    } else if failures.is_empty() {
        RowOutcome::Unmatched("No matching person in PCO".to_string())
    } else {
        RowOutcome::LookupFailed(failures.join("; "))
    }
}

/// Match every row of a table, one row at a time
pub async fn match_records(client: &PcoClient, table: &CsvTable, columns: MatchColumns) -> MatchReport {
    let mut matches = Vec::new();
    let mut unmatched = Vec::new();

    for (row_index, record) in table.rows.iter().enumerate() {
        match match_row(client, &columns, record).await {
            RowOutcome::Matched(person, matched_by) => {
                debug!(row = row_index + 1, person_id = %person.id, matched_by, "Row matched");
                matches.push(RecordMatch {
                    row_index,
                    csv_record: record.clone(),
                    pco_person: person,
                    matched_by: matched_by.to_string(),
                });
            }
            RowOutcome::Unmatched(reason) => unmatched.push(Unmatched {
                row_index,
                record: record.clone(),
                reason,
            }),
            RowOutcome::LookupFailed(reason) => {
                warn!(row = row_index + 1, reason = %reason, "Row lookup failed");
                unmatched.push(Unmatched {
                    row_index,
                    record: record.clone(),
                    reason,
                });
            }
        }
    }

    let total = table.rows.len();
    let match_rate = if total == 0 {
        "0.0%".to_string()
    } else {
        format!("{:.1}%", matches.len() as f64 * 100.0 / total as f64)
    };

    MatchReport {
        columns,
        summary: MatchSummary {
            total,
            matched: matches.len(),
            unmatched: unmatched.len(),
            match_rate,
        },
        matches,
        unmatched,
    }
}
