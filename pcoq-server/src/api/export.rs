//! CSV export and template download

use axum::{
    response::Response,
    routing::{get, post},
    Router,
};
use pcoq_common::csv::{headers_of, write_csv, CsvRow};
use serde::Deserialize;
use tracing::info;

use super::{csv_attachment, ApiJson};
use crate::AppState;

pub const TEMPLATE_FILENAME: &str = "pco-bulk-update-template.csv";

/// Columns of the bulk update template, in order
pub const TEMPLATE_COLUMNS: &[&str] = &[
    "Person ID",
    "Name Prefix",
    "Given Name",
    "First Name",
    "Nickname",
    "Middle Name",
    "Last Name",
    "Name Suffix",
    "Birthdate",
    "Anniversary",
    "Gender",
    "Grade",
    "School",
    "Medical Notes",
    "Child",
    "Marital Status",
    "Status",
    "Membership",
    "Inactive Reason",
    "Inactive Date",
    "Mobile Phone Number",
    "Home Phone Number",
    "Work Phone Number",
    "Home Email",
    "Work Email",
    "Home Address Street Line 1",
    "Home Address City",
    "Home Address State",
    "Home Address Zip Code",
];

const TEMPLATE_SAMPLES: [[&str; 29]; 2] = [
    [
        "12345678",
        "Mr.",
        "John",
        "John",
        "Johnny",
        "Michael",
        "Doe",
        "Jr.",
        "1990-05-15",
        "2015-06-20",
        "Male",
        "5",
        "Elementary School",
        "Allergic to peanuts",
        "false",
        "Married",
        "active",
        "Member",
        "",
        "",
        "(555) 123-4567",
        "(555) 987-6543",
        "(555) 456-7890",
        "john.doe@example.com",
        "john.doe@work.com",
        "123 Main St",
        "Anytown",
        "TX",
        "12345",
    ],
    [
        "",
        "Ms.",
        "Jane",
        "Jane",
        "",
        "Elizabeth",
        "Smith",
        "",
        "1985-08-22",
        "",
        "Female",
        "",
        "",
        "",
        "false",
        "Single",
        "active",
        "Attender",
        "",
        "",
        "(555) 999-8888",
        "",
        "",
        "jane.smith@example.com",
        "",
        "456 Oak Ave",
        "Somewhere",
        "CA",
        "54321",
    ],
];

#[derive(Debug, Deserialize)]
pub struct ExportRequest {
    pub data: Vec<CsvRow>,
    pub filename: String,
}

/// Sample rows shown in the template download
pub fn template_rows() -> Vec<CsvRow> {
    TEMPLATE_SAMPLES
        .iter()
        .map(|sample| {
            TEMPLATE_COLUMNS
                .iter()
                .zip(sample.iter())
                .map(|(column, value)| (column.to_string(), (*value).into()))
                .collect()
        })
        .collect()
}

/// POST /api/export
///
/// Columns are the keys of the first object, in order.
pub async fn export_csv(ApiJson(req): ApiJson<ExportRequest>) -> Response {
    let headers = headers_of(&req.data);
    let body = write_csv(&headers, &req.data);
    info!(rows = req.data.len(), columns = headers.len(), "Exporting CSV");
    csv_attachment(body, &req.filename)
}

/// GET /api/download-template
pub async fn download_template() -> Response {
    let headers: Vec<String> = TEMPLATE_COLUMNS.iter().map(|c| c.to_string()).collect();
    csv_attachment(write_csv(&headers, &template_rows()), TEMPLATE_FILENAME)
}

pub fn export_routes() -> Router<AppState> {
    Router::new()
        .route("/api/export", post(export_csv))
        .route("/api/download-template", get(download_template))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pcoq_common::csv::CsvTable;

    #[test]
    fn test_template_rows_cover_every_column() {
        let rows = template_rows();
        assert_eq!(rows.len(), 2);
        for row in &rows {
            let keys: Vec<&str> = row.keys().map(String::as_str).collect();
            assert_eq!(keys, TEMPLATE_COLUMNS);
        }
        assert_eq!(rows[0]["Person ID"], "12345678");
        assert_eq!(rows[1]["Membership"], "Attender");
    }

    #[test]
    fn test_template_parses_back() {
        let headers: Vec<String> = TEMPLATE_COLUMNS.iter().map(|c| c.to_string()).collect();
        let text = write_csv(&headers, &template_rows());
        let table = CsvTable::parse(&text).unwrap();

        assert_eq!(table.headers, headers);
        assert_eq!(table.rows, template_rows());
    }
}
