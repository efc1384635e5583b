//! Create-or-update of one person from a flat record
//!
//! The supplied id is advisory: a blank id, `N/A`, or an id PCO does not know
//! leads to a create. Contact details are then added as new sub-resources;
//! their failures are reported but never undo the person write.

use pcoq_common::csv::{cell_text, CsvRow};
use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use super::pco_client::{ChildResource, PcoClient, PcoError};
use crate::models::UpsertAction;

/// Record column holding the target person id
pub const PERSON_ID_COLUMN: &str = "Person ID";

/// How a record column maps onto a PCO person attribute
#[derive(Debug, Clone, Copy)]
enum AttributeKind {
    Text,
    /// Integer when parseable, raw text otherwise
    Integer,
    /// Boolean for `true`/`false`, raw text otherwise
    Boolean,
}

const ATTRIBUTE_COLUMNS: &[(&str, &str, AttributeKind)] = &[
    ("First Name", "first_name", AttributeKind::Text),
    ("Last Name", "last_name", AttributeKind::Text),
    ("Given Name", "given_name", AttributeKind::Text),
    ("Middle Name", "middle_name", AttributeKind::Text),
    ("Nickname", "nickname", AttributeKind::Text),
    ("Birthdate", "birthdate", AttributeKind::Text),
    ("Anniversary", "anniversary", AttributeKind::Text),
    ("Gender", "gender", AttributeKind::Text),
    ("Grade", "grade", AttributeKind::Integer),
    ("Status", "status", AttributeKind::Text),
    ("Membership", "membership", AttributeKind::Text),
    ("Medical Notes", "medical_notes", AttributeKind::Text),
    ("Child", "child", AttributeKind::Boolean),
];

/// Outcome of a successful upsert
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpsertReport {
    pub action: UpsertAction,
    pub person_id: String,
    /// One entry per contact detail attempted, e.g. "Mobile phone added"
    pub details: Vec<String>,
}

impl UpsertReport {
    /// "Created successfully (Mobile phone added, Home email added)"
    pub fn message(&self) -> String {
        if self.details.is_empty() {
            format!("{} successfully", self.action.past_tense())
        } else {
            format!(
                "{} successfully ({})",
                self.action.past_tense(),
                self.details.join(", ")
            )
        }
    }
}

/// Non-blank cell text for a column
fn cell(record: &CsvRow, column: &str) -> Option<String> {
    record
        .get(column)
        .map(cell_text)
        .map(|text| text.trim().to_string())
        .filter(|text| !text.is_empty())
}

/// Target id of a record, if it names one
pub fn record_person_id(record: &CsvRow) -> Option<String> {
    cell(record, PERSON_ID_COLUMN)
}

/// Display name of a record: first and last name joined
pub fn record_name(record: &CsvRow) -> String {
    crate::models::person::join_name(
        cell(record, "First Name").as_deref(),
        cell(record, "Last Name").as_deref(),
    )
}

/// True when the id should be treated as absent
pub fn is_blank_id(id: Option<&str>) -> bool {
    match id.map(str::trim) {
        None => true,
        Some(id) => id.is_empty() || id == "N/A",
    }
}

/// Person attributes named by the record; blank cells are skipped
pub fn person_attributes(record: &CsvRow) -> Map<String, Value> {
    let mut attributes = Map::new();

    for &(column, attribute, kind) in ATTRIBUTE_COLUMNS {
        let Some(text) = cell(record, column) else {
            continue;
        };

        let value = match kind {
            AttributeKind::Text => Value::String(text),
            AttributeKind::Integer => match text.parse::<i64>() {
                Ok(n) => Value::from(n),
                Err(_) => Value::String(text),
            },
            AttributeKind::Boolean => match text.to_ascii_lowercase().as_str() {
                "true" => Value::Bool(true),
                "false" => Value::Bool(false),
                _ => Value::String(text),
            },
        };
        attributes.insert(attribute.to_string(), value);
    }

    attributes
}

/// Phone numbers, emails and the home address named by the record
pub fn contact_details(record: &CsvRow) -> Vec<ChildResource> {
    let mut children = Vec::new();

    for (column, location, primary) in [
        ("Mobile Phone Number", "Mobile", true),
        ("Home Phone Number", "Home", false),
        ("Work Phone Number", "Work", false),
    ] {
        if let Some(number) = cell(record, column) {
            children.push(ChildResource::PhoneNumber {
                number,
                location: location.to_string(),
                primary,
            });
        }
    }

    for (column, location, primary) in [("Home Email", "Home", true), ("Work Email", "Work", false)] {
        if let Some(address) = cell(record, column) {
            children.push(ChildResource::Email {
                address,
                location: location.to_string(),
                primary,
            });
        }
    }

    // Street and city are both required for an address
    if let (Some(street), Some(city)) = (
        cell(record, "Home Address Street Line 1"),
        cell(record, "Home Address City"),
    ) {
        children.push(ChildResource::Address {
            street,
            city,
            state: cell(record, "Home Address State").unwrap_or_default(),
            zip: cell(record, "Home Address Zip Code").unwrap_or_default(),
            location: "Home".to_string(),
        });
    }

    children
}

/// Create or update a person, returning the action taken and the person id
pub async fn upsert_person(
    client: &PcoClient,
    person_id: Option<&str>,
    attributes: &Map<String, Value>,
) -> Result<(UpsertAction, String), PcoError> {
    if !is_blank_id(person_id) {
        let id = person_id.unwrap_or_default().trim();
        if client.get_person(id).await?.is_some() {
            debug!(person_id = %id, "Person found, updating");
            client.update_person(id, attributes).await?;
            return Ok((UpsertAction::Updated, id.to_string()));
        }
        info!(person_id = %id, "Person not found, creating instead");
    }

    let created = client.create_person(attributes).await?;
    debug!(person_id = %created.id, "Person created");
    Ok((UpsertAction::Created, created.id))
}

/// Upsert a person from a record, then add the record's contact details
pub async fn upsert_with_details(
    client: &PcoClient,
    person_id: Option<&str>,
    record: &CsvRow,
) -> Result<UpsertReport, PcoError> {
    let attributes = person_attributes(record);
    let (action, person_id) = upsert_person(client, person_id, &attributes).await?;

    let mut details = Vec::new();
    for child in contact_details(record) {
        match client.create_child(&person_id, &child).await {
            Ok(()) => details.push(format!("{} added", child.label())),
            Err(e) => {
                warn!(person_id = %person_id, detail = %child.label(), error = %e, "Contact detail not added");
                details.push(format!("{} failed: {}", child.label(), e));
            }
        }
    }

    Ok(UpsertReport {
        action,
        person_id,
        details,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(value: Value) -> CsvRow {
        match value {
            Value::Object(map) => map,
            _ => panic!("record must be an object"),
        }
    }

    #[test]
    fn test_blank_ids() {
        assert!(is_blank_id(None));
        assert!(is_blank_id(Some("")));
        assert!(is_blank_id(Some("  ")));
        assert!(is_blank_id(Some("N/A")));
        assert!(!is_blank_id(Some("123")));
    }

    #[test]
    fn test_attribute_mapping() {
        let row = record(json!({
            "Person ID": "1",
            "First Name": " Jane ",
            "Last Name": "Doe",
            "Grade": "5",
            "Child": "TRUE",
            "Membership": "",
            "Medical Notes": "None",
            "School": "Ignored"
        }));

        let attributes = person_attributes(&row);
        assert_eq!(attributes["first_name"], "Jane");
        assert_eq!(attributes["grade"], 5);
        assert_eq!(attributes["child"], true);
        assert_eq!(attributes["medical_notes"], "None");
        assert!(!attributes.contains_key("membership"));
        assert!(!attributes.contains_key("school"));
    }

    #[test]
    fn test_unparseable_grade_kept_as_text() {
        let attributes = person_attributes(&record(json!({"Grade": "K"})));
        assert_eq!(attributes["grade"], "K");

        let attributes = person_attributes(&record(json!({"Grade": 3})));
        assert_eq!(attributes["grade"], 3);
    }

    #[test]
    fn test_contact_details() {
        let row = record(json!({
            "Mobile Phone Number": "(555) 111-2222",
            "Home Phone Number": "",
            "Work Phone Number": "555 333 4444",
            "Home Email": "a@example.com",
            "Home Address Street Line 1": "1 Main",
            "Home Address City": "",
        }));

        let labels: Vec<String> = contact_details(&row).iter().map(ChildResource::label).collect();
        assert_eq!(labels, vec!["Mobile phone", "Work phone", "Home email"]);
    }

    #[test]
    fn test_report_message() {
        let mut report = UpsertReport {
            action: UpsertAction::Created,
            person_id: "1".into(),
            details: vec![],
        };
        assert_eq!(report.message(), "Created successfully");

        report.action = UpsertAction::Updated;
        report.details = vec!["Mobile phone added".into(), "Home email added".into()];
        assert_eq!(
            report.message(),
            "Updated successfully (Mobile phone added, Home email added)"
        );
    }

    #[test]
    fn test_record_name() {
        assert_eq!(record_name(&record(json!({"First Name": "Jane"}))), "Jane");
        assert_eq!(record_name(&record(json!({}))), "");
    }
}
