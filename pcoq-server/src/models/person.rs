//! PCO People API resources
//!
//! Shapes follow the JSON:API documents PCO returns. Attributes this service
//! does not name are kept in `other` so a person passes through to the
//! browser unchanged.

use pcoq_common::csv::CsvRow;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashSet;
use tracing::warn;

/// JSON:API document envelope
#[derive(Debug, Clone, Deserialize)]
pub struct Document<T> {
    /// Absent or null for writes answered without a body
    pub data: Option<T>,
    #[serde(default)]
    pub included: Vec<IncludedResource>,
}

/// Sideloaded resource from an `include=` request
#[derive(Debug, Clone, Deserialize)]
pub struct IncludedResource {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub attributes: Value,
}

fn person_type() -> String {
    "Person".to_string()
}

/// A PCO person, optionally with contact details folded in from `included`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Person {
    pub id: String,
    #[serde(rename = "type", default = "person_type")]
    pub kind: String,
    #[serde(default)]
    pub attributes: PersonAttributes,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relationships: Option<Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub phone_numbers: Vec<PhoneNumber>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub emails: Vec<Email>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub addresses: Vec<Address>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct PersonAttributes {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub given_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub middle_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nickname: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub birthdate: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub anniversary: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gender: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grade: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub membership: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub medical_notes: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub login_identifier: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub child: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
    #[serde(flatten)]
    pub other: Map<String, Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PhoneNumber {
    pub id: String,
    pub attributes: ContactAttributes,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Email {
    pub id: String,
    pub attributes: ContactAttributes,
}

/// Attributes shared by phone numbers and emails
///
/// `number` is set for phone numbers, `address` for emails.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ContactAttributes {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub number: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default)]
    pub primary: bool,
    #[serde(flatten)]
    pub other: Map<String, Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Address {
    pub id: String,
    pub attributes: AddressAttributes,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct AddressAttributes {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub street: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub zip: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default)]
    pub primary: bool,
    #[serde(flatten)]
    pub other: Map<String, Value>,
}

/// Columns of a flattened person, named to match the bulk update template
pub const EXPORT_COLUMNS: &[&str] = &[
    "Person ID",
    "First Name",
    "Last Name",
    "Name",
    "Birthdate",
    "Gender",
    "Grade",
    "Membership",
    "Status",
    "Child",
    "Medical Notes",
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

impl Person {
    /// Fold sideloaded phone numbers, emails and addresses into this person
    pub fn attach_included(&mut self, included: Vec<IncludedResource>) {
        for resource in included {
            let IncludedResource {
                id,
                kind,
                attributes,
            } = resource;

            match kind.as_str() {
                "PhoneNumber" => match serde_json::from_value(attributes) {
                    Ok(attributes) => self.phone_numbers.push(PhoneNumber { id, attributes }),
                    Err(e) => warn!(person_id = %self.id, error = %e, "Skipping malformed phone number"),
                },
                "Email" => match serde_json::from_value(attributes) {
                    Ok(attributes) => self.emails.push(Email { id, attributes }),
                    Err(e) => warn!(person_id = %self.id, error = %e, "Skipping malformed email"),
                },
                "Address" => match serde_json::from_value(attributes) {
                    Ok(attributes) => self.addresses.push(Address { id, attributes }),
                    Err(e) => warn!(person_id = %self.id, error = %e, "Skipping malformed address"),
                },
                _ => {}
            }
        }
    }

    /// Full name, or first and last joined when PCO omitted it
    pub fn display_name(&self) -> String {
        if let Some(name) = self.attributes.name.as_deref().filter(|n| !n.trim().is_empty()) {
            return name.to_string();
        }
        join_name(
            self.attributes.first_name.as_deref(),
            self.attributes.last_name.as_deref(),
        )
    }

    fn phone_at(&self, location: &str) -> Option<&str> {
        self.phone_numbers
            .iter()
            .find(|p| same_location(p.attributes.location.as_deref(), location))
            .and_then(|p| p.attributes.number.as_deref())
    }

    fn email_at(&self, location: &str) -> Option<&str> {
        self.emails
            .iter()
            .find(|e| same_location(e.attributes.location.as_deref(), location))
            .and_then(|e| e.attributes.address.as_deref())
    }

    /// Flatten into a CSV row using [`EXPORT_COLUMNS`]
    pub fn to_export_row(&self) -> CsvRow {
        let a = &self.attributes;
        let home = self
            .addresses
            .iter()
            .find(|addr| same_location(addr.attributes.location.as_deref(), "Home"));

        let cells: [Option<String>; 20] = [
            Some(self.id.clone()),
            a.first_name.clone(),
            a.last_name.clone(),
            Some(self.display_name()),
            a.birthdate.clone(),
            a.gender.clone(),
            a.grade.map(|g| g.to_string()),
            a.membership.clone(),
            a.status.clone(),
            a.child.map(|c| c.to_string()),
            a.medical_notes.clone(),
            self.phone_at("Mobile").map(str::to_string),
            self.phone_at("Home").map(str::to_string),
            self.phone_at("Work").map(str::to_string),
            self.email_at("Home").map(str::to_string),
            self.email_at("Work").map(str::to_string),
            home.and_then(|h| h.attributes.street.clone()),
            home.and_then(|h| h.attributes.city.clone()),
            home.and_then(|h| h.attributes.state.clone()),
            home.and_then(|h| h.attributes.zip.clone()),
        ];

        EXPORT_COLUMNS
            .iter()
            .zip(cells)
            .map(|(column, cell)| (column.to_string(), Value::String(cell.unwrap_or_default())))
            .collect()
    }
}

fn same_location(actual: Option<&str>, wanted: &str) -> bool {
    actual.is_some_and(|l| l.eq_ignore_ascii_case(wanted))
}

/// "First Last" with missing parts omitted
pub fn join_name(first: Option<&str>, last: Option<&str>) -> String {
    format!("{} {}", first.unwrap_or(""), last.unwrap_or(""))
        .trim()
        .to_string()
}

/// Drop people whose id was already seen, keeping first occurrences in order
pub fn dedupe_by_id(people: impl IntoIterator<Item = Person>) -> Vec<Person> {
    let mut seen = HashSet::new();
    people
        .into_iter()
        .filter(|person| seen.insert(person.id.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn person_json(id: &str) -> Value {
        json!({
            "id": id,
            "type": "Person",
            "attributes": {
                "first_name": "John",
                "last_name": "Doe",
                "name": "John Doe",
                "grade": 5,
                "child": false,
                "membership": "Member",
                "demographic_avatar_url": "https://example.com/a.png"
            },
            "relationships": {"primary_campus": {"data": null}}
        })
    }

    #[test]
    fn test_person_document_decodes() {
        let doc: Document<Person> = serde_json::from_value(json!({
            "data": person_json("7"),
            "included": []
        }))
        .unwrap();
        assert_eq!(doc.data.map(|p| p.id), Some("7".to_string()));

        let doc: Document<Person> = serde_json::from_value(json!({"data": null})).unwrap();
        assert!(doc.data.is_none());

        let doc: Document<Person> = serde_json::from_value(json!({"meta": {}})).unwrap();
        assert!(doc.data.is_none());
        assert!(doc.included.is_empty());
    }

    #[test]
    fn test_unknown_attributes_pass_through() {
        let person: Person = serde_json::from_value(person_json("1")).unwrap();
        assert_eq!(person.attributes.grade, Some(5));
        assert_eq!(
            person.attributes.other["demographic_avatar_url"],
            "https://example.com/a.png"
        );

        let back = serde_json::to_value(&person).unwrap();
        assert_eq!(back["attributes"]["demographic_avatar_url"], "https://example.com/a.png");
        assert_eq!(back["type"], "Person");
        assert!(back.get("phone_numbers").is_none());
    }

    #[test]
    fn test_attach_included_resources() {
        let mut person: Person = serde_json::from_value(person_json("1")).unwrap();
        let included: Vec<IncludedResource> = serde_json::from_value(json!([
            {"id": "p1", "type": "PhoneNumber", "attributes": {"number": "555-1234", "location": "Mobile", "primary": true}},
            {"id": "e1", "type": "Email", "attributes": {"address": "john@example.com", "location": "Home", "primary": true}},
            {"id": "a1", "type": "Address", "attributes": {"street": "1 Main", "city": "Town", "state": "TX", "zip": "12345", "location": "Home"}},
            {"id": "x1", "type": "Household", "attributes": {}}
        ]))
        .unwrap();

        person.attach_included(included);
        assert_eq!(person.phone_numbers.len(), 1);
        assert_eq!(person.emails.len(), 1);
        assert_eq!(person.addresses.len(), 1);
        assert!(person.phone_numbers[0].attributes.primary);
    }

    #[test]
    fn test_export_row_uses_template_columns() {
        let mut person: Person = serde_json::from_value(person_json("42")).unwrap();
        person.attach_included(
            serde_json::from_value(json!([
                {"id": "p1", "type": "PhoneNumber", "attributes": {"number": "(555) 123-4567", "location": "mobile"}},
                {"id": "e1", "type": "Email", "attributes": {"address": "john@work.com", "location": "Work"}}
            ]))
            .unwrap(),
        );

        let row = person.to_export_row();
        let keys: Vec<&str> = row.keys().map(String::as_str).collect();
        assert_eq!(keys, EXPORT_COLUMNS);
        assert_eq!(row["Person ID"], "42");
        assert_eq!(row["Grade"], "5");
        assert_eq!(row["Child"], "false");
        assert_eq!(row["Mobile Phone Number"], "(555) 123-4567");
        assert_eq!(row["Work Email"], "john@work.com");
        assert_eq!(row["Home Email"], "");
    }

    #[test]
    fn test_display_name_falls_back_to_parts() {
        let person: Person = serde_json::from_value(json!({
            "id": "7",
            "attributes": {"first_name": "Jane", "last_name": null}
        }))
        .unwrap();
        assert_eq!(person.display_name(), "Jane");
        assert_eq!(person.kind, "Person");
    }

    #[test]
    fn test_dedupe_keeps_first_occurrence() {
        let a: Person = serde_json::from_value(person_json("1")).unwrap();
        let mut b: Person = serde_json::from_value(person_json("1")).unwrap();
        b.attributes.first_name = Some("Other".into());
        let c: Person = serde_json::from_value(person_json("2")).unwrap();

        let people = dedupe_by_id(vec![a, b, c]);
        assert_eq!(people.len(), 2);
        assert_eq!(people[0].attributes.first_name.as_deref(), Some("John"));
        assert_eq!(people[1].id, "2");
    }
}
