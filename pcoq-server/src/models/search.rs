//! Search result sets held per session

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::Person;

/// People returned by one search, kept so they can be exported later
///
/// A new set always replaces the previous one; sets are never merged.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SearchResultSet {
    /// Label such as "name", "grade" or "Specific Query"
    pub search_kind: String,
    /// Free-form description of the query for display
    #[serde(default)]
    pub query: String,
    pub people: Vec<Person>,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
}

impl SearchResultSet {
    pub fn new(search_kind: impl Into<String>, query: impl Into<String>, people: Vec<Person>) -> Self {
        Self {
            search_kind: search_kind.into(),
            query: query.into(),
            people,
            created_at: Utc::now(),
        }
    }

    pub fn len(&self) -> usize {
        self.people.len()
    }

    pub fn is_empty(&self) -> bool {
        self.people.is_empty()
    }
}
