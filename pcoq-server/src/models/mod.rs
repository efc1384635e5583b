//! Data models for PCO Query

pub mod bulk;
pub mod person;
pub mod search;

pub use bulk::{BulkOutcome, BulkSummary, OutcomeStatus, UpsertAction};
pub use person::{dedupe_by_id, Person, EXPORT_COLUMNS};
pub use search::SearchResultSet;
