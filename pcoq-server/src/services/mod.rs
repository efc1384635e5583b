//! Services for PCO Query
//!
//! The PCO client and the workflows built on it.

pub mod bulk_update;
pub mod pco_client;
pub mod record_matcher;
pub mod upsert;

pub use bulk_update::{bulk_update, BulkReport};
pub use pco_client::{PcoClient, PcoClientConfig, PcoError};
pub use record_matcher::{match_records, ColumnSelection, MatchColumns, MatchReport};
pub use upsert::{upsert_with_details, UpsertReport};
