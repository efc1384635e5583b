//! Bulk create-or-update of person records
//!
//! Rows go through a bounded pool of upserts. Results come back in input
//! order, and a failing row never stops the batch.

use futures::stream::{self, StreamExt};
use pcoq_common::csv::CsvRow;
use tracing::{info, warn};

use super::pco_client::PcoClient;
use super::upsert::{record_name, record_person_id, upsert_with_details};
use crate::models::{BulkOutcome, BulkSummary, OutcomeStatus};

/// Outcomes of one bulk run, in input order
#[derive(Debug, Clone)]
pub struct BulkReport {
    pub results: Vec<BulkOutcome>,
    pub summary: BulkSummary,
}

async fn process_record(client: &PcoClient, index: usize, record: &CsvRow) -> BulkOutcome {
    let supplied_id = record_person_id(record);
    let name = record_name(record);

    info!(
        row = index + 1,
        person_id = supplied_id.as_deref().unwrap_or("NEW"),
        "Processing bulk update row"
    );

    match upsert_with_details(client, supplied_id.as_deref(), record).await {
        Ok(report) => BulkOutcome {
            pco_id: report.person_id.clone(),
            name,
            status: OutcomeStatus::Success,
            message: report.message(),
            action: report.action,
        },
        Err(e) => {
            warn!(row = index + 1, error = %e, "Bulk update row failed");
            BulkOutcome::failed(supplied_id.as_deref(), name, e.to_string())
        }
    }
}

/// Upsert every record, at most `concurrency` at a time
///
/// A concurrency of 0 is treated as 1 (strictly sequential).
pub async fn bulk_update(client: &PcoClient, records: &[CsvRow], concurrency: usize) -> BulkReport {
    let concurrency = concurrency.max(1);

    // Rows are streamed owned so the handler future stays Send
    let results: Vec<BulkOutcome> = stream::iter(records.iter().cloned().enumerate())
        .map(|(index, record)| async move { process_record(client, index, &record).await })
        .buffered(concurrency)
        .collect()
        .await;

    let summary = BulkSummary::from_outcomes(&results);
    info!(
        total = summary.total,
        successful = summary.successful,
        errors = summary.errors,
        created = summary.created,
        updated = summary.updated,
        "Bulk update finished"
    );

    BulkReport { results, summary }
}
