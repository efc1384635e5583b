//! Bulk update endpoint

use axum::{extract::State, routing::post, Json, Router};
use pcoq_common::csv::CsvRow;
use serde::{Deserialize, Serialize};

use super::ApiJson;
use crate::error::ApiResult;
use crate::models::{BulkOutcome, BulkSummary};
use crate::services::{bulk_update, BulkReport};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct BulkUpdateRequest {
    pub records: Vec<CsvRow>,
}

/// `{success, results, summary}`
#[derive(Debug, Serialize)]
pub struct BulkUpdateResponse {
    pub success: bool,
    pub results: Vec<BulkOutcome>,
    pub summary: BulkSummary,
}

impl From<BulkReport> for BulkUpdateResponse {
    fn from(report: BulkReport) -> Self {
        Self {
            success: true,
            results: report.results,
            summary: report.summary,
        }
    }
}

/// POST /api/bulk-update
///
/// Row failures are reported in `results`; the request itself succeeds.
pub async fn bulk_update_records(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<BulkUpdateRequest>,
) -> ApiResult<Json<BulkUpdateResponse>> {
    let report = bulk_update(&state.pco, &req.records, state.bulk_concurrency).await;
    Ok(Json(report.into()))
}

pub fn bulk_routes() -> Router<AppState> {
    Router::new().route("/api/bulk-update", post(bulk_update_records))
}
