//! Session-scoped endpoints
//!
//! Upload staging, bulk update and matching of staged rows, and the stored
//! search result set. Every route except session creation needs the
//! `x-session-id` header.

use axum::{
    extract::State,
    response::Response,
    routing::{get, post},
    Json, Router,
};
use pcoq_common::csv::{CsvRow, CsvTable};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use super::bulk::BulkUpdateResponse;
use super::{csv_attachment, ApiJson, Envelope, SessionId, TextBody};
use crate::error::{ApiError, ApiResult};
use crate::models::{Person, SearchResultSet, EXPORT_COLUMNS};
use crate::services::{bulk_update, match_records, ColumnSelection, MatchColumns, MatchReport};
use crate::session::Session;
use crate::AppState;

/// Rows echoed back after an upload
const PREVIEW_ROWS: usize = 5;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionCreated {
    pub session_id: Uuid,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadSummary {
    pub headers: Vec<String>,
    pub row_count: usize,
    pub preview: Vec<CsvRow>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreResultsRequest {
    pub search_kind: String,
    #[serde(default)]
    pub query: String,
    pub people: Vec<Person>,
}

#[derive(Debug, Serialize)]
pub struct StoredCount {
    pub count: usize,
}

#[derive(Debug, Default, Deserialize)]
pub struct ExportResultsRequest {
    pub filename: Option<String>,
}

fn session_not_found() -> ApiError {
    ApiError::NotFound("Session not found or expired".to_string())
}

/// Run `f` against the caller's session, or answer 404
async fn with_session<R>(
    state: &AppState,
    SessionId(id): SessionId,
    f: impl FnOnce(&mut Session) -> R,
) -> ApiResult<R> {
    state
        .sessions
        .with_session(id, f)
        .await
        .ok_or_else(session_not_found)
}

/// Staged rows of the caller's session; 400 when nothing was uploaded
async fn staged_table(state: &AppState, session: SessionId) -> ApiResult<CsvTable> {
    with_session(state, session, |s| s.staged.clone())
        .await?
        .ok_or_else(|| ApiError::BadRequest("No CSV uploaded for this session".to_string()))
}

/// POST /api/session
pub async fn create_session(State(state): State<AppState>) -> Json<Envelope<SessionCreated>> {
    let session_id = state.sessions.create().await;
    Envelope::ok(SessionCreated { session_id })
}

/// POST /api/session/upload
///
/// Body is raw CSV text. Replaces any previously staged upload.
pub async fn upload_csv(
    State(state): State<AppState>,
    session: SessionId,
    TextBody(body): TextBody,
) -> ApiResult<Json<Envelope<UploadSummary>>> {
    // Unknown sessions are a 404 whatever the body holds
    with_session(&state, session, |_| ()).await?;

    let table = CsvTable::parse(&body)?;
    let summary = UploadSummary {
        headers: table.headers.clone(),
        row_count: table.len(),
        preview: table.rows.iter().take(PREVIEW_ROWS).cloned().collect(),
    };

    with_session(&state, session, move |s| s.staged = Some(table)).await?;
    info!(session_id = %session.0, rows = summary.row_count, columns = summary.headers.len(), "CSV staged");
    Ok(Envelope::ok(summary))
}

/// POST /api/session/bulk-update
pub async fn bulk_update_staged(
    State(state): State<AppState>,
    session: SessionId,
) -> ApiResult<Json<BulkUpdateResponse>> {
    let table = staged_table(&state, session).await?;
    let report = bulk_update(&state.pco, &table.rows, state.bulk_concurrency).await;
    Ok(Json(report.into()))
}

/// POST /api/session/match
pub async fn match_staged(
    State(state): State<AppState>,
    session: SessionId,
    ApiJson(selection): ApiJson<ColumnSelection>,
) -> ApiResult<Json<Envelope<MatchReport>>> {
    let table = staged_table(&state, session).await?;
    let columns = MatchColumns::resolve(&table.headers, &selection).map_err(ApiError::BadRequest)?;

    let report = match_records(&state.pco, &table, columns).await;
    info!(
        session_id = %session.0,
        matched = report.summary.matched,
        unmatched = report.summary.unmatched,
        "Staged rows matched"
    );
    Ok(Envelope::ok(report))
}

/// PUT /api/session/results
///
/// Replaces the stored result set.
pub async fn store_results(
    State(state): State<AppState>,
    session: SessionId,
    ApiJson(req): ApiJson<StoreResultsRequest>,
) -> ApiResult<Json<Envelope<StoredCount>>> {
    let results = SearchResultSet::new(req.search_kind, req.query, req.people);
    let count = results.len();

    with_session(&state, session, move |s| s.results = Some(results)).await?;
    Ok(Envelope::ok(StoredCount { count }))
}

/// GET /api/session/results
pub async fn get_results(
    State(state): State<AppState>,
    session: SessionId,
) -> ApiResult<Json<Envelope<SearchResultSet>>> {
    with_session(&state, session, |s| s.results.clone())
        .await?
        .map(Envelope::ok)
        .ok_or_else(|| ApiError::NotFound("No search results stored for this session".to_string()))
}

/// POST /api/session/results/export
///
/// Stored people flattened into the bulk update column layout.
pub async fn export_results(
    State(state): State<AppState>,
    session: SessionId,
    ApiJson(req): ApiJson<ExportResultsRequest>,
) -> ApiResult<Response> {
    let results = with_session(&state, session, |s| s.results.clone())
        .await?
        .ok_or_else(|| ApiError::NotFound("No search results stored for this session".to_string()))?;

    let headers: Vec<String> = EXPORT_COLUMNS.iter().map(|c| c.to_string()).collect();
    let rows: Vec<CsvRow> = results.people.iter().map(Person::to_export_row).collect();
    let body = pcoq_common::csv::write_csv(&headers, &rows);

    let filename = req
        .filename
        .unwrap_or_else(|| format!("pco-{}-results", results.search_kind.to_lowercase().replace(' ', "-")));
    Ok(csv_attachment(body, &filename))
}

/// Build session routes
pub fn session_routes() -> Router<AppState> {
    Router::new()
        .route("/api/session", post(create_session))
        .route("/api/session/upload", post(upload_csv))
        .route("/api/session/bulk-update", post(bulk_update_staged))
        .route("/api/session/match", post(match_staged))
        .route("/api/session/results", get(get_results).put(store_results))
        .route("/api/session/results/export", post(export_results))
}
