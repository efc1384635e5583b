//! Search endpoints
//!
//! Thin wrappers over the PCO client searches. `/api/search/query` combines
//! several of them and merges the results.

use axum::{extract::State, routing::post, Json, Router};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::{ApiJson, Envelope};
use crate::error::{ApiError, ApiResult};
use crate::models::{dedupe_by_id, Person};
use crate::services::PcoError;
use crate::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NameSearchRequest {
    pub first_name: String,
    pub last_name: String,
}

#[derive(Debug, Deserialize)]
pub struct EmailSearchRequest {
    pub email: String,
}

#[derive(Debug, Deserialize)]
pub struct PhoneSearchRequest {
    pub phone: String,
}

#[derive(Debug, Deserialize)]
pub struct GradeSearchRequest {
    pub grade: i64,
    pub limit: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub struct MembershipSearchRequest {
    pub membership: String,
    pub limit: Option<usize>,
}

/// Any subset of the fields; blank fields are ignored
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CombinedQueryRequest {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub person_id: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CombinedQueryResponse {
    pub people: Vec<Person>,
    /// One line per search that ran, e.g. "Email: a@example.com"
    pub search_info: Vec<String>,
}

type PeopleResponse = Json<Envelope<Vec<Person>>>;

/// POST /api/search/name
pub async fn search_name(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<NameSearchRequest>,
) -> ApiResult<PeopleResponse> {
    let people = state
        .pco
        .search_by_name(&req.first_name, &req.last_name, None)
        .await?;
    info!(count = people.len(), "Name search");
    Ok(Envelope::ok(people))
}

/// POST /api/search/email
pub async fn search_email(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<EmailSearchRequest>,
) -> ApiResult<PeopleResponse> {
    let people = state.pco.search_by_email(&req.email, None).await?;
    info!(count = people.len(), "Email search");
    Ok(Envelope::ok(people))
}

/// POST /api/search/phone
pub async fn search_phone(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<PhoneSearchRequest>,
) -> ApiResult<PeopleResponse> {
    let people = state.pco.search_by_phone(&req.phone, None).await?;
    info!(count = people.len(), "Phone search");
    Ok(Envelope::ok(people))
}

/// POST /api/search/grade
pub async fn search_grade(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<GradeSearchRequest>,
) -> ApiResult<PeopleResponse> {
    let people = state
        .pco
        .search_by_grade(&req.grade.to_string(), req.limit)
        .await?;
    info!(grade = req.grade, count = people.len(), "Grade search");
    Ok(Envelope::ok(people))
}

/// POST /api/search/membership
pub async fn search_membership(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<MembershipSearchRequest>,
) -> ApiResult<PeopleResponse> {
    let people = state
        .pco
        .search_by_membership(&req.membership, req.limit)
        .await?;
    info!(count = people.len(), "Membership search");
    Ok(Envelope::ok(people))
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

/// POST /api/search/query
///
/// Name (first and last together), email, phone and person id searches run
/// in that order. A failing search is skipped; when every search fails the
/// last error is returned.
pub async fn search_query(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<CombinedQueryRequest>,
) -> ApiResult<Json<Envelope<CombinedQueryResponse>>> {
    let first = non_blank(&req.first_name);
    let last = non_blank(&req.last_name);
    let email = non_blank(&req.email);
    let phone = non_blank(&req.phone);
    let person_id = non_blank(&req.person_id);

    if first.is_none() && last.is_none() && email.is_none() && phone.is_none() && person_id.is_none() {
        return Err(ApiError::BadRequest(
            "At least one search field is required".to_string(),
        ));
    }

    let mut people = Vec::new();
    let mut search_info = Vec::new();
    let mut last_error: Option<PcoError> = None;

    let mut record = |label: String, outcome: Result<Vec<Person>, PcoError>| {
        match outcome {
            Ok(found) => {
                people.extend(found);
                search_info.push(label);
            }
            Err(e) => {
                warn!(search = %label, error = %e, "Combined query search failed");
                last_error = Some(e);
            }
        }
    };

    if let (Some(first), Some(last)) = (first, last) {
        let outcome = state.pco.search_by_name(first, last, None).await;
        record(format!("Name: {} {}", first, last), outcome);
    }
    if let Some(email) = email {
        let outcome = state.pco.search_by_email(email, None).await;
        record(format!("Email: {}", email), outcome);
    }
    if let Some(phone) = phone {
        let outcome = state.pco.search_by_phone(phone, None).await;
        record(format!("Phone: {}", phone), outcome);
    }
    if let Some(id) = person_id {
        let outcome = state
            .pco
            .get_person(id)
            .await
            .map(|person| person.into_iter().collect::<Vec<_>>());
        record(format!("Person ID: {}", id), outcome);
    }

    if let Some(e) = last_error {
        if search_info.is_empty() {
            return Err(e.into());
        }
    }

    let people = dedupe_by_id(people);
    info!(count = people.len(), searches = search_info.len(), "Combined query");
    Ok(Envelope::ok(CombinedQueryResponse {
        people,
        search_info,
    }))
}

/// Build search routes
pub fn search_routes() -> Router<AppState> {
    Router::new()
        .route("/api/search/name", post(search_name))
        .route("/api/search/email", post(search_email))
        .route("/api/search/phone", post(search_phone))
        .route("/api/search/grade", post(search_grade))
        .route("/api/search/membership", post(search_membership))
        .route("/api/search/query", post(search_query))
}
