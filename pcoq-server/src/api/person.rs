//! Person details endpoint

use axum::{extract::State, routing::post, Json, Router};
use serde::Deserialize;

use super::{ApiJson, Envelope};
use crate::error::{ApiError, ApiResult};
use crate::models::Person;
use crate::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersonDetailsRequest {
    pub person_id: String,
}

/// POST /api/person-details
///
/// The person with phone numbers, emails and addresses, or 404.
pub async fn person_details(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<PersonDetailsRequest>,
) -> ApiResult<Json<Envelope<Person>>> {
    state
        .pco
        .get_person(&req.person_id)
        .await?
        .map(Envelope::ok)
        .ok_or_else(|| ApiError::NotFound("Person not found".to_string()))
}

pub fn person_routes() -> Router<AppState> {
    Router::new().route("/api/person-details", post(person_details))
}
