//! HTTP API handlers for pcoq-server
//!
//! Success bodies are `{"success": true, "data": ...}`; failures are rendered
//! by [`ApiError`](crate::error::ApiError).

pub mod bulk;
pub mod export;
pub mod health;
pub mod person;
pub mod search;
pub mod session;
pub mod ui;

pub use bulk::bulk_routes;
pub use export::export_routes;
pub use health::health_routes;
pub use person::person_routes;
pub use search::search_routes;
pub use session::session_routes;
pub use ui::ui_routes;

use axum::{
    async_trait,
    body::Bytes,
    extract::{FromRequest, FromRequestParts, Request},
    http::{header, request::Parts, StatusCode},
    response::{IntoResponse, Response},
};
use serde::{de::DeserializeOwned, Serialize};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::ApiError;

/// Header carrying the session id on session-scoped routes
pub const SESSION_HEADER: &str = "x-session-id";

const INVALID_BODY: &str = "Invalid request body";

/// Buffer a request body; over-limit bodies are a 413, anything else a 400
async fn read_body<S>(req: Request, state: &S) -> Result<Bytes, ApiError>
where
    S: Send + Sync,
{
    Bytes::from_request(req, state).await.map_err(|e| {
        if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
            warn!(error = %e, "Request body over limit");
            ApiError::PayloadTooLarge("Request body too large".to_string())
        } else {
            debug!(error = %e, "Request body unreadable");
            ApiError::BadRequest(INVALID_BODY.to_string())
        }
    })
}

/// Success envelope
#[derive(Debug, Serialize)]
pub struct Envelope<T> {
    pub success: bool,
    pub data: T,
}

impl<T: Serialize> Envelope<T> {
    pub fn ok(data: T) -> axum::Json<Self> {
        axum::Json(Self {
            success: true,
            data,
        })
    }
}

/// JSON body extractor answering 400 "Invalid request body" on any rejection
///
/// The content type is not checked; the browser client does not always set it.
pub struct ApiJson<T>(pub T);

#[async_trait]
impl<T, S> FromRequest<S> for ApiJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let bytes = read_body(req, state).await?;

        serde_json::from_slice(&bytes).map(ApiJson).map_err(|e| {
            debug!(error = %e, "Request body rejected");
            ApiError::BadRequest(INVALID_BODY.to_string())
        })
    }
}

/// Raw UTF-8 text body, e.g. an uploaded CSV file
pub struct TextBody(pub String);

#[async_trait]
impl<S> FromRequest<S> for TextBody
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let bytes = read_body(req, state).await?;
        String::from_utf8(bytes.to_vec())
            .map(TextBody)
            .map_err(|_| ApiError::BadRequest("Request body is not UTF-8 text".to_string()))
    }
}

/// Session id from the `x-session-id` header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionId(pub Uuid);

#[async_trait]
impl<S> FromRequestParts<S> for SessionId
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let value = parts
            .headers
            .get(SESSION_HEADER)
            .ok_or_else(|| ApiError::BadRequest(format!("Missing {} header", SESSION_HEADER)))?;

        value
            .to_str()
            .ok()
            .and_then(|text| Uuid::parse_str(text.trim()).ok())
            .map(SessionId)
            .ok_or_else(|| ApiError::BadRequest(format!("Malformed {} header", SESSION_HEADER)))
    }
}

/// Make a user-supplied name safe for a Content-Disposition header
///
/// Quotes, backslashes and control characters are removed; `.csv` is
/// appended when missing and an empty name becomes `export.csv`.
pub fn sanitize_filename(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .filter(|c| !c.is_control() && *c != '"' && *c != '\\')
        .collect();
    let cleaned = cleaned.trim();

    if cleaned.is_empty() {
        "export.csv".to_string()
    } else if cleaned.to_ascii_lowercase().ends_with(".csv") {
        cleaned.to_string()
    } else {
        format!("{}.csv", cleaned)
    }
}

/// CSV download response
pub fn csv_attachment(body: String, filename: &str) -> Response {
    let disposition = format!("attachment; filename=\"{}\"", sanitize_filename(filename));
    (
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        body,
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_filename() {
        assert_eq!(sanitize_filename("people"), "people.csv");
        assert_eq!(sanitize_filename("people.CSV"), "people.CSV");
        assert_eq!(sanitize_filename("a\"b\r\n.csv"), "ab.csv");
        assert_eq!(sanitize_filename("  "), "export.csv");
        assert_eq!(sanitize_filename(""), "export.csv");
    }
}
