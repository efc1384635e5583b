//! pcoq-server library interface
//!
//! Exposes the router and services for the binary and integration tests.

pub mod api;
pub mod config;
pub mod error;
pub mod models;
pub mod services;
pub mod session;

pub use crate::error::{ApiError, ApiResult};

use axum::{extract::DefaultBodyLimit, http::StatusCode, response::IntoResponse, Router};
use chrono::{DateTime, Utc};
use pcoq_common::config::DEFAULT_MAX_BODY_BYTES;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::services::PcoClient;
use crate::session::SessionStore;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Rate-limited PCO client; clones share one limiter
    pub pco: PcoClient,
    pub sessions: SessionStore,
    /// Rows upserted at once by bulk update
    pub bulk_concurrency: usize,
    /// Request body cap applied to every route
    pub max_body_bytes: usize,
    /// Service startup timestamp for uptime tracking
    pub startup_time: DateTime<Utc>,
}

impl AppState {
    pub fn new(pco: PcoClient, sessions: SessionStore, bulk_concurrency: usize) -> Self {
        Self {
            pco,
            sessions,
            bulk_concurrency: bulk_concurrency.max(1),
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
            startup_time: Utc::now(),
        }
    }

    pub fn with_body_limit(mut self, max_body_bytes: usize) -> Self {
        self.max_body_bytes = max_body_bytes;
        self
    }
}

async fn not_found() -> impl IntoResponse {
    (StatusCode::NOT_FOUND, "Not Found")
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    let body_limit = DefaultBodyLimit::max(state.max_body_bytes);

    Router::new()
        // UI routes (static page and script)
        .merge(api::ui_routes())
        // API routes
        .merge(api::search_routes())
        .merge(api::person_routes())
        .merge(api::export_routes())
        .merge(api::bulk_routes())
        .merge(api::session_routes())
        .merge(api::health_routes())
        .fallback(not_found)
        .layer(body_limit)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
