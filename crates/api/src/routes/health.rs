use axum::extract::State;
use axum::{routing::get, Json, Router};
use serde::Serialize;

use crate::state::AppState;

/// Health check response payload.
#[derive(Serialize)]
pub struct HealthResponse {
    /// Overall service status.
    pub status: &'static str,
    /// Crate version from Cargo.toml.
    pub version: &'static str,
    /// Whether a generation backend credential is configured.
    pub generation_configured: bool,
}

/// GET /health -- returns service status.
///
/// An unconfigured backend degrades the service rather than failing it:
/// batches still stream, with every job reporting the missing credential.
async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let generation_configured = state.generation_configured();
    let status = if generation_configured { "ok" } else { "degraded" };

    Json(HealthResponse {
        status,
        version: env!("CARGO_PKG_VERSION"),
        generation_configured,
    })
}

/// Mount health check routes (intended for root-level, NOT under `/api/v1`).
pub fn router() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}
