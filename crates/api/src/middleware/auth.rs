//! JWT-based authentication extractor for Axum handlers.

use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use batchgen_core::error::CoreError;
use batchgen_core::types::DbId;

use crate::auth::jwt::verify_access_token;
use crate::error::AppError;
use crate::state::AppState;

/// Message returned for every authentication failure. The specific reason
/// is only logged.
pub const MSG_UNAUTHORIZED: &str = "Unauthorized";

/// Authenticated caller extracted from a JWT Bearer token in the
/// `Authorization` header.
#[derive(Debug, Clone)]
pub struct AuthUser {
    /// The user's internal database id (from `claims.sub`).
    pub user_id: DbId,
}

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts).map_err(unauthorized)?;

        let claims = verify_access_token(token, &state.config.jwt)
            .map_err(|e| unauthorized(&format!("Invalid or expired token: {e}")))?;

        Ok(AuthUser {
            user_id: claims.sub,
        })
    }
}

fn bearer_token(parts: &Parts) -> Result<&str, &'static str> {
    let header = parts
        .headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or("Missing Authorization header")?;
    header
        .strip_prefix("Bearer ")
        .ok_or("Invalid Authorization format. Expected: Bearer <token>")
}

fn unauthorized(reason: &str) -> AppError {
    tracing::debug!(reason, "Rejecting unauthenticated request");
    AppError::Core(CoreError::Unauthorized(MSG_UNAUTHORIZED.into()))
}
