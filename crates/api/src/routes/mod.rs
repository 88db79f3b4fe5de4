pub mod batches;
pub mod health;

use axum::Router;

use crate::state::AppState;

/// Build the `/api/v1` route tree.
///
/// ```text
/// /batches/preview                                 streaming preview run (POST)
/// /batches/collection                              streaming collection run (POST)
/// ```
///
/// Every route requires a Bearer token.
pub fn api_routes() -> Router<AppState> {
    Router::new().nest("/batches", batches::router())
}
