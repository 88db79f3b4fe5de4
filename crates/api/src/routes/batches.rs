//! Route definitions for batch generation.
//!
//! Mounted at `/batches`. Both routes answer with an NDJSON stream.
//!
//! ```text
//! POST /preview       generate_preview
//! POST /collection    generate_collection
//! ```

use axum::routing::post;
use axum::Router;

use crate::handlers::batch_generate;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/preview", post(batch_generate::generate_preview))
        .route("/collection", post(batch_generate::generate_collection))
}
