//! Handlers for the `/batches` resource.
//!
//! Both endpoints validate the request, answer `200` with an NDJSON body,
//! and hand the run to a detached orchestrator task that writes into that
//! body. Validation errors are the only failures reported as a status code.

use std::convert::Infallible;

use axum::body::Body;
use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::header::{self, HeaderName};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use batchgen_core::batch::job::{normalize_jobs, BatchRun, NormalizeOptions};
use batchgen_core::batch::wire::WireShape;
use batchgen_pipeline::{BatchOrchestrator, OrchestratorOptions, ProgressEmitter, StoragePolicy};
use futures::StreamExt;
use serde::Deserialize;
use tracing::Instrument;

use crate::error::{AppError, AppResult};
use crate::middleware::auth::AuthUser;
use crate::state::AppState;

pub const NDJSON_CONTENT_TYPE: &str = "application/x-ndjson";

/// Disables response buffering in nginx-style reverse proxies.
static X_ACCEL_BUFFERING: HeaderName = HeaderName::from_static("x-accel-buffering");

/// Object-store prefix for collection uploads.
const COLLECTION_PREFIX: &str = "collections";

// ---------------------------------------------------------------------------
// Request types
// ---------------------------------------------------------------------------

/// Body shared by both batch endpoints.
///
/// `templates` stays loosely typed: malformed entries become jobs that fail
/// individually instead of rejecting the whole request.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchGenerateRequest {
    pub model: Option<String>,
    #[serde(default)]
    pub templates: Vec<serde_json::Value>,
    pub base_image_url: Option<String>,
    pub collection_id: Option<String>,
    pub collection_name: Option<String>,
}

/// The two entry points differ only in these choices.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BatchVariant {
    Preview,
    Collection,
}

impl BatchVariant {
    fn shape(self) -> WireShape {
        match self {
            BatchVariant::Preview => WireShape::Preview,
            BatchVariant::Collection => WireShape::Collection,
        }
    }
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// POST /api/v1/batches/preview
///
/// Runs every template against the base image in random order and streams
/// `progress` events followed by `complete{results}`. Output URLs are the
/// backend's own.
pub async fn generate_preview(
    State(state): State<AppState>,
    user: AuthUser,
    payload: Result<Json<BatchGenerateRequest>, JsonRejection>,
) -> AppResult<Response> {
    start_batch(state, user, payload, BatchVariant::Preview)
}

/// POST /api/v1/batches/collection
///
/// Runs every template in submission order, copies outputs into the object
/// store, and streams `start`, `progress` by index, then `done{counts}`.
pub async fn generate_collection(
    State(state): State<AppState>,
    user: AuthUser,
    payload: Result<Json<BatchGenerateRequest>, JsonRejection>,
) -> AppResult<Response> {
    start_batch(state, user, payload, BatchVariant::Collection)
}

fn start_batch(
    state: AppState,
    user: AuthUser,
    payload: Result<Json<BatchGenerateRequest>, JsonRejection>,
    variant: BatchVariant,
) -> AppResult<Response> {
    let Json(input) = payload.map_err(|e| AppError::BadRequest(e.body_text()))?;

    let jobs = normalize_jobs(
        &input.templates,
        &NormalizeOptions {
            base_image_url: input.base_image_url.as_deref(),
            request_model: input.model.as_deref(),
            default_model: &state.config.batch.default_model,
            require_base_image: variant == BatchVariant::Preview,
        },
    )?;
    let run = BatchRun::new(jobs);

    let storage = match variant {
        BatchVariant::Preview => StoragePolicy::KeepBackendUrl,
        BatchVariant::Collection => {
            let folder = input
                .collection_id
                .clone()
                .unwrap_or_else(|| run.id.to_string());
            StoragePolicy::Upload {
                prefix: format!("{COLLECTION_PREFIX}/{folder}"),
            }
        }
    };

    let options = OrchestratorOptions {
        preserve_order: variant == BatchVariant::Collection,
        storage,
        persistence_failure: state.config.batch.persistence_failure,
        owner_id: user.user_id,
        base_image_url: input.base_image_url,
        collection_id: input.collection_id,
        collection_name: input.collection_name,
    };

    tracing::info!(
        batch_id = %run.id,
        user_id = user.user_id,
        variant = ?variant,
        total = run.total(),
        "Starting batch generation",
    );

    let (emitter, stream) = ProgressEmitter::channel(variant.shape());
    let orchestrator = BatchOrchestrator::new(state.services.clone(), options);
    // The run outlives the request if the client goes away.
    drop(tokio::spawn(orchestrator.run(run, emitter).in_current_span()));

    Ok(ndjson_response(Body::from_stream(
        stream.map(Ok::<_, Infallible>),
    )))
}

fn ndjson_response(body: Body) -> Response {
    (
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, NDJSON_CONTENT_TYPE),
            (header::CACHE_CONTROL, "no-cache"),
            (X_ACCEL_BUFFERING.clone(), "no"),
        ],
        body,
    )
        .into_response()
}
