#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Method, Request};
use axum::response::Response;
use axum::Router;
use batchgen_api::auth::jwt::JwtConfig;
use batchgen_api::config::{BatchConfig, ServerConfig};
use batchgen_api::router::build_app_router;
use batchgen_api::state::AppState;
use batchgen_cloud::storage::{ObjectStore, StorageError};
use batchgen_cloud::thumbnail::{NoopThumbnailService, ThumbnailTrigger};
use batchgen_db::models::image_record::NewImageRecord;
use batchgen_db::sink::{RecordSink, RecordSinkError};
use batchgen_generation::backend::{
    GenerationBackend, GenerationError, GenerationRequest, GenerationResponse, GenerationStatus,
};
use batchgen_pipeline::{BatchServices, PersistenceFailurePolicy, PersistenceSidecar};
use http_body_util::BodyExt;
use tower::ServiceExt;

pub const TEST_USER_ID: i64 = 7;

// ---------------------------------------------------------------------------
// Stub collaborators
// ---------------------------------------------------------------------------

/// Succeeds for every prompt except `"fail"`.
#[derive(Default)]
pub struct StubBackend {
    pub calls: AtomicUsize,
}

#[async_trait]
impl GenerationBackend for StubBackend {
    async fn generate(
        &self,
        request: &GenerationRequest,
    ) -> Result<GenerationResponse, GenerationError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if request.prompt == "fail" {
            return Err(GenerationError::Api {
                status: 502,
                message: "upstream exploded".to_string(),
            });
        }
        Ok(GenerationResponse {
            status: GenerationStatus::Succeeded,
            output_url: Some("https://backend.example.com/out.png".to_string()),
            error: None,
        })
    }
}

#[derive(Default)]
pub struct CountingRecords {
    pub inserted: AtomicUsize,
}

#[async_trait]
impl RecordSink for CountingRecords {
    async fn insert(&self, _record: &NewImageRecord) -> Result<uuid::Uuid, RecordSinkError> {
        self.inserted.fetch_add(1, Ordering::SeqCst);
        Ok(uuid::Uuid::new_v4())
    }
}

pub struct PrefixStore;

#[async_trait]
impl ObjectStore for PrefixStore {
    async fn copy_from_url(&self, _source_url: &str, key: &str) -> Result<String, StorageError> {
        Ok(format!("https://cdn.example.com/{key}"))
    }
}

// ---------------------------------------------------------------------------
// App construction
// ---------------------------------------------------------------------------

pub fn jwt_config() -> JwtConfig {
    JwtConfig {
        secret: "test-secret-that-is-long-enough-for-hmac".to_string(),
        leeway_secs: 0,
    }
}

/// Build a test `ServerConfig` with safe defaults.
pub fn test_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 30,
        jwt: jwt_config(),
        batch: BatchConfig {
            default_model: "test-model".to_string(),
            persistence_failure: PersistenceFailurePolicy::DegradedSuccess,
        },
    }
}

pub struct TestApp {
    pub router: Router,
    pub backend: Arc<StubBackend>,
    pub records: Arc<CountingRecords>,
}

/// Build the full application router with stub collaborators.
///
/// * `configured` - Whether a generation backend is available.
pub fn build_test_app(configured: bool) -> TestApp {
    let config = test_config();
    let backend = Arc::new(StubBackend::default());
    let records = Arc::new(CountingRecords::default());

    let services = BatchServices {
        backend: configured.then(|| backend.clone() as Arc<dyn GenerationBackend>),
        sidecar: PersistenceSidecar::new(
            Some(Arc::new(PrefixStore)),
            records.clone(),
            ThumbnailTrigger::new(Arc::new(NoopThumbnailService)),
        ),
    };
    let state = AppState {
        config: Arc::new(config.clone()),
        services,
    };

    TestApp {
        router: build_app_router(state, &config),
        backend,
        records,
    }
}

/// Sign a token the way the identity service does.
pub fn bearer() -> String {
    let claims = serde_json::json!({
        "sub": TEST_USER_ID,
        "exp": chrono::Utc::now().timestamp() + 900,
    });
    let token = jsonwebtoken::encode(
        &jsonwebtoken::Header::default(),
        &claims,
        &jsonwebtoken::EncodingKey::from_secret(jwt_config().secret.as_bytes()),
    )
    .expect("token");
    format!("Bearer {token}")
}

// ---------------------------------------------------------------------------
// Request helpers
// ---------------------------------------------------------------------------

pub async fn get(app: Router, uri: &str) -> Response {
    let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
    app.oneshot(request).await.unwrap()
}

pub async fn post_json(app: Router, uri: &str, body: serde_json::Value) -> Response {
    send_post(app, uri, body, None).await
}

pub async fn post_json_auth(app: Router, uri: &str, body: serde_json::Value) -> Response {
    send_post(app, uri, body, Some(bearer())).await
}

async fn send_post(
    app: Router,
    uri: &str,
    body: serde_json::Value,
    authorization: Option<String>,
) -> Response {
    let mut builder = Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header("content-type", "application/json");
    if let Some(value) = authorization {
        builder = builder.header("authorization", value);
    }
    let request = builder
        .body(Body::from(serde_json::to_vec(&body).unwrap()))
        .unwrap();
    app.oneshot(request).await.unwrap()
}

// ---------------------------------------------------------------------------
// Body helpers
// ---------------------------------------------------------------------------

pub async fn body_json(response: Response) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

/// Read a streamed NDJSON body to the end and decode every line.
pub async fn body_ndjson(response: Response) -> Vec<serde_json::Value> {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let mut decoder = batchgen_core::ndjson::NdjsonDecoder::<serde_json::Value>::new();
    let mut events = decoder.push(&bytes);
    assert_eq!(decoder.skipped(), 0, "every line must be valid JSON");
    events.extend(decoder.finish());
    events
}
