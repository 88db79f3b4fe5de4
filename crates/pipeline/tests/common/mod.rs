//! Test doubles for the orchestrator's collaborators.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use batchgen_cloud::storage::{ObjectStore, StorageError};
use batchgen_cloud::thumbnail::{ThumbnailError, ThumbnailService, ThumbnailTrigger};
use batchgen_core::batch::job::{normalize_jobs, BatchRun, NormalizeOptions};
use batchgen_core::batch::wire::WireShape;
use batchgen_db::models::image_record::NewImageRecord;
use batchgen_db::sink::{RecordSink, RecordSinkError};
use batchgen_generation::backend::{
    GenerationBackend, GenerationError, GenerationRequest, GenerationResponse, GenerationStatus,
};
use batchgen_pipeline::sidecar::PersistenceSidecar;
use batchgen_pipeline::{
    BatchServices, OrchestratorOptions, PersistenceFailurePolicy, ProgressEmitter, StoragePolicy,
};
use serde_json::Value;
use tokio_stream::StreamExt;
use uuid::Uuid;

/// Prompt that makes [`StubBackend`] report a failure.
pub const FAILING_PROMPT: &str = "please fail";

// ---------------------------------------------------------------------------
// Generation backend
// ---------------------------------------------------------------------------

/// Backend that succeeds for every prompt except [`FAILING_PROMPT`], while
/// tracking how many calls are in flight.
#[derive(Default)]
pub struct StubBackend {
    pub calls: AtomicUsize,
    in_flight: AtomicUsize,
    pub peak_in_flight: AtomicUsize,
    pub delay: Duration,
}

impl StubBackend {
    pub fn with_delay(delay: Duration) -> Self {
        Self {
            delay,
            ..Self::default()
        }
    }
}

#[async_trait]
impl GenerationBackend for StubBackend {
    async fn generate(
        &self,
        request: &GenerationRequest,
    ) -> Result<GenerationResponse, GenerationError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(now, Ordering::SeqCst);

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if request.prompt == FAILING_PROMPT {
            return Ok(GenerationResponse {
                status: GenerationStatus::Failed,
                output_url: None,
                error: Some("backend refused".to_string()),
            });
        }
        Ok(GenerationResponse {
            status: GenerationStatus::Succeeded,
            output_url: Some(format!("https://backend.example.com/{}.png", request.prompt.len())),
            error: None,
        })
    }
}

// ---------------------------------------------------------------------------
// Persistence collaborators
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct MemoryRecords {
    pub fail: bool,
    pub records: Mutex<Vec<NewImageRecord>>,
}

#[async_trait]
impl RecordSink for MemoryRecords {
    async fn insert(&self, record: &NewImageRecord) -> Result<Uuid, RecordSinkError> {
        if self.fail {
            return Err(RecordSinkError::Unavailable("disk full".to_string()));
        }
        self.records.lock().unwrap().push(record.clone());
        Ok(Uuid::new_v4())
    }
}

#[derive(Default)]
pub struct MemoryStore {
    pub fail: bool,
    pub keys: Mutex<Vec<String>>,
}

#[async_trait]
impl ObjectStore for MemoryStore {
    async fn copy_from_url(&self, _source_url: &str, key: &str) -> Result<String, StorageError> {
        if self.fail {
            return Err(StorageError::Upload("bucket missing".to_string()));
        }
        self.keys.lock().unwrap().push(key.to_string());
        Ok(format!("https://cdn.example.com/{key}"))
    }
}

#[derive(Default)]
pub struct FailingThumbnails {
    pub calls: AtomicUsize,
}

#[async_trait]
impl ThumbnailService for FailingThumbnails {
    async fn request_thumbnail(
        &self,
        _record_id: &str,
        _image_url: &str,
    ) -> Result<(), ThumbnailError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(ThumbnailError::Status(500))
    }
}

// ---------------------------------------------------------------------------
// Harness
// ---------------------------------------------------------------------------

pub struct Harness {
    pub backend: Arc<StubBackend>,
    pub records: Arc<MemoryRecords>,
    pub store: Arc<MemoryStore>,
    pub thumbnails: Arc<FailingThumbnails>,
    pub configured: bool,
}

impl Harness {
    pub fn new() -> Self {
        Self {
            backend: Arc::new(StubBackend::default()),
            records: Arc::new(MemoryRecords::default()),
            store: Arc::new(MemoryStore::default()),
            thumbnails: Arc::new(FailingThumbnails::default()),
            configured: true,
        }
    }

    pub fn services(&self) -> BatchServices {
        let backend: Option<Arc<dyn GenerationBackend>> = if self.configured {
            Some(self.backend.clone())
        } else {
            None
        };
        BatchServices {
            backend,
            sidecar: PersistenceSidecar::new(
                Some(self.store.clone()),
                self.records.clone(),
                ThumbnailTrigger::new(self.thumbnails.clone()),
            ),
        }
    }
}

pub fn preview_options() -> OrchestratorOptions {
    OrchestratorOptions {
        preserve_order: false,
        storage: StoragePolicy::KeepBackendUrl,
        persistence_failure: PersistenceFailurePolicy::DegradedSuccess,
        owner_id: 1,
        base_image_url: Some("https://cdn.example.com/base.png".to_string()),
        collection_id: None,
        collection_name: None,
    }
}

pub fn collection_options() -> OrchestratorOptions {
    OrchestratorOptions {
        preserve_order: true,
        storage: StoragePolicy::Upload {
            prefix: "collections/c1".to_string(),
        },
        collection_id: Some("c1".to_string()),
        collection_name: Some("Summer".to_string()),
        ..preview_options()
    }
}

/// Build a run from plain prompts; ids are `job-{i}`.
pub fn run_of(prompts: &[&str]) -> BatchRun {
    let raw: Vec<Value> = prompts
        .iter()
        .enumerate()
        .map(|(i, p)| serde_json::json!({"id": format!("job-{i}"), "prompt": p}))
        .collect();
    let jobs = normalize_jobs(
        &raw,
        &NormalizeOptions {
            base_image_url: Some("https://cdn.example.com/base.png"),
            request_model: None,
            default_model: "test-model",
            require_base_image: false,
        },
    )
    .expect("non-empty job list");
    BatchRun::new(jobs)
}

/// Run the orchestrator and collect every line it wrote, parsed.
pub async fn run_and_collect(
    harness: &Harness,
    options: OrchestratorOptions,
    shape: WireShape,
    run: BatchRun,
) -> (batchgen_core::batch::event::BatchSummary, Vec<Value>) {
    let (emitter, stream) = ProgressEmitter::channel(shape);
    let orchestrator = batchgen_pipeline::BatchOrchestrator::new(harness.services(), options);
    let summary = orchestrator.run(run, emitter).await;

    let lines: Vec<String> = stream.collect().await;
    let events = lines
        .iter()
        .map(|l| {
            assert!(l.ends_with('\n'), "every event is newline-terminated");
            serde_json::from_str(l).expect("every line is JSON")
        })
        .collect();
    (summary, events)
}
