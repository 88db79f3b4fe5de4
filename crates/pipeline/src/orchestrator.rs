//! Batch orchestrator: runs one [`BatchRun`] end to end.
//!
//! One Tokio task per job. Each task takes a limiter slot, reports
//! `generating`, invokes the backend, persists successes, then records its
//! outcome and reports it. The run waits for every task to settle before
//! writing the terminal event.
//!
//! Recording into the aggregator and emitting the settlement event happen
//! under one short mutex section, so the `current` counter in the stream
//! always increases line by line. The mutex is never held across an await.

use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, PoisonError};

use batchgen_core::batch::aggregator::{ResultAggregator, ResultOrder};
use batchgen_core::batch::event::{BatchEvent, BatchSummary};
use batchgen_core::batch::job::{BatchRun, Job};
use batchgen_core::batch::outcome::{GeneratedImage, JobOutcome};
use batchgen_core::batch::{MAX_CONCURRENT_GENERATIONS, MSG_BACKEND_UNAVAILABLE};
use batchgen_core::types::DbId;
use batchgen_generation::backend::GenerationBackend;
use batchgen_generation::invoker::GenerationInvoker;
use futures::FutureExt;
use rand::seq::SliceRandom;
use tokio::task::{self, JoinSet};
use tracing::Instrument;

use crate::emitter::ProgressEmitter;
use crate::limiter::ConcurrencyLimiter;
use crate::sidecar::{PersistContext, PersistenceFailurePolicy, PersistenceSidecar, StoragePolicy};

/// Reported for a job whose image rendered but could not be saved, when the
/// failure policy counts that as a job failure.
pub const MSG_NOT_SAVED: &str = "Image generated but could not be saved";

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Long-lived collaborators shared by every run.
#[derive(Clone)]
pub struct BatchServices {
    /// `None` when no backend credential is configured.
    pub backend: Option<Arc<dyn GenerationBackend>>,
    pub sidecar: PersistenceSidecar,
}

/// Per-request choices.
#[derive(Debug, Clone)]
pub struct OrchestratorOptions {
    /// Keep submission order. When false, jobs are shuffled before dispatch.
    pub preserve_order: bool,
    pub storage: StoragePolicy,
    pub persistence_failure: PersistenceFailurePolicy,
    pub owner_id: DbId,
    /// Batch-wide image for jobs without a reference image.
    pub base_image_url: Option<String>,
    pub collection_id: Option<String>,
    pub collection_name: Option<String>,
}

// ---------------------------------------------------------------------------
// Orchestrator
// ---------------------------------------------------------------------------

pub struct BatchOrchestrator {
    services: BatchServices,
    options: OrchestratorOptions,
}

impl BatchOrchestrator {
    pub fn new(services: BatchServices, options: OrchestratorOptions) -> Self {
        Self { services, options }
    }

    /// Run every job of `run`, streaming progress through `emitter`.
    ///
    /// Returns once the terminal event has been written.
    pub async fn run(self, run: BatchRun, emitter: ProgressEmitter) -> BatchSummary {
        let span = tracing::info_span!("batch", batch_id = %run.id, total = run.total());
        self.run_inner(run, emitter).instrument(span).await
    }

    async fn run_inner(self, run: BatchRun, emitter: ProgressEmitter) -> BatchSummary {
        let total = run.total();
        let order = if self.options.preserve_order {
            ResultOrder::Submission
        } else {
            ResultOrder::Settlement
        };
        let reporter = Arc::new(Reporter::new(total, emitter.clone()));

        tracing::info!(preserve_order = self.options.preserve_order, "Batch started");
        emitter.emit(&BatchEvent::Started { total });

        match self.services.backend.clone() {
            None => {
                tracing::warn!("Generation backend not configured, failing every job");
                let outcome = JobOutcome::failed(Some(MSG_BACKEND_UNAVAILABLE));
                for job in &run.jobs {
                    reporter.settle(job, &outcome);
                }
            }
            Some(backend) => self.dispatch(run, backend, &reporter).await,
        }

        let summary = reporter.finish(order);
        tracing::info!(
            completed = summary.counters.completed,
            succeeded = summary.counters.succeeded,
            failed = summary.counters.failed,
            "Batch complete",
        );
        emitter.finish(&summary);
        summary
    }

    /// Spawn one task per job and wait for all of them to settle.
    async fn dispatch(self, run: BatchRun, backend: Arc<dyn GenerationBackend>, reporter: &Arc<Reporter>) {
        let BatchOrchestrator { services, options } = self;
        let mut jobs = run.jobs;
        if !options.preserve_order {
            jobs.shuffle(&mut rand::rng());
        }

        let ctx = Arc::new(JobContext {
            invoker: GenerationInvoker::new(backend, options.base_image_url.clone()),
            sidecar: services.sidecar,
            limiter: ConcurrencyLimiter::new(MAX_CONCURRENT_GENERATIONS),
            reporter: Arc::clone(reporter),
            persist: PersistContext {
                owner_id: options.owner_id,
                batch_id: run.id,
                storage: options.storage,
                collection_id: options.collection_id,
                collection_name: options.collection_name,
                on_failure: options.persistence_failure,
            },
        });

        let mut tasks = JoinSet::new();
        let mut pending = HashMap::with_capacity(jobs.len());
        for job in jobs {
            let handle = tasks.spawn(run_job(Arc::clone(&ctx), job.clone()).in_current_span());
            pending.insert(handle.id(), job);
        }

        join_all(tasks, pending, reporter).await;
    }
}

/// Wait for every job task. Settlement, not success, is the join condition.
///
/// A task settles its job as its last step, so a task that ends in a panic or
/// abort left its job unsettled; that job is settled here as failed.
async fn join_all(mut tasks: JoinSet<()>, mut pending: HashMap<task::Id, Job>, reporter: &Reporter) {
    while let Some(result) = tasks.join_next_with_id().await {
        match result {
            Ok((id, ())) => {
                pending.remove(&id);
            }
            Err(e) => {
                tracing::error!(error = %e, "Job task did not complete");
                if let Some(job) = pending.remove(&e.id()) {
                    reporter.settle(&job, &JobOutcome::failed(None));
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Per-job work
// ---------------------------------------------------------------------------

/// Everything a job task needs, shared across the run's tasks.
struct JobContext {
    invoker: GenerationInvoker,
    sidecar: PersistenceSidecar,
    limiter: ConcurrencyLimiter,
    reporter: Arc<Reporter>,
    persist: PersistContext,
}

async fn run_job(ctx: Arc<JobContext>, job: Job) {
    if job.has_blank_prompt() {
        tracing::debug!(job_id = %job.id, "Skipping job with empty prompt");
        ctx.reporter.settle(&job, &JobOutcome::empty_prompt());
        return;
    }

    let permit = match ctx.limiter.acquire().await {
        Ok(permit) => permit,
        Err(e) => {
            ctx.reporter.settle(&job, &JobOutcome::failed(Some(&e.to_string())));
            return;
        }
    };

    tracing::debug!(job_id = %job.id, free_slots = ctx.limiter.available(), "Generating");
    ctx.reporter.started(&job);

    let work = async {
        match ctx.invoker.invoke(&job).await {
            JobOutcome::Ok(image) => ctx.persist(&job, image).await,
            other => other,
        }
    };
    let outcome = match AssertUnwindSafe(work).catch_unwind().await {
        Ok(outcome) => outcome,
        Err(_) => {
            tracing::error!(job_id = %job.id, "Job panicked during generation");
            JobOutcome::failed(None)
        }
    };

    ctx.reporter.settle(&job, &outcome);
    drop(permit);
}

impl JobContext {
    /// Run the sidecar and apply the failure policy.
    async fn persist(&self, job: &Job, image: GeneratedImage) -> JobOutcome {
        let saved = self.sidecar.persist(&self.persist, job, &image.output_url).await;

        if !saved.persisted && self.persist.on_failure == PersistenceFailurePolicy::CountAsFailure {
            return JobOutcome::failed(Some(MSG_NOT_SAVED));
        }

        JobOutcome::Ok(GeneratedImage {
            output_url: saved.image_url,
            persisted: saved.persisted,
            record_id: saved.record_id,
        })
    }
}

// ---------------------------------------------------------------------------
// Reporting
// ---------------------------------------------------------------------------

/// Aggregator plus emitter. The only shared mutable state of a run.
struct Reporter {
    total: usize,
    aggregator: Mutex<ResultAggregator>,
    emitter: ProgressEmitter,
}

impl Reporter {
    fn new(total: usize, emitter: ProgressEmitter) -> Self {
        let mut aggregator = ResultAggregator::new(total);
        if let Err(e) = aggregator.start() {
            tracing::error!(error = %e, "Aggregator refused to start");
        }
        Self {
            total,
            aggregator: Mutex::new(aggregator),
            emitter,
        }
    }

    fn started(&self, job: &Job) {
        self.emitter.emit(&BatchEvent::JobStarted {
            job,
            total: self.total,
        });
    }

    fn settle(&self, job: &Job, outcome: &JobOutcome) {
        let mut aggregator = self.aggregator.lock().unwrap_or_else(PoisonError::into_inner);
        match aggregator.record(job, outcome) {
            Ok(progress) => {
                tracing::debug!(
                    job_id = %job.id,
                    success = outcome.is_success(),
                    current = progress.current,
                    "Job settled",
                );
                self.emitter.emit(&BatchEvent::JobSettled {
                    job,
                    outcome,
                    progress,
                });
            }
            Err(e) => tracing::error!(job_id = %job.id, error = %e, "Failed to record job outcome"),
        }
    }

    fn finish(&self, order: ResultOrder) -> BatchSummary {
        self.aggregator
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .finish(order)
    }
}
