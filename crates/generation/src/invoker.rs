//! One backend call per job.
//!
//! The invoker owns no mutable state, so any number of invocations may run
//! side by side; the orchestrator's limiter decides how many actually do.

use std::sync::Arc;

use batchgen_core::batch::job::Job;
use batchgen_core::batch::outcome::{GeneratedImage, JobOutcome};

use crate::backend::{GenerationBackend, GenerationRequest, GenerationStatus};

#[derive(Clone)]
pub struct GenerationInvoker {
    backend: Arc<dyn GenerationBackend>,
    base_image_url: Option<String>,
}

impl GenerationInvoker {
    /// * `base_image_url` - Batch-wide image used for jobs without a reference image.
    pub fn new(backend: Arc<dyn GenerationBackend>, base_image_url: Option<String>) -> Self {
        Self {
            backend,
            base_image_url,
        }
    }

    /// Run one job against the backend.
    ///
    /// Blank prompts return [`JobOutcome::EmptyInput`] without a backend
    /// call. Every backend or transport failure becomes
    /// [`JobOutcome::Failed`]; this never returns an error.
    pub async fn invoke(&self, job: &Job) -> JobOutcome {
        if job.has_blank_prompt() {
            return JobOutcome::empty_prompt();
        }

        let request = GenerationRequest {
            prompt: job.prompt.clone(),
            image_url: job
                .reference_image_url
                .clone()
                .or_else(|| self.base_image_url.clone()),
            model: job.model.clone(),
        };

        match self.backend.generate(&request).await {
            Ok(response) => {
                let output_url = response
                    .output_url
                    .as_deref()
                    .map(str::trim)
                    .filter(|u| !u.is_empty());
                match (response.status, output_url) {
                    (GenerationStatus::Succeeded, Some(url)) => {
                        JobOutcome::Ok(GeneratedImage::rendered(url))
                    }
                    (status, _) => {
                        tracing::warn!(
                            job_id = %job.id,
                            ?status,
                            error = response.error.as_deref().unwrap_or_default(),
                            "Generation backend reported failure",
                        );
                        JobOutcome::failed(response.error.as_deref())
                    }
                }
            }
            Err(e) => {
                tracing::warn!(job_id = %job.id, error = %e, "Generation request failed");
                JobOutcome::failed(Some(&e.reason()))
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
