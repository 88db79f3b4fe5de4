//! Persistence sidecar: what happens after a successful generation.
//!
//! 1. Optionally copy the backend output to durable storage.
//! 2. Write one metadata record.
//! 3. Fire a thumbnail request without waiting for it.
//!
//! Failures in 1 or 2 leave the image rendered but unsaved. Under
//! [`PersistenceFailurePolicy::CountAsFailure`] a failed upload stops there,
//! so no record or thumbnail exists for a job reported as failed. Failures in
//! 3 are logged by the thumbnail trigger and never reach the caller.

use std::str::FromStr;
use std::sync::Arc;

use batchgen_cloud::storage::ObjectStore;
use batchgen_cloud::thumbnail::ThumbnailTrigger;
use batchgen_core::batch::job::Job;
use batchgen_core::types::DbId;
use batchgen_db::models::image_record::NewImageRecord;
use batchgen_db::sink::RecordSink;
use uuid::Uuid;

/// Image extensions kept when deriving a storage key from the source URL.
const KNOWN_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "webp"];

/// Extension used when the source URL does not carry a known one.
const DEFAULT_EXTENSION: &str = "png";

// ---------------------------------------------------------------------------
// Policies
// ---------------------------------------------------------------------------

/// Where a generated image's permanent URL comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoragePolicy {
    /// Keep the backend-provided URL as is.
    KeepBackendUrl,
    /// Copy into the object store under `prefix`.
    Upload { prefix: String },
}

/// How a failed save is reported to the client.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PersistenceFailurePolicy {
    /// The job still counts as succeeded, flagged `saved: false`.
    #[default]
    DegradedSuccess,
    /// The job is reported as failed.
    CountAsFailure,
}

impl FromStr for PersistenceFailurePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "degraded" => Ok(Self::DegradedSuccess),
            "fail" => Ok(Self::CountAsFailure),
            other => Err(format!(
                "Invalid persistence failure policy '{other}'. Must be one of: degraded, fail"
            )),
        }
    }
}

// ---------------------------------------------------------------------------
// Sidecar
// ---------------------------------------------------------------------------

/// Batch-wide inputs to every persist call.
#[derive(Debug, Clone)]
pub struct PersistContext {
    pub owner_id: DbId,
    pub batch_id: Uuid,
    pub storage: StoragePolicy,
    pub collection_id: Option<String>,
    pub collection_name: Option<String>,
    pub on_failure: PersistenceFailurePolicy,
}

/// What the sidecar managed to do for one image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersistedOutcome {
    /// Durable URL when the upload succeeded, backend URL otherwise.
    pub image_url: String,
    pub persisted: bool,
    pub record_id: Option<String>,
}

#[derive(Clone)]
pub struct PersistenceSidecar {
    store: Option<Arc<dyn ObjectStore>>,
    records: Arc<dyn RecordSink>,
    thumbnails: ThumbnailTrigger,
}

impl PersistenceSidecar {
    /// * `store` - Object store for [`StoragePolicy::Upload`]; `None` keeps backend URLs.
    pub fn new(
        store: Option<Arc<dyn ObjectStore>>,
        records: Arc<dyn RecordSink>,
        thumbnails: ThumbnailTrigger,
    ) -> Self {
        Self {
            store,
            records,
            thumbnails,
        }
    }

    /// Persist one successfully generated image. Never fails.
    pub async fn persist(&self, ctx: &PersistContext, job: &Job, output_url: &str) -> PersistedOutcome {
        let (image_url, uploaded) = self.store_image(ctx, job, output_url).await;

        if !uploaded && ctx.on_failure == PersistenceFailurePolicy::CountAsFailure {
            return PersistedOutcome {
                image_url,
                persisted: false,
                record_id: None,
            };
        }

        let record = NewImageRecord {
            owner_id: ctx.owner_id,
            batch_id: ctx.batch_id,
            template_id: job.id.clone(),
            template_name: job.display_name.clone(),
            prompt: job.prompt.clone(),
            model: job.model.clone(),
            source_url: output_url.to_string(),
            image_url: image_url.clone(),
            collection_id: ctx.collection_id.clone(),
            collection_name: ctx.collection_name.clone(),
        };

        let record_id = match self.records.insert(&record).await {
            Ok(id) => id.to_string(),
            Err(e) => {
                tracing::error!(
                    batch_id = %ctx.batch_id,
                    job_id = %job.id,
                    error = %e,
                    "Failed to save image record",
                );
                return PersistedOutcome {
                    image_url,
                    persisted: false,
                    record_id: None,
                };
            }
        };

        self.thumbnails.fire(record_id.clone(), image_url.clone());

        PersistedOutcome {
            image_url,
            persisted: uploaded,
            record_id: Some(record_id),
        }
    }

    /// Apply the storage policy. Returns the URL to record and whether the
    /// policy was fully honoured.
    async fn store_image(&self, ctx: &PersistContext, job: &Job, output_url: &str) -> (String, bool) {
        let StoragePolicy::Upload { prefix } = &ctx.storage else {
            return (output_url.to_string(), true);
        };

        let Some(store) = &self.store else {
            tracing::warn!(job_id = %job.id, "No object store configured, keeping backend URL");
            return (output_url.to_string(), false);
        };

        let key = storage_key(prefix, &job.id, output_url);
        match store.copy_from_url(output_url, &key).await {
            Ok(url) => (url, true),
            Err(e) => {
                tracing::error!(
                    batch_id = %ctx.batch_id,
                    job_id = %job.id,
                    key,
                    error = %e,
                    "Failed to upload generated image",
                );
                (output_url.to_string(), false)
            }
        }
    }
}

/// `{prefix}/{job-id}-{uuid}.{ext}` with the job id reduced to a safe
/// character set.
fn storage_key(prefix: &str, job_id: &str, source_url: &str) -> String {
    let safe_id: String = job_id
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect();
    format!(
        "{}/{safe_id}-{}.{}",
        prefix.trim_end_matches('/'),
        Uuid::new_v4(),
        extension_of(source_url)
    )
}

fn extension_of(url: &str) -> &'static str {
    let path = url.split(['?', '#']).next().unwrap_or_default();
    let ext = path
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();
    KNOWN_EXTENSIONS
        .iter()
        .find(|known| **known == ext)
        .copied()
        .unwrap_or(DEFAULT_EXTENSION)
}
