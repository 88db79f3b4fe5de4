//! Thumbnail generation requests.
//!
//! Thumbnails are never awaited by the job that asks for them.
//! [`ThumbnailTrigger::fire`] returns `()`: the request runs on a detached
//! task with no channel back to the caller, and its failure is only logged.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;

#[derive(Debug, thiserror::Error)]
pub enum ThumbnailError {
    #[error("Thumbnail request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Thumbnail service returned HTTP {0}")]
    Status(u16),
}

/// Downstream service that renders a thumbnail for a stored image record.
#[async_trait]
pub trait ThumbnailService: Send + Sync {
    async fn request_thumbnail(&self, record_id: &str, image_url: &str)
        -> Result<(), ThumbnailError>;
}

/// Posts `{recordId, imageUrl}` to a thumbnail service endpoint.
pub struct HttpThumbnailService {
    client: reqwest::Client,
    endpoint: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ThumbnailRequest<'a> {
    record_id: &'a str,
    image_url: &'a str,
}

impl HttpThumbnailService {
    pub fn new(client: reqwest::Client, endpoint: impl Into<String>) -> Self {
        Self {
            client,
            endpoint: endpoint.into(),
        }
    }
}

#[async_trait]
impl ThumbnailService for HttpThumbnailService {
    async fn request_thumbnail(
        &self,
        record_id: &str,
        image_url: &str,
    ) -> Result<(), ThumbnailError> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(&ThumbnailRequest {
                record_id,
                image_url,
            })
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(ThumbnailError::Status(response.status().as_u16()));
        }
        Ok(())
    }
}

/// Used when no thumbnail service is configured.
pub struct NoopThumbnailService;

#[async_trait]
impl ThumbnailService for NoopThumbnailService {
    async fn request_thumbnail(
        &self,
        record_id: &str,
        _image_url: &str,
    ) -> Result<(), ThumbnailError> {
        tracing::debug!(record_id, "No thumbnail service configured, skipping");
        Ok(())
    }
}

/// Fire-and-forget front for a [`ThumbnailService`].
#[derive(Clone)]
pub struct ThumbnailTrigger {
    service: Arc<dyn ThumbnailService>,
}

impl ThumbnailTrigger {
    pub fn new(service: Arc<dyn ThumbnailService>) -> Self {
        Self { service }
    }

    /// Request a thumbnail on a detached task.
    ///
    /// Must be called from within a Tokio runtime. The join handle is
    /// dropped on purpose: nothing may wait on this request.
    pub fn fire(&self, record_id: String, image_url: String) {
        let service = Arc::clone(&self.service);
        drop(tokio::spawn(async move {
            if let Err(e) = service.request_thumbnail(&record_id, &image_url).await {
                tracing::warn!(record_id = %record_id, error = %e, "Thumbnail request failed");
            }
        }));
    }
}
