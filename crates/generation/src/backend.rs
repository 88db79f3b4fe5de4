//! The generation backend seam.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// What the backend is asked to render.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GenerationRequest {
    pub prompt: String,
    /// Image the prompt is applied to. `None` means text-to-image.
    pub image_url: Option<String>,
    pub model: String,
}

/// Backend-reported status of a generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GenerationStatus {
    #[serde(alias = "ok", alias = "success")]
    Succeeded,
    #[serde(alias = "error")]
    Failed,
    #[serde(other)]
    Unknown,
}

/// Body returned by the backend for a finished generation.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct GenerationResponse {
    pub status: GenerationStatus,
    #[serde(default)]
    pub output_url: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

/// Transport-level failures talking to the backend.
#[derive(Debug, thiserror::Error)]
pub enum GenerationError {
    /// The HTTP request itself failed (network, DNS, TLS, timeout).
    #[error("Generation request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The backend answered with a non-2xx status.
    #[error("Generation backend error ({status}): {message}")]
    Api {
        status: u16,
        /// Backend-supplied reason, or the raw body.
        message: String,
    },
}

impl GenerationError {
    /// Reason suitable for showing to the client.
    pub fn reason(&self) -> String {
        match self {
            GenerationError::Request(e) => e.to_string(),
            GenerationError::Api { message, .. } => message.clone(),
        }
    }
}

/// Something that turns a prompt (+ optional image) into an output image URL.
#[async_trait]
pub trait GenerationBackend: Send + Sync {
    async fn generate(
        &self,
        request: &GenerationRequest,
    ) -> Result<GenerationResponse, GenerationError>;
}
