//! HTTP client for the generation backend.
//!
//! Wraps `POST {api_url}/v1/generations` using [`reqwest`]. Timeout policy
//! lives here, on the client, not in the orchestrator.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use crate::backend::{GenerationBackend, GenerationError, GenerationRequest, GenerationResponse};

/// HTTP implementation of [`GenerationBackend`].
pub struct HttpGenerationBackend {
    client: reqwest::Client,
    api_url: String,
    api_key: String,
}

/// Error body some backend deployments return alongside a non-2xx status.
#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: Option<String>,
    message: Option<String>,
}

impl HttpGenerationBackend {
    /// Create a client for the backend at `api_url` authenticating with
    /// `api_key`.
    ///
    /// * `timeout` - Whole-request timeout applied to every generation call.
    pub fn new(
        api_url: impl Into<String>,
        api_key: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, GenerationError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self::with_client(client, api_url, api_key))
    }

    /// Create a client reusing an existing [`reqwest::Client`].
    pub fn with_client(
        client: reqwest::Client,
        api_url: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Self {
        Self {
            client,
            api_url: api_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
        }
    }

    // ---- private helpers ----

    /// Ensure the response has a success status code. On failure, extract
    /// the backend's reason from a JSON error body when there is one.
    async fn ensure_success(
        response: reqwest::Response,
    ) -> Result<reqwest::Response, GenerationError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "<unreadable body>".to_string());
        Err(GenerationError::Api {
            status: status.as_u16(),
            message: error_reason(&body),
        })
    }
}

#[async_trait]
impl GenerationBackend for HttpGenerationBackend {
    async fn generate(
        &self,
        request: &GenerationRequest,
    ) -> Result<GenerationResponse, GenerationError> {
        let response = self
            .client
            .post(format!("{}/v1/generations", self.api_url))
            .bearer_auth(&self.api_key)
            .json(request)
            .send()
            .await?;

        let response = Self::ensure_success(response).await?;
        Ok(response.json::<GenerationResponse>().await?)
    }
}

/// Pull a human-readable reason out of an error body.
fn error_reason(body: &str) -> String {
    serde_json::from_str::<ErrorBody>(body)
        .ok()
        .and_then(|b| b.error.or(b.message))
        .filter(|m| !m.trim().is_empty())
        .unwrap_or_else(|| body.to_string())
}
