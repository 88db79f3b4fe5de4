use std::time::Duration;

use batchgen_pipeline::PersistenceFailurePolicy;

use crate::auth::jwt::JwtConfig;

/// Model used when neither a template nor the request picks one.
const DEFAULT_MODEL: &str = "default";

/// Default whole-request timeout for generation backend calls.
const DEFAULT_GENERATION_TIMEOUT_SECS: u64 = 120;

/// Server configuration loaded from environment variables.
///
/// All fields have sensible defaults suitable for local development.
/// In production, override via environment variables.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `3000`).
    pub port: u16,
    /// Allowed CORS origins, parsed from comma-separated `CORS_ORIGINS` env var.
    pub cors_origins: Vec<String>,
    /// Time allowed until response headers are sent (default: `30`).
    ///
    /// Streaming bodies are not bound by it: a batch keeps writing after
    /// the headers went out.
    pub request_timeout_secs: u64,
    /// JWT token configuration.
    pub jwt: JwtConfig,
    /// Batch execution settings.
    pub batch: BatchConfig,
}

/// Settings that shape every batch run.
#[derive(Debug, Clone)]
pub struct BatchConfig {
    pub default_model: String,
    pub persistence_failure: PersistenceFailurePolicy,
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                      | Default                 |
    /// |------------------------------|-------------------------|
    /// | `HOST`                       | `0.0.0.0`               |
    /// | `PORT`                       | `3000`                  |
    /// | `CORS_ORIGINS`               | `http://localhost:5173` |
    /// | `REQUEST_TIMEOUT_SECS`       | `30`                    |
    /// | `DEFAULT_MODEL`              | `default`               |
    /// | `PERSISTENCE_FAILURE_POLICY` | `degraded`              |
    pub fn from_env() -> Self {
        let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into());

        let port: u16 = std::env::var("PORT")
            .unwrap_or_else(|_| "3000".into())
            .parse()
            .expect("PORT must be a valid u16");

        let cors_origins: Vec<String> = std::env::var("CORS_ORIGINS")
            .unwrap_or_else(|_| "http://localhost:5173".into())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let request_timeout_secs: u64 = std::env::var("REQUEST_TIMEOUT_SECS")
            .unwrap_or_else(|_| "30".into())
            .parse()
            .expect("REQUEST_TIMEOUT_SECS must be a valid u64");

        let default_model = std::env::var("DEFAULT_MODEL")
            .ok()
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_MODEL.into());

        let persistence_failure = match std::env::var("PERSISTENCE_FAILURE_POLICY") {
            Ok(raw) => raw
                .parse()
                .unwrap_or_else(|e: String| panic!("PERSISTENCE_FAILURE_POLICY: {e}")),
            Err(_) => PersistenceFailurePolicy::default(),
        };

        Self {
            host,
            port,
            cors_origins,
            request_timeout_secs,
            jwt: JwtConfig::from_env(),
            batch: BatchConfig {
                default_model,
                persistence_failure,
            },
        }
    }
}

/// Connection details for the external services a batch talks to.
///
/// Each service is optional. A missing generation credential does not stop
/// the server: batches then fail every job with a clear message.
#[derive(Debug, Clone, Default)]
pub struct IntegrationsConfig {
    pub generation: Option<GenerationConfig>,
    pub storage: Option<StorageConfig>,
    /// Endpoint of the thumbnail service; `None` disables thumbnails.
    pub thumbnail_url: Option<String>,
}

#[derive(Clone)]
pub struct GenerationConfig {
    pub api_url: String,
    pub api_key: String,
    pub timeout: Duration,
}

// Keeps the API key out of logs.
impl std::fmt::Debug for GenerationConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GenerationConfig")
            .field("api_url", &self.api_url)
            .field("api_key", &"<redacted>")
            .field("timeout", &self.timeout)
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub bucket: String,
    pub public_base_url: String,
}

impl IntegrationsConfig {
    /// Load integration settings from environment variables.
    ///
    /// | Env Var                   | Required | Default                 |
    /// |---------------------------|----------|-------------------------|
    /// | `GENERATION_API_KEY`      | no       | -- (backend disabled)   |
    /// | `GENERATION_API_URL`      | no       | `http://localhost:8000` |
    /// | `GENERATION_TIMEOUT_SECS` | no       | `120`                   |
    /// | `S3_BUCKET`               | no       | -- (uploads disabled)   |
    /// | `S3_PUBLIC_BASE_URL`      | with bucket | --                   |
    /// | `THUMBNAIL_SERVICE_URL`   | no       | -- (thumbnails off)     |
    ///
    /// # Panics
    ///
    /// Panics if `S3_BUCKET` is set without `S3_PUBLIC_BASE_URL`.
    pub fn from_env() -> Self {
        let generation = non_empty_var("GENERATION_API_KEY").map(|api_key| {
            let api_url = non_empty_var("GENERATION_API_URL")
                .unwrap_or_else(|| "http://localhost:8000".into());
            let timeout_secs: u64 = std::env::var("GENERATION_TIMEOUT_SECS")
                .unwrap_or_else(|_| DEFAULT_GENERATION_TIMEOUT_SECS.to_string())
                .parse()
                .expect("GENERATION_TIMEOUT_SECS must be a valid u64");
            GenerationConfig {
                api_url,
                api_key,
                timeout: Duration::from_secs(timeout_secs),
            }
        });

        let storage = non_empty_var("S3_BUCKET").map(|bucket| StorageConfig {
            bucket,
            public_base_url: non_empty_var("S3_PUBLIC_BASE_URL")
                .expect("S3_PUBLIC_BASE_URL must be set when S3_BUCKET is set"),
        });

        Self {
            generation,
            storage,
            thumbnail_url: non_empty_var("THUMBNAIL_SERVICE_URL"),
        }
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
