//! Durable object storage for generated images.
//!
//! Generated images live at short-lived backend URLs. Collection runs copy
//! them to a permanent location through an [`ObjectStore`].

use async_trait::async_trait;
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::primitives::ByteStream;

/// Content type used when the source does not declare one.
const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// Errors from the storage layer.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// Downloading the source object failed at the transport level.
    #[error("Failed to fetch source object: {0}")]
    Fetch(#[from] reqwest::Error),

    /// The source URL answered with a non-2xx status.
    #[error("Source object returned HTTP {status}: {url}")]
    FetchStatus { status: u16, url: String },

    /// Writing to the object store failed.
    #[error("Upload failed: {0}")]
    Upload(String),
}

/// A place generated images can be copied to permanently.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Copy the object at `source_url` to `key` and return its permanent URL.
    async fn copy_from_url(&self, source_url: &str, key: &str) -> Result<String, StorageError>;
}

/// [`ObjectStore`] backed by an S3 bucket.
pub struct S3ObjectStore {
    client: aws_sdk_s3::Client,
    http: reqwest::Client,
    bucket: String,
    public_base_url: String,
}

impl S3ObjectStore {
    /// Build a store using credentials and region from the standard AWS
    /// environment (`AWS_REGION`, `AWS_ACCESS_KEY_ID`, profiles, ...).
    ///
    /// * `public_base_url` - Prefix under which stored keys are publicly reachable.
    pub async fn from_env(bucket: impl Into<String>, public_base_url: impl Into<String>) -> Self {
        let config = aws_config::load_from_env().await;
        Self::with_client(
            aws_sdk_s3::Client::new(&config),
            reqwest::Client::new(),
            bucket,
            public_base_url,
        )
    }

    pub fn with_client(
        client: aws_sdk_s3::Client,
        http: reqwest::Client,
        bucket: impl Into<String>,
        public_base_url: impl Into<String>,
    ) -> Self {
        Self {
            client,
            http,
            bucket: bucket.into(),
            public_base_url: public_base_url.into().trim_end_matches('/').to_string(),
        }
    }

    fn public_url(&self, key: &str) -> String {
        format!("{}/{}", self.public_base_url, key.trim_start_matches('/'))
    }
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    async fn copy_from_url(&self, source_url: &str, key: &str) -> Result<String, StorageError> {
        let response = self.http.get(source_url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(StorageError::FetchStatus {
                status: status.as_u16(),
                url: source_url.to_string(),
            });
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or(DEFAULT_CONTENT_TYPE)
            .to_string();
        let bytes = response.bytes().await?;
        let size = bytes.len();

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .content_type(content_type)
            .body(ByteStream::from(bytes.to_vec()))
            .send()
            .await
            .map_err(|e| StorageError::Upload(DisplayErrorContext(&e).to_string()))?;

        tracing::debug!(bucket = %self.bucket, key, size, "Stored generated image");
        Ok(self.public_url(key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store(base: &str) -> S3ObjectStore {
        let config = aws_sdk_s3::Config::builder()
            .behavior_version(aws_sdk_s3::config::BehaviorVersion::latest())
            .region(aws_sdk_s3::config::Region::new("us-east-1"))
            .build();
        S3ObjectStore::with_client(
            aws_sdk_s3::Client::from_conf(config),
            reqwest::Client::new(),
            "bucket",
            base,
        )
    }

    #[test]
    fn public_url_joins_base_and_key() {
        let store = store("https://cdn.example.com/");
        assert_eq!(
            store.public_url("/collections/c1/a.png"),
            "https://cdn.example.com/collections/c1/a.png"
        );
    }
}
