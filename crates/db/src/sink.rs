//! The record-write seam used by the persistence sidecar.

use async_trait::async_trait;
use uuid::Uuid;

use crate::models::image_record::NewImageRecord;
use crate::repositories::ImageRecordRepo;
use crate::DbPool;

#[derive(Debug, thiserror::Error)]
pub enum RecordSinkError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// The sink refused the write for a reason other than the database.
    #[error("Record store unavailable: {0}")]
    Unavailable(String),
}

/// Durable destination for image metadata records.
#[async_trait]
pub trait RecordSink: Send + Sync {
    /// Write one record and return its id.
    async fn insert(&self, record: &NewImageRecord) -> Result<Uuid, RecordSinkError>;
}

/// [`RecordSink`] writing to the `image_records` table.
pub struct PgRecordSink {
    pool: DbPool,
}

impl PgRecordSink {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RecordSink for PgRecordSink {
    async fn insert(&self, record: &NewImageRecord) -> Result<Uuid, RecordSinkError> {
        let row = ImageRecordRepo::insert(&self.pool, record).await?;
        Ok(row.id)
    }
}
