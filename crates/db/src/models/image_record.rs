//! Generated image record models.

use batchgen_core::types::{DbId, Timestamp};
use serde::Serialize;
use sqlx::FromRow;
use uuid::Uuid;

/// A row from the `image_records` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct ImageRecord {
    pub id: Uuid,
    pub owner_id: DbId,
    pub batch_id: Uuid,
    pub template_id: String,
    pub template_name: String,
    pub prompt: String,
    pub model: String,
    /// URL the backend returned.
    pub source_url: String,
    /// URL clients should use; the durable copy when one was made.
    pub image_url: String,
    pub collection_id: Option<String>,
    pub collection_name: Option<String>,
    pub created_at: Timestamp,
}

/// DTO for inserting a record after a successful generation.
#[derive(Debug, Clone)]
pub struct NewImageRecord {
    pub owner_id: DbId,
    pub batch_id: Uuid,
    pub template_id: String,
    pub template_name: String,
    pub prompt: String,
    pub model: String,
    pub source_url: String,
    pub image_url: String,
    pub collection_id: Option<String>,
    pub collection_name: Option<String>,
}
