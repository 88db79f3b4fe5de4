//! Repository for the `image_records` table.

use sqlx::PgPool;
use uuid::Uuid;

use crate::models::image_record::{ImageRecord, NewImageRecord};

/// Column list for `image_records` queries.
const COLUMNS: &str = "\
    id, owner_id, batch_id, template_id, template_name, prompt, model, \
    source_url, image_url, collection_id, collection_name, created_at";

/// Provides insert operations for generated image records.
pub struct ImageRecordRepo;

impl ImageRecordRepo {
    /// Insert a new record with an application-assigned v7 id.
    pub async fn insert(pool: &PgPool, input: &NewImageRecord) -> Result<ImageRecord, sqlx::Error> {
        let query = format!(
            "INSERT INTO image_records \
                (id, owner_id, batch_id, template_id, template_name, prompt, model, \
                 source_url, image_url, collection_id, collection_name) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, ImageRecord>(&query)
            .bind(Uuid::now_v7())
            .bind(input.owner_id)
            .bind(input.batch_id)
            .bind(&input.template_id)
            .bind(&input.template_name)
            .bind(&input.prompt)
            .bind(&input.model)
            .bind(&input.source_url)
            .bind(&input.image_url)
            .bind(&input.collection_id)
            .bind(&input.collection_name)
            .fetch_one(pool)
            .await
    }
}
