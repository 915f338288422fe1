//! Property image repository: upsert-by-natural-key and filtered reads for
//! the property_images table.

use chrono::{DateTime, Utc};
use hearth_core::models::{ImageStatus, PropertyImage};
use hearth_core::AppError;
use sqlx::{PgPool, Postgres};

const COLUMNS: &str = "id, property_id, original_url, local_url, position, status, \
                       media_change_timestamp, created_at, updated_at";

/// Repository for property_images rows.
///
/// All mutations go through the `(property_id, original_url)` natural key;
/// the unique constraint makes concurrent writers converge on one row.
#[derive(Clone)]
pub struct PropertyImageRepository {
    pool: PgPool,
}

impl PropertyImageRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Record that a download has been requested for this source URL.
    /// Idempotent: an existing row keeps its status and only refreshes the
    /// display position.
    #[tracing::instrument(skip(self), fields(db.table = "property_images"))]
    pub async fn ensure_pending(
        &self,
        property_id: &str,
        original_url: &str,
        position: i32,
    ) -> Result<PropertyImage, AppError> {
        let row: PropertyImage = sqlx::query_as::<Postgres, PropertyImage>(&format!(
            r#"
            INSERT INTO property_images (property_id, original_url, position, status)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (property_id, original_url)
            DO UPDATE SET position = EXCLUDED.position, updated_at = now()
            RETURNING {COLUMNS}
            "#
        ))
        .bind(property_id)
        .bind(original_url)
        .bind(position)
        .bind(ImageStatus::Pending)
        .fetch_one(&self.pool)
        .await?;
        Ok(row)
    }

    /// Mark a row downloaded, recording the mirrored URL and the upstream
    /// change marker in effect at mirror time.
    #[tracing::instrument(skip(self, local_url), fields(db.table = "property_images"))]
    pub async fn mark_downloaded(
        &self,
        property_id: &str,
        original_url: &str,
        local_url: &str,
        media_change_timestamp: Option<DateTime<Utc>>,
    ) -> Result<PropertyImage, AppError> {
        let row: PropertyImage = sqlx::query_as::<Postgres, PropertyImage>(&format!(
            r#"
            UPDATE property_images
            SET status = $3, local_url = $4, media_change_timestamp = $5, updated_at = now()
            WHERE property_id = $1 AND original_url = $2
            RETURNING {COLUMNS}
            "#
        ))
        .bind(property_id)
        .bind(original_url)
        .bind(ImageStatus::Downloaded)
        .bind(local_url)
        .bind(media_change_timestamp)
        .fetch_one(&self.pool)
        .await?;
        Ok(row)
    }

    /// Mark a row failed after an unsuccessful download attempt. The previous
    /// local_url (if any) is cleared so the downloaded-iff-localUrl invariant
    /// holds.
    #[tracing::instrument(skip(self), fields(db.table = "property_images"))]
    pub async fn mark_failed(
        &self,
        property_id: &str,
        original_url: &str,
    ) -> Result<PropertyImage, AppError> {
        let row: PropertyImage = sqlx::query_as::<Postgres, PropertyImage>(&format!(
            r#"
            UPDATE property_images
            SET status = $3, local_url = NULL, updated_at = now()
            WHERE property_id = $1 AND original_url = $2
            RETURNING {COLUMNS}
            "#
        ))
        .bind(property_id)
        .bind(original_url)
        .bind(ImageStatus::Failed)
        .fetch_one(&self.pool)
        .await?;
        Ok(row)
    }

    /// Fetch one row by its natural key.
    #[tracing::instrument(skip(self), fields(db.table = "property_images"))]
    pub async fn get(
        &self,
        property_id: &str,
        original_url: &str,
    ) -> Result<Option<PropertyImage>, AppError> {
        let row: Option<PropertyImage> = sqlx::query_as::<Postgres, PropertyImage>(&format!(
            "SELECT {COLUMNS} FROM property_images WHERE property_id = $1 AND original_url = $2"
        ))
        .bind(property_id)
        .bind(original_url)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    /// All rows for a property, in display order.
    #[tracing::instrument(skip(self), fields(db.table = "property_images"))]
    pub async fn list_for_property(
        &self,
        property_id: &str,
    ) -> Result<Vec<PropertyImage>, AppError> {
        let rows: Vec<PropertyImage> = sqlx::query_as::<Postgres, PropertyImage>(&format!(
            "SELECT {COLUMNS} FROM property_images WHERE property_id = $1 \
             ORDER BY position, created_at"
        ))
        .bind(property_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// The newest stored media-change marker across a property's images, if any.
    #[tracing::instrument(skip(self), fields(db.table = "property_images"))]
    pub async fn latest_media_timestamp(
        &self,
        property_id: &str,
    ) -> Result<Option<DateTime<Utc>>, AppError> {
        let marker: Option<DateTime<Utc>> = sqlx::query_scalar(
            "SELECT MAX(media_change_timestamp) FROM property_images WHERE property_id = $1",
        )
        .bind(property_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(marker)
    }
}
