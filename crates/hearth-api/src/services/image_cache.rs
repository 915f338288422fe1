//! Image cache service: the single source of truth for "what cached copy
//! exists for this upstream URL".
//!
//! Downloads are idempotent per `(property_id, original_url)`: re-running a
//! batch upserts into the same rows, and concurrent batches for the same
//! property converge because storage keys are deterministic and the upsert
//! targets the natural key.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use hearth_core::constants::PLACEHOLDER_IMAGE_PATH;
use hearth_core::models::{ImageSource, ImageStatus, MirroredImage, PropertyImage};
use hearth_core::AppError;
use hearth_db::PropertyImageRepository;
use hearth_storage::{image_key, Storage};

const DEFAULT_IMAGE_CONTENT_TYPE: &str = "image/jpeg";

#[derive(Clone)]
pub struct ImageCacheService {
    repository: PropertyImageRepository,
    storage: Arc<dyn Storage>,
    client: reqwest::Client,
}

impl ImageCacheService {
    pub fn new(
        repository: PropertyImageRepository,
        storage: Arc<dyn Storage>,
        download_timeout: Duration,
    ) -> Result<Self, AppError> {
        let client = reqwest::Client::builder()
            .timeout(download_timeout)
            .build()
            .map_err(|e| AppError::Internal(format!("Failed to create HTTP client: {}", e)))?;
        Ok(Self {
            repository,
            storage,
            client,
        })
    }

    /// Mirror every not-yet-downloaded photo of a property.
    ///
    /// Failure is per-item: a URL that cannot be fetched or stored is marked
    /// `failed` and the rest of the batch continues. Returns the url pairs
    /// that are mirrored after this call (including ones already fresh).
    #[tracing::instrument(skip(self, images), fields(property.id = %property_id, image_count = images.len()))]
    pub async fn download_property_images(
        &self,
        property_id: &str,
        images: &[ImageSource],
    ) -> Result<Vec<MirroredImage>, AppError> {
        if property_id.trim().is_empty() {
            return Err(AppError::InvalidInput("propertyId is required".to_string()));
        }

        let mut mirrored = Vec::new();

        for (index, source) in images.iter().enumerate() {
            let url = source.media_url.trim();
            if url.is_empty() {
                tracing::debug!(index, "Skipping image entry with empty URL");
                continue;
            }
            let position = source.order.unwrap_or(index as i32);

            // Fresh rows are left alone; stale or unseen ones are (re)mirrored.
            if let Some(existing) = self.repository.get(property_id, url).await? {
                let fresh = existing.status == ImageStatus::Downloaded
                    && match source.media_change_timestamp {
                        Some(marker) => !existing.is_stale(marker),
                        None => true,
                    };
                if fresh {
                    if let Some(local_url) = existing.local_url {
                        mirrored.push(MirroredImage {
                            original_url: url.to_string(),
                            local_url,
                        });
                    }
                    continue;
                }
            }

            self.repository
                .ensure_pending(property_id, url, position)
                .await?;

            match self.mirror_one(property_id, url, position).await {
                Ok(local_url) => {
                    self.repository
                        .mark_downloaded(
                            property_id,
                            url,
                            &local_url,
                            source.media_change_timestamp,
                        )
                        .await?;
                    mirrored.push(MirroredImage {
                        original_url: url.to_string(),
                        local_url,
                    });
                }
                Err(e) => {
                    tracing::warn!(
                        property_id = %property_id,
                        url = %url,
                        error = %e,
                        "Image download failed, continuing with remaining images"
                    );
                    self.repository.mark_failed(property_id, url).await?;
                }
            }
        }

        tracing::info!(
            property_id = %property_id,
            downloaded = mirrored.len(),
            total = images.len(),
            "Property image batch processed"
        );

        Ok(mirrored)
    }

    /// Fetch one upstream URL and write the bytes to object storage.
    /// Returns the durable URL.
    async fn mirror_one(
        &self,
        property_id: &str,
        url: &str,
        position: i32,
    ) -> Result<String, AppError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| AppError::UpstreamFetch(format!("{}: {}", url, e)))?;

        if !response.status().is_success() {
            return Err(AppError::UpstreamFetch(format!(
                "{} returned status {}",
                url,
                response.status()
            )));
        }

        let content_type = extract_content_type(
            response
                .headers()
                .get("content-type")
                .and_then(|h| h.to_str().ok()),
        );

        let bytes = response
            .bytes()
            .await
            .map_err(|e| AppError::UpstreamFetch(format!("{}: reading body: {}", url, e)))?;

        let storage_key = image_key(property_id, url, position);
        let local_url = self
            .storage
            .put(&storage_key, bytes.to_vec(), &content_type)
            .await
            .map_err(|e| AppError::Storage(e.to_string()))?;

        Ok(local_url)
    }

    /// Resolve a source URL to its cached copy, or the placeholder path.
    ///
    /// Read-only: returns `local_url` only for a `downloaded` row that is not
    /// stale relative to the supplied marker. Never triggers a download.
    #[tracing::instrument(skip(self), fields(property.id = %property_id))]
    pub async fn image_url(
        &self,
        original_url: &str,
        property_id: &str,
        media_change_timestamp: Option<DateTime<Utc>>,
    ) -> Result<String, AppError> {
        let row = self.repository.get(property_id, original_url).await?;

        let resolved = match row {
            Some(image) if image.status == ImageStatus::Downloaded => {
                let stale = media_change_timestamp
                    .map(|marker| image.is_stale(marker))
                    .unwrap_or(false);
                if stale {
                    tracing::debug!(
                        property_id = %property_id,
                        original_url = %original_url,
                        "Cached image is stale, returning placeholder"
                    );
                    PLACEHOLDER_IMAGE_PATH.to_string()
                } else {
                    image
                        .local_url
                        .unwrap_or_else(|| PLACEHOLDER_IMAGE_PATH.to_string())
                }
            }
            _ => PLACEHOLDER_IMAGE_PATH.to_string(),
        };

        Ok(resolved)
    }

    /// All of a property's image rows, in display order.
    pub async fn property_images(
        &self,
        property_id: &str,
    ) -> Result<Vec<PropertyImage>, AppError> {
        self.repository.list_for_property(property_id).await
    }

    /// Whether a re-download is warranted for the property: true when no
    /// marker is stored yet, or the stored marker predates the supplied one.
    #[tracing::instrument(skip(self), fields(property.id = %property_id))]
    pub async fn check_freshness(
        &self,
        property_id: &str,
        media_change_timestamp: DateTime<Utc>,
    ) -> Result<bool, AppError> {
        let stored = self.repository.latest_media_timestamp(property_id).await?;
        Ok(match stored {
            Some(marker) => marker < media_change_timestamp,
            None => true,
        })
    }
}

/// Normalize an upstream content-type header value (strip parameters,
/// default to image/jpeg for missing or empty values).
fn extract_content_type(header: Option<&str>) -> String {
    header
        .and_then(|h| h.split(';').next())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .unwrap_or(DEFAULT_IMAGE_CONTENT_TYPE)
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn content_type_strips_parameters() {
        assert_eq!(
            extract_content_type(Some("image/png; charset=binary")),
            "image/png"
        );
    }

    #[test]
    fn content_type_defaults_when_missing() {
        assert_eq!(extract_content_type(None), "image/jpeg");
        assert_eq!(extract_content_type(Some("")), "image/jpeg");
        assert_eq!(extract_content_type(Some("  ")), "image/jpeg");
    }

    #[test]
    fn content_type_trims_whitespace() {
        assert_eq!(extract_content_type(Some(" image/webp ")), "image/webp");
    }
}
