use axum::{extract::State, Json};
use hearth_core::models::{ImageSource, MirrorJobPayload};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::error::{ErrorResponse, HttpAppError, ValidatedJson};
use crate::state::AppState;

/// One property entry in a batch request, in the shape the MLS feed produces.
#[derive(Debug, Deserialize, utoipa::ToSchema)]
pub struct BatchProperty {
    #[serde(rename = "ListingKey", alias = "listingKey", alias = "propertyId")]
    pub listing_key: String,
    #[serde(default)]
    pub images: Vec<ImageSource>,
}

#[derive(Debug, Deserialize, utoipa::ToSchema)]
pub struct BatchProcessRequest {
    pub properties: Vec<BatchProperty>,
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BatchProcessResponse {
    pub success: bool,
    pub message: String,
    pub properties_queued: usize,
}

/// Enqueue one persisted mirror job per property and return immediately.
/// Completion is observable via the status endpoints; a property that fails
/// to enqueue is logged and skipped, never aborting the rest of the batch.
#[utoipa::path(
    post,
    path = "/images/batch-process",
    tag = "images",
    request_body = BatchProcessRequest,
    responses(
        (status = 200, description = "Batch accepted, jobs queued", body = BatchProcessResponse),
        (status = 400, description = "Invalid request body", body = ErrorResponse)
    )
)]
#[tracing::instrument(skip(state, request), fields(property_count = request.properties.len()))]
pub async fn batch_process(
    State(state): State<Arc<AppState>>,
    ValidatedJson(request): ValidatedJson<BatchProcessRequest>,
) -> Result<Json<BatchProcessResponse>, HttpAppError> {
    let mut queued = 0usize;

    for property in request.properties {
        let listing_key = property.listing_key.trim();
        if listing_key.is_empty() {
            tracing::warn!("Skipping batch entry with empty ListingKey");
            continue;
        }

        let payload = MirrorJobPayload {
            property_id: listing_key.to_string(),
            images: property.images,
        };

        match state.queue.submit(payload).await {
            Ok(job_id) => {
                tracing::debug!(property_id = %listing_key, job_id = %job_id, "Mirror job queued");
                queued += 1;
            }
            Err(e) => {
                tracing::error!(
                    property_id = %listing_key,
                    error = %e,
                    "Failed to queue mirror job, continuing with remaining properties"
                );
            }
        }
    }

    Ok(Json(BatchProcessResponse {
        success: true,
        message: format!("Queued {} properties for image mirroring", queued),
        properties_queued: queued,
    }))
}
