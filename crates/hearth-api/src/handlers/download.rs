use axum::{extract::State, Json};
use hearth_core::models::{ImageSource, MirroredImage};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::error::{ErrorResponse, HttpAppError, ValidatedJson};
use crate::state::AppState;

#[derive(Debug, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DownloadRequest {
    pub property_id: String,
    #[serde(default)]
    pub images: Vec<ImageSource>,
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DownloadResponse {
    pub success: bool,
    pub property_id: String,
    pub downloaded: usize,
    pub total: usize,
    pub results: Vec<MirroredImage>,
}

/// Synchronously mirror one property's photo list. Per-image failures are
/// recorded on their rows and excluded from `results`; they never fail the
/// request.
#[utoipa::path(
    post,
    path = "/images/download",
    tag = "images",
    request_body = DownloadRequest,
    responses(
        (status = 200, description = "Download batch processed", body = DownloadResponse),
        (status = 400, description = "Invalid request body", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
#[tracing::instrument(skip(state, request), fields(property.id = %request.property_id, image_count = request.images.len()))]
pub async fn download(
    State(state): State<Arc<AppState>>,
    ValidatedJson(request): ValidatedJson<DownloadRequest>,
) -> Result<Json<DownloadResponse>, HttpAppError> {
    let total = request.images.len();
    let results = state
        .images
        .download_property_images(&request.property_id, &request.images)
        .await
        .map_err(HttpAppError::from)?;

    Ok(Json(DownloadResponse {
        success: true,
        property_id: request.property_id,
        downloaded: results.len(),
        total,
        results,
    }))
}
