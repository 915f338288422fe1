use axum::{
    extract::{Query, State},
    Json,
};
use chrono::{DateTime, Utc};
use hearth_core::models::ImageStatus;
use hearth_core::AppError;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::error::{ErrorResponse, HttpAppError, ValidatedJson};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusQuery {
    #[serde(default)]
    pub property_id: Option<String>,
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StatusImage {
    pub original_url: String,
    pub local_url: Option<String>,
    pub order: i32,
    pub status: ImageStatus,
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StatusResponse {
    pub property_id: String,
    pub image_count: usize,
    pub images: Vec<StatusImage>,
}

/// Report the mirror state of every recorded image for a property.
#[utoipa::path(
    get,
    path = "/images/status",
    tag = "images",
    params(
        ("propertyId" = String, Query, description = "Property identifier (MLS ListingKey)")
    ),
    responses(
        (status = 200, description = "Per-image mirror status", body = StatusResponse),
        (status = 400, description = "propertyId missing", body = ErrorResponse)
    )
)]
#[tracing::instrument(skip(state, query))]
pub async fn get_status(
    State(state): State<Arc<AppState>>,
    Query(query): Query<StatusQuery>,
) -> Result<Json<StatusResponse>, HttpAppError> {
    let property_id = query
        .property_id
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| AppError::InvalidInput("propertyId is required".to_string()))?;

    let rows = state.images.property_images(property_id).await?;
    let images: Vec<StatusImage> = rows
        .into_iter()
        .map(|row| StatusImage {
            original_url: row.original_url,
            local_url: row.local_url,
            order: row.position,
            status: row.status,
        })
        .collect();

    Ok(Json(StatusResponse {
        property_id: property_id.to_string(),
        image_count: images.len(),
        images,
    }))
}

#[derive(Debug, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct FreshnessRequest {
    pub property_id: String,
    pub media_change_timestamp: DateTime<Utc>,
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct FreshnessResponse {
    pub property_id: String,
    pub media_change_timestamp: DateTime<Utc>,
    pub needs_update: bool,
    pub message: String,
}

/// Compare the supplied upstream change marker against the stored one and
/// report whether a re-download is warranted.
#[utoipa::path(
    post,
    path = "/images/status",
    tag = "images",
    request_body = FreshnessRequest,
    responses(
        (status = 200, description = "Freshness verdict", body = FreshnessResponse),
        (status = 400, description = "Invalid request body", body = ErrorResponse)
    )
)]
#[tracing::instrument(skip(state, request), fields(property.id = %request.property_id))]
pub async fn check_freshness(
    State(state): State<Arc<AppState>>,
    ValidatedJson(request): ValidatedJson<FreshnessRequest>,
) -> Result<Json<FreshnessResponse>, HttpAppError> {
    if request.property_id.trim().is_empty() {
        return Err(HttpAppError::from(AppError::InvalidInput(
            "propertyId is required".to_string(),
        )));
    }

    let needs_update = state
        .images
        .check_freshness(&request.property_id, request.media_change_timestamp)
        .await?;

    let message = if needs_update {
        "Stored images are stale or missing; re-download recommended".to_string()
    } else {
        "Stored images are up to date".to_string()
    };

    Ok(Json(FreshnessResponse {
        property_id: request.property_id,
        media_change_timestamp: request.media_change_timestamp,
        needs_update,
        message,
    }))
}
