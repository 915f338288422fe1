use axum::{
    body::Body,
    extract::{Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Redirect, Response},
};
use chrono::{DateTime, Utc};
use hearth_core::constants::PLACEHOLDER_IMAGE_PATH;
use hearth_core::AppError;
use serde::Deserialize;
use std::sync::Arc;

use crate::error::{ErrorResponse, HttpAppError};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServeQuery {
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub property_id: Option<String>,
    #[serde(default)]
    pub order: Option<i32>,
    #[serde(default)]
    pub media_change_timestamp: Option<DateTime<Utc>>,
}

/// Resolve a requested image: cached redirect, live proxy, or placeholder.
///
/// A fallback chain, not a state machine: the first stage that succeeds wins
/// and total failure degrades to the placeholder instead of a 5xx.
#[utoipa::path(
    get,
    path = "/images/serve",
    tag = "images",
    params(
        ("url" = String, Query, description = "Upstream image URL"),
        ("propertyId" = Option<String>, Query, description = "Property identifier for cache lookup"),
        ("order" = Option<i32>, Query, description = "Display position of the photo"),
        ("mediaChangeTimestamp" = Option<String>, Query, description = "Upstream change marker for staleness check")
    ),
    responses(
        (status = 307, description = "Redirect to the cached copy or placeholder"),
        (status = 200, description = "Proxied image body"),
        (status = 400, description = "url missing", body = ErrorResponse)
    )
)]
#[tracing::instrument(skip(state, query), fields(order = ?query.order))]
pub async fn serve(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ServeQuery>,
) -> Result<Response, HttpAppError> {
    let url = query
        .url
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| AppError::InvalidInput("url is required".to_string()))?;

    // Stage 1: cached copy, when we know which property this photo belongs to.
    if let Some(property_id) = query
        .property_id
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
    {
        match state
            .images
            .image_url(url, property_id, query.media_change_timestamp)
            .await
        {
            Ok(resolved)
                if resolved != PLACEHOLDER_IMAGE_PATH && resolved.starts_with("https://") =>
            {
                tracing::debug!(property_id = %property_id, "Serving cached image via redirect");
                return Ok(Redirect::temporary(&resolved).into_response());
            }
            Ok(_) => {
                tracing::debug!(property_id = %property_id, "No fresh cached copy, falling back to proxy");
            }
            Err(e) => {
                tracing::warn!(property_id = %property_id, error = %e, "Cache lookup failed, falling back to proxy");
            }
        }
    }

    // Stage 2: short-timeout live proxy from the upstream source.
    match proxy_upstream(&state, url).await {
        Ok(response) => Ok(response),
        Err(e) => {
            // Stage 3: degrade to the placeholder asset.
            tracing::warn!(url = %url, error = %e, "Upstream proxy failed, redirecting to placeholder");
            Ok(Redirect::temporary(PLACEHOLDER_IMAGE_PATH).into_response())
        }
    }
}

/// Stream the upstream body through with its content type and a short cache
/// lifetime.
async fn proxy_upstream(state: &AppState, url: &str) -> Result<Response, AppError> {
    let upstream = state
        .proxy_client
        .get(url)
        .send()
        .await
        .map_err(|e| AppError::UpstreamFetch(format!("{}: {}", url, e)))?;

    if !upstream.status().is_success() {
        return Err(AppError::UpstreamFetch(format!(
            "{} returned status {}",
            url,
            upstream.status()
        )));
    }

    let content_type = upstream
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|h| h.to_str().ok())
        .unwrap_or("image/jpeg")
        .to_string();
    let cache_control = format!("public, max-age={}", state.config.proxy_cache_max_age_secs);

    let body = Body::from_stream(upstream.bytes_stream());

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, content_type)
        .header(header::CACHE_CONTROL, cache_control)
        .body(body)
        .map_err(|e| AppError::Internal(format!("Failed to build proxy response: {}", e)))
}
