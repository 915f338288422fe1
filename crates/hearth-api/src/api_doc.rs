//! OpenAPI documentation for the image mirror endpoints.

use utoipa::OpenApi;

use crate::error;
use crate::handlers;
use hearth_core::models;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Hearth API",
        version = "0.1.0",
        description = "Property image mirror service: downloads listing photos from the MLS feed into durable storage, tracks freshness against the feed's media-change timestamps, and serves cached copies with graceful fallback."
    ),
    paths(
        handlers::batch_process::batch_process,
        handlers::download::download,
        handlers::status::get_status,
        handlers::status::check_freshness,
        handlers::serve::serve,
        handlers::health::health_check,
    ),
    components(schemas(
        error::ErrorResponse,
        models::ImageSource,
        models::ImageStatus,
        models::MirroredImage,
        models::PropertyImage,
        handlers::batch_process::BatchProperty,
        handlers::batch_process::BatchProcessRequest,
        handlers::batch_process::BatchProcessResponse,
        handlers::download::DownloadRequest,
        handlers::download::DownloadResponse,
        handlers::status::StatusImage,
        handlers::status::StatusResponse,
        handlers::status::FreshnessRequest,
        handlers::status::FreshnessResponse,
        handlers::health::HealthResponse,
    )),
    tags(
        (name = "images", description = "Image mirroring, status, and serving"),
        (name = "health", description = "Service health")
    )
)]
pub struct ApiDoc;
