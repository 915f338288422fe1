//! Mirror job dispatch: the worker calls into the application state to run
//! one claimed job through the image cache service.

use anyhow::{Context, Result};
use async_trait::async_trait;
use hearth_core::models::MirrorJob;
use hearth_worker::JobContext;
use serde_json::json;
use std::sync::Arc;

use crate::state::AppState;

#[async_trait]
impl JobContext for AppState {
    async fn process_job(self: Arc<Self>, job: &MirrorJob) -> Result<serde_json::Value> {
        let payload = job
            .parsed_payload()
            .context("Mirror job payload is not a valid photo list")?;

        let results = self
            .images
            .download_property_images(&payload.property_id, &payload.images)
            .await
            .with_context(|| {
                format!("Failed to mirror images for property {}", payload.property_id)
            })?;

        Ok(json!({
            "propertyId": payload.property_id,
            "downloaded": results.len(),
            "total": payload.images.len(),
            "results": results,
        }))
    }
}
