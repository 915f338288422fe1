//! Job dispatch context trait
//!
//! The API implements this trait for its application state. The worker calls
//! `process_job` when a claimed job is ready to run.

use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;

use hearth_core::models::MirrorJob;

/// Context for job dispatch.
///
/// Implemented by the API's application state. The worker holds a weak
/// reference so that dropping the state tears down dispatch cleanly.
#[async_trait]
pub trait JobContext: Send + Sync {
    /// Run one claimed job and return its result summary.
    async fn process_job(self: Arc<Self>, job: &MirrorJob) -> Result<serde_json::Value>;
}
