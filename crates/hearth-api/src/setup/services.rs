//! Service initialization and application state setup

use anyhow::{Context, Result};
use hearth_core::Config;
use hearth_db::{MirrorJobRepository, PropertyImageRepository};
use hearth_storage::Storage;
use hearth_worker::{JobContext, MirrorQueue, MirrorQueueConfig};
use sqlx::PgPool;
use std::sync::{Arc, Weak};
use std::time::Duration;

use crate::services::image_cache::ImageCacheService;
use crate::state::AppState;

/// Initialize repositories, the image cache service, and the mirror queue,
/// returning the application state.
///
/// The queue holds a weak reference back to the state it lives in (the state
/// is the job dispatch context), so the state is built with `Arc::new_cyclic`.
pub fn initialize_services(
    config: &Config,
    pool: PgPool,
    storage: Arc<dyn Storage>,
) -> Result<Arc<AppState>> {
    let image_repository = PropertyImageRepository::new(pool.clone());
    let job_repository = MirrorJobRepository::new(pool.clone());

    let images = ImageCacheService::new(
        image_repository,
        storage,
        Duration::from_secs(config.download_timeout_secs),
    )
    .context("Failed to initialize image cache service")?;

    let proxy_client = reqwest::Client::builder()
        .timeout(Duration::from_secs(config.proxy_timeout_secs))
        .build()
        .context("Failed to create proxy HTTP client")?;

    let queue_config = MirrorQueueConfig {
        max_workers: config.queue_max_workers,
        poll_interval_ms: config.queue_poll_interval_ms,
        max_retries: config.queue_max_retries,
        stale_job_reap_interval_secs: config.stale_job_reap_interval_secs,
        stale_job_grace_period_secs: config.stale_job_grace_period_secs,
    };

    let config = config.clone();
    let state = Arc::new_cyclic(|weak: &Weak<AppState>| {
        let context: Weak<dyn JobContext> = weak.clone();
        let queue = MirrorQueue::new(job_repository, queue_config, context, Some(pool.clone()));
        AppState {
            pool,
            config,
            images,
            queue,
            proxy_client,
        }
    });

    tracing::info!(
        max_workers = state.config.queue_max_workers,
        poll_interval_ms = state.config.queue_poll_interval_ms,
        "Mirror queue system initialized successfully"
    );

    Ok(state)
}
