//! Application state shared by all handlers.

use hearth_core::Config;
use hearth_worker::MirrorQueue;
use sqlx::PgPool;

use crate::services::image_cache::ImageCacheService;

/// Shared state: database pool, the image cache service, and the mirror job
/// queue. Handlers receive it as `State<Arc<AppState>>`.
pub struct AppState {
    pub pool: PgPool,
    pub config: Config,
    pub images: ImageCacheService,
    pub queue: MirrorQueue,
    /// Short-timeout client for the serve endpoint's upstream proxy fallback.
    pub proxy_client: reqwest::Client,
}

// Handlers move the state across tasks; fail at compile time if a field
// stops being thread-safe.
const _: fn() = || {
    fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<AppState>();
};
