//! Hearth API Library
//!
//! This crate provides the HTTP API handlers, application state, and setup
//! for the property image mirror service.

// Module declarations
mod api_doc;
mod handlers;
mod job_dispatch;
mod services;
pub mod setup;
mod telemetry;

// Public modules
pub mod error;
pub mod state;

// Re-exports
pub use error::ErrorResponse;
pub use hearth_worker::{MirrorQueue, MirrorQueueConfig};
pub use services::image_cache::ImageCacheService;
