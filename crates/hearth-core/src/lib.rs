//! Hearth core library.
//!
//! Shared configuration, error types, and domain models for the property
//! image mirror service. Crates higher in the stack (storage, db, worker,
//! api) depend on this crate and nothing here depends on them.

pub mod config;
pub mod constants;
pub mod error;
pub mod models;
pub mod storage_types;

pub use config::Config;
pub use error::{AppError, ErrorMetadata, LogLevel};
pub use storage_types::StorageBackend;
