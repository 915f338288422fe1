//! Storage abstraction trait
//!
//! This module defines the Storage trait that all storage backends must implement.

use async_trait::async_trait;
use hearth_core::StorageBackend;
use thiserror::Error;

/// Storage operation errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Upload failed: {0}")]
    UploadFailed(String),

    #[error("Delete failed: {0}")]
    DeleteFailed(String),

    #[error("File not found: {0}")]
    NotFound(String),

    #[error("Invalid storage key: {0}")]
    InvalidKey(String),

    #[error("Storage backend error: {0}")]
    BackendError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Storage abstraction trait
///
/// All storage backends (S3, local filesystem) must implement this trait.
/// The image cache works with any backend without coupling to implementation
/// details.
///
/// **Key format:** keys are derived per property and source URL; see the
/// crate root documentation and the `keys` module.
#[async_trait]
pub trait Storage: Send + Sync {
    /// Upload data to the given storage key, overwriting any previous object.
    /// Returns the publicly accessible URL for the uploaded file.
    async fn put(&self, storage_key: &str, data: Vec<u8>, content_type: &str)
        -> StorageResult<String>;

    /// Check if an object exists at the given key.
    async fn exists(&self, storage_key: &str) -> StorageResult<bool>;

    /// Delete an object by its storage key. Deleting a missing object is not
    /// an error.
    async fn delete(&self, storage_key: &str) -> StorageResult<()>;

    /// Get the storage backend type
    fn backend_type(&self) -> StorageBackend;
}
