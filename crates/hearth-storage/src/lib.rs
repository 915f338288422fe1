//! Hearth storage library
//!
//! Storage abstraction and implementations for mirrored property images.
//! Provides the `Storage` trait plus S3 (`object_store`) and local
//! filesystem backends.
//!
//! # Storage key format
//!
//! Keys are derived from the owning property and the source URL:
//! `properties/{property_id}/{url-hash}-{position}.{ext}`. Derivation is
//! deterministic so a re-mirror of the same source URL overwrites in place;
//! it is centralized in the `keys` module so all backends stay consistent.
//! Keys must not contain `..` or a leading `/`.

pub mod factory;
pub mod keys;
#[cfg(feature = "storage-local")]
pub mod local;
#[cfg(feature = "storage-s3")]
pub mod s3;
pub mod traits;

pub use factory::create_storage;
pub use hearth_core::StorageBackend;
pub use keys::image_key;
#[cfg(feature = "storage-local")]
pub use local::LocalStorage;
#[cfg(feature = "storage-s3")]
pub use s3::S3Storage;
pub use traits::{Storage, StorageError, StorageResult};
