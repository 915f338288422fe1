//! Shared constants.

/// Path the serving endpoint falls back to when no usable image exists.
pub const PLACEHOLDER_IMAGE_PATH: &str = "/placeholder-property.jpg";

/// Prefix for mirrored image storage keys.
pub const IMAGE_KEY_PREFIX: &str = "properties";
