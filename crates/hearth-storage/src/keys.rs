//! Shared key derivation for storage backends.
//!
//! Key format: `properties/{property_id}/{url-hash}-{position}.{ext}`.
//! The hash is a truncated SHA-256 of the source URL, so the same
//! `(property, url)` pair always maps to the same object and a re-mirror
//! overwrites the previous copy in place.

use sha2::{Digest, Sha256};

use hearth_core::constants::IMAGE_KEY_PREFIX;

/// Hex characters kept from the SHA-256 of the source URL.
const URL_HASH_LEN: usize = 16;

/// Derive the storage key for one property photo.
pub fn image_key(property_id: &str, original_url: &str, position: i32) -> String {
    let digest = Sha256::digest(original_url.as_bytes());
    let mut hash = String::with_capacity(URL_HASH_LEN);
    for byte in digest.iter().take(URL_HASH_LEN / 2) {
        hash.push_str(&format!("{:02x}", byte));
    }
    let ext = url_extension(original_url).unwrap_or("jpg");
    format!(
        "{}/{}/{}-{}.{}",
        IMAGE_KEY_PREFIX,
        sanitize_segment(property_id),
        hash,
        position,
        ext
    )
}

/// Extract a plausible file extension from the URL path, ignoring the query
/// string. Returns None for extension-less or suspicious paths.
fn url_extension(url: &str) -> Option<&str> {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    let filename = path.rsplit('/').next()?;
    let (_, ext) = filename.rsplit_once('.')?;
    if ext.is_empty() || ext.len() > 5 || !ext.chars().all(|c| c.is_ascii_alphanumeric()) {
        return None;
    }
    Some(ext)
}

/// Property ids come from an external feed; strip anything that could break
/// the key layout (path separators, traversal).
fn sanitize_segment(segment: &str) -> String {
    segment
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_image_key_is_deterministic() {
        let a = image_key("X12345", "http://photos.example.com/1.jpg", 0);
        let b = image_key("X12345", "http://photos.example.com/1.jpg", 0);
        assert_eq!(a, b);
        assert!(a.starts_with("properties/X12345/"));
        assert!(a.ends_with("-0.jpg"));
    }

    #[test]
    fn test_image_key_differs_per_url() {
        let a = image_key("X12345", "http://photos.example.com/1.jpg", 0);
        let b = image_key("X12345", "http://photos.example.com/2.jpg", 0);
        assert_ne!(a, b);
    }

    #[test]
    fn test_extension_from_url_path_ignores_query() {
        assert_eq!(
            url_extension("https://cdn.example.com/a/b/photo.png?width=1024"),
            Some("png")
        );
        assert_eq!(url_extension("https://cdn.example.com/a/b/photo"), None);
        assert_eq!(url_extension("https://cdn.example.com/a.b/photo."), None);
    }

    #[test]
    fn test_default_extension_is_jpg() {
        let key = image_key("A", "http://x/feed/image", 3);
        assert!(key.ends_with("-3.jpg"));
    }

    #[test]
    fn test_property_id_sanitized() {
        let key = image_key("../etc", "http://x/1.jpg", 0);
        assert!(!key.contains(".."));
        assert!(key.starts_with("properties/___etc/"));
    }
}
