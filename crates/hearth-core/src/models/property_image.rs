use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;
use utoipa::ToSchema;
use uuid::Uuid;

/// Lifecycle of a mirrored image row.
///
/// `pending` — recorded, not yet downloaded; `downloaded` — bytes mirrored to
/// storage and `local_url` set; `failed` — download attempted and failed.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(
    feature = "sqlx",
    sqlx(type_name = "image_status", rename_all = "lowercase")
)]
#[serde(rename_all = "lowercase")]
pub enum ImageStatus {
    Pending,
    Downloaded,
    Failed,
}

impl Display for ImageStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            ImageStatus::Pending => write!(f, "pending"),
            ImageStatus::Downloaded => write!(f, "downloaded"),
            ImageStatus::Failed => write!(f, "failed"),
        }
    }
}

impl FromStr for ImageStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(ImageStatus::Pending),
            "downloaded" => Ok(ImageStatus::Downloaded),
            "failed" => Ok(ImageStatus::Failed),
            _ => Err(anyhow::anyhow!("Invalid image status: {}", s)),
        }
    }
}

/// One mirrored (or to-be-mirrored) photo of a property.
///
/// Natural identity is `(property_id, original_url)`; the table enforces
/// uniqueness on that pair. `local_url` is present iff `status == Downloaded`.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[serde(rename_all = "camelCase")]
pub struct PropertyImage {
    pub id: Uuid,
    pub property_id: String,
    pub original_url: String,
    pub local_url: Option<String>,
    pub position: i32,
    pub status: ImageStatus,
    pub media_change_timestamp: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PropertyImage {
    /// Whether the stored mirror is stale relative to an upstream change marker.
    /// A row with no stored marker is always considered stale.
    pub fn is_stale(&self, upstream: DateTime<Utc>) -> bool {
        match self.media_change_timestamp {
            Some(stored) => stored < upstream,
            None => true,
        }
    }
}

/// Incoming photo reference, in the shape the MLS feed produces.
/// Accepts both the feed's PascalCase field names and camelCase aliases.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ImageSource {
    #[serde(rename = "MediaURL", alias = "url", alias = "mediaUrl")]
    pub media_url: String,
    #[serde(rename = "Order", alias = "order", default)]
    pub order: Option<i32>,
    #[serde(
        rename = "MediaChangeTimestamp",
        alias = "mediaChangeTimestamp",
        default
    )]
    pub media_change_timestamp: Option<DateTime<Utc>>,
}

/// A successfully mirrored url pair, as returned by the download endpoints.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct MirroredImage {
    pub original_url: String,
    pub local_url: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn image(marker: Option<DateTime<Utc>>) -> PropertyImage {
        PropertyImage {
            id: Uuid::new_v4(),
            property_id: "X12345".to_string(),
            original_url: "http://example.com/1.jpg".to_string(),
            local_url: Some("https://cdn.example.com/p/1.jpg".to_string()),
            position: 0,
            status: ImageStatus::Downloaded,
            media_change_timestamp: marker,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_stale_when_no_stored_marker() {
        let img = image(None);
        assert!(img.is_stale(Utc::now()));
    }

    #[test]
    fn test_fresh_when_stored_marker_not_older() {
        let t = Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap();
        let img = image(Some(t));
        assert!(!img.is_stale(t));
        assert!(!img.is_stale(t - chrono::Duration::hours(1)));
        assert!(img.is_stale(t + chrono::Duration::hours(1)));
    }

    #[test]
    fn test_image_source_accepts_feed_field_names() {
        let src: ImageSource =
            serde_json::from_str(r#"{"MediaURL":"http://x/1.jpg","Order":2}"#).unwrap();
        assert_eq!(src.media_url, "http://x/1.jpg");
        assert_eq!(src.order, Some(2));
        assert!(src.media_change_timestamp.is_none());
    }

    #[test]
    fn test_image_source_accepts_camel_case_aliases() {
        let src: ImageSource = serde_json::from_str(r#"{"url":"http://x/2.jpg"}"#).unwrap();
        assert_eq!(src.media_url, "http://x/2.jpg");
    }

    #[test]
    fn test_property_image_serializes_camel_case() {
        let json = serde_json::to_value(image(None)).unwrap();
        assert!(json.get("originalUrl").is_some());
        assert!(json.get("localUrl").is_some());
        assert_eq!(
            json.get("status").and_then(|v| v.as_str()),
            Some("downloaded")
        );
    }
}
