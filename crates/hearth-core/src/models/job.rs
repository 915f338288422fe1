use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result as FmtResult};

use crate::models::ImageSource;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(
    feature = "sqlx",
    sqlx(type_name = "mirror_job_status", rename_all = "lowercase")
)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Queued,
    Running,
    Completed,
    Failed,
}

impl Display for JobStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            JobStatus::Queued => write!(f, "queued"),
            JobStatus::Running => write!(f, "running"),
            JobStatus::Completed => write!(f, "completed"),
            JobStatus::Failed => write!(f, "failed"),
        }
    }
}

/// A persisted batch mirror job: one property's photo list to download.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct MirrorJob {
    pub id: uuid::Uuid,
    pub property_id: String,
    pub payload: serde_json::Value,
    pub status: JobStatus,
    pub retry_count: i32,
    pub max_retries: i32,
    pub scheduled_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub result: Option<serde_json::Value>,
}

/// Job payload: the photo list for one property, as submitted to the queue.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MirrorJobPayload {
    pub property_id: String,
    pub images: Vec<ImageSource>,
}

impl MirrorJob {
    /// Parse the JSONB payload into its typed form.
    pub fn parsed_payload(&self) -> Result<MirrorJobPayload, serde_json::Error> {
        serde_json::from_value(self.payload.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payload_round_trip() {
        let payload = MirrorJobPayload {
            property_id: "X12345".to_string(),
            images: vec![],
        };
        let value = serde_json::to_value(&payload).unwrap();
        let job = MirrorJob {
            id: uuid::Uuid::new_v4(),
            property_id: payload.property_id.clone(),
            payload: value,
            status: JobStatus::Queued,
            retry_count: 0,
            max_retries: 3,
            scheduled_at: Utc::now(),
            created_at: Utc::now(),
            started_at: None,
            finished_at: None,
            last_error: None,
            result: None,
        };
        let parsed = job.parsed_payload().unwrap();
        assert_eq!(parsed.property_id, "X12345");
        assert!(parsed.images.is_empty());
    }
}
