//! Persisted mirror job queue over the mirror_jobs table.
//!
//! Jobs are claimed with `FOR UPDATE SKIP LOCKED` so multiple workers (or
//! multiple service instances) never double-process a job. Enqueue emits a
//! `pg_notify` so idle workers wake without waiting for the next poll.

use hearth_core::models::{JobStatus, MirrorJob};
use hearth_core::AppError;
use sqlx::{PgPool, Postgres};

/// Channel name for PostgreSQL LISTEN/NOTIFY when a new job is enqueued.
pub const JOB_NOTIFY_CHANNEL: &str = "hearth_new_job";

const COLUMNS: &str = "id, property_id, payload, status, retry_count, max_retries, \
                       scheduled_at, created_at, started_at, finished_at, last_error, result";

#[derive(Clone)]
pub struct MirrorJobRepository {
    pool: PgPool,
}

impl MirrorJobRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Insert a new queued job and wake any listening worker.
    #[tracing::instrument(skip(self, payload), fields(db.table = "mirror_jobs"))]
    pub async fn enqueue(
        &self,
        property_id: &str,
        payload: serde_json::Value,
        max_retries: i32,
    ) -> Result<MirrorJob, AppError> {
        let job: MirrorJob = sqlx::query_as::<Postgres, MirrorJob>(&format!(
            r#"
            INSERT INTO mirror_jobs (property_id, payload, status, max_retries)
            VALUES ($1, $2, $3, $4)
            RETURNING {COLUMNS}
            "#
        ))
        .bind(property_id)
        .bind(payload)
        .bind(JobStatus::Queued)
        .bind(max_retries)
        .fetch_one(&self.pool)
        .await?;

        sqlx::query("SELECT pg_notify($1, $2)")
            .bind(JOB_NOTIFY_CHANNEL)
            .bind(job.id.to_string())
            .execute(&self.pool)
            .await?;

        Ok(job)
    }

    /// Claim the next due queued job, if any, marking it running.
    ///
    /// `SKIP LOCKED` lets concurrent claimers pass over rows another worker
    /// is already claiming instead of blocking on them.
    #[tracing::instrument(skip(self), fields(db.table = "mirror_jobs"))]
    pub async fn claim_next(&self) -> Result<Option<MirrorJob>, AppError> {
        let job: Option<MirrorJob> = sqlx::query_as::<Postgres, MirrorJob>(&format!(
            r#"
            UPDATE mirror_jobs
            SET status = $1, started_at = now()
            WHERE id = (
                SELECT id FROM mirror_jobs
                WHERE status = $2 AND scheduled_at <= now()
                ORDER BY scheduled_at
                FOR UPDATE SKIP LOCKED
                LIMIT 1
            )
            RETURNING {COLUMNS}
            "#
        ))
        .bind(JobStatus::Running)
        .bind(JobStatus::Queued)
        .fetch_optional(&self.pool)
        .await?;
        Ok(job)
    }

    /// Mark a job completed, recording the per-image outcome summary.
    #[tracing::instrument(skip(self, result), fields(db.table = "mirror_jobs"))]
    pub async fn mark_completed(
        &self,
        id: uuid::Uuid,
        result: serde_json::Value,
    ) -> Result<(), AppError> {
        sqlx::query(
            r#"
            UPDATE mirror_jobs
            SET status = $2, result = $3, finished_at = now()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(JobStatus::Completed)
        .bind(result)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Requeue a failed job with an incremented retry count, due after the
    /// given backoff.
    #[tracing::instrument(skip(self, error), fields(db.table = "mirror_jobs"))]
    pub async fn retry_later(
        &self,
        id: uuid::Uuid,
        error: &str,
        backoff_secs: u64,
    ) -> Result<MirrorJob, AppError> {
        let job: MirrorJob = sqlx::query_as::<Postgres, MirrorJob>(&format!(
            r#"
            UPDATE mirror_jobs
            SET status = $2,
                retry_count = retry_count + 1,
                last_error = $3,
                started_at = NULL,
                scheduled_at = now() + make_interval(secs => $4::double precision)
            WHERE id = $1
            RETURNING {COLUMNS}
            "#
        ))
        .bind(id)
        .bind(JobStatus::Queued)
        .bind(error)
        .bind(backoff_secs as f64)
        .fetch_one(&self.pool)
        .await?;
        Ok(job)
    }

    /// Mark a job permanently failed.
    #[tracing::instrument(skip(self, error), fields(db.table = "mirror_jobs"))]
    pub async fn mark_failed(&self, id: uuid::Uuid, error: &str) -> Result<(), AppError> {
        sqlx::query(
            r#"
            UPDATE mirror_jobs
            SET status = $2, last_error = $3, finished_at = now()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(JobStatus::Failed)
        .bind(error)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Requeue (or fail, once retries are exhausted) jobs stuck in `running`
    /// longer than the grace period. Covers workers that died mid-job.
    /// Returns the number of rows touched.
    #[tracing::instrument(skip(self), fields(db.table = "mirror_jobs"))]
    pub async fn reap_stale_running(&self, grace_secs: i64) -> Result<u64, AppError> {
        let requeued = sqlx::query(
            r#"
            UPDATE mirror_jobs
            SET status = $1,
                retry_count = retry_count + 1,
                last_error = 'worker lost: stale running job requeued',
                started_at = NULL,
                scheduled_at = now()
            WHERE status = $2
              AND started_at < now() - make_interval(secs => $3::double precision)
              AND retry_count < max_retries
            "#,
        )
        .bind(JobStatus::Queued)
        .bind(JobStatus::Running)
        .bind(grace_secs as f64)
        .execute(&self.pool)
        .await?
        .rows_affected();

        let failed = sqlx::query(
            r#"
            UPDATE mirror_jobs
            SET status = $1,
                last_error = 'worker lost: stale running job exceeded max retries',
                finished_at = now()
            WHERE status = $2
              AND started_at < now() - make_interval(secs => $3::double precision)
              AND retry_count >= max_retries
            "#,
        )
        .bind(JobStatus::Failed)
        .bind(JobStatus::Running)
        .bind(grace_secs as f64)
        .execute(&self.pool)
        .await?
        .rows_affected();

        let total = requeued + failed;
        if total > 0 {
            tracing::warn!(requeued, failed, "Reaped stale running jobs");
        }
        Ok(total)
    }

    /// Fetch one job by id.
    #[tracing::instrument(skip(self), fields(db.table = "mirror_jobs"))]
    pub async fn get(&self, id: uuid::Uuid) -> Result<Option<MirrorJob>, AppError> {
        let job: Option<MirrorJob> = sqlx::query_as::<Postgres, MirrorJob>(&format!(
            "SELECT {COLUMNS} FROM mirror_jobs WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(job)
    }
}
