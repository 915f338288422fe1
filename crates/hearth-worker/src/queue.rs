//! Mirror job queue: worker pool, LISTEN/NOTIFY or polling, retry, and submission.
//!
//! Shutdown: [`MirrorQueue::shutdown`] signals the pool to stop; it does not wait
//! for in-flight jobs. For graceful shutdown, coordinate with your runtime and
//! allow time for running jobs to finish before process exit.

use anyhow::{Context, Result};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::{mpsc, Semaphore};
use tokio::time::sleep;
use uuid::Uuid;

use hearth_core::models::{MirrorJob, MirrorJobPayload};
use hearth_db::{MirrorJobRepository, JOB_NOTIFY_CHANNEL};

use crate::context::JobContext;

/// Maximum delay in seconds before retrying a failed job. Caps exponential
/// backoff so high retry counts do not produce excessively long delays.
pub const MAX_RETRY_BACKOFF_SECS: u64 = 300;

/// Computes backoff in seconds for a given retry count (exponential with cap).
#[inline]
pub(crate) fn compute_retry_backoff_seconds(retry_count: i32) -> u64 {
    (2_u64.pow(retry_count as u32)).min(MAX_RETRY_BACKOFF_SECS)
}

#[derive(Clone)]
pub struct MirrorQueueConfig {
    pub max_workers: usize,
    pub poll_interval_ms: u64,
    pub max_retries: i32,
    /// Interval in seconds between runs of the stale job reaper.
    pub stale_job_reap_interval_secs: u64,
    /// How long a job may sit in `running` before the reaper reclaims it.
    pub stale_job_grace_period_secs: i64,
}

impl Default for MirrorQueueConfig {
    fn default() -> Self {
        Self {
            max_workers: 4,
            poll_interval_ms: 1000,
            max_retries: 3,
            stale_job_reap_interval_secs: 60,
            stale_job_grace_period_secs: 300,
        }
    }
}

pub struct MirrorQueue {
    repository: MirrorJobRepository,
    config: MirrorQueueConfig,
    shutdown_tx: mpsc::Sender<()>,
}

impl MirrorQueue {
    /// Create a new MirrorQueue with a weak reference to the dispatch context.
    ///
    /// If `pool` is `Some`, the worker uses PostgreSQL LISTEN/NOTIFY to wake
    /// immediately when jobs are enqueued, in addition to polling at
    /// `poll_interval_ms`. If `pool` is `None`, only polling is used.
    pub fn new(
        repository: MirrorJobRepository,
        config: MirrorQueueConfig,
        context: Weak<dyn JobContext>,
        pool: Option<sqlx::PgPool>,
    ) -> Self {
        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);

        let repo_clone = repository.clone();
        let config_clone = config.clone();

        tokio::spawn(async move {
            Self::worker_pool(repo_clone, config_clone, context, shutdown_rx, pool).await;
        });

        Self {
            repository,
            config,
            shutdown_tx,
        }
    }

    /// Submit one property's photo list as a new queued job.
    #[tracing::instrument(skip(self, payload), fields(property.id = %payload.property_id))]
    pub async fn submit(&self, payload: MirrorJobPayload) -> Result<Uuid> {
        let property_id = payload.property_id.clone();
        let image_count = payload.images.len();
        let value = serde_json::to_value(&payload)
            .context("Failed to serialize mirror job payload")?;

        let job = self
            .repository
            .enqueue(&property_id, value, self.config.max_retries)
            .await
            .map_err(|e| {
                tracing::error!(
                    error = %e,
                    property_id = %property_id,
                    "Failed to enqueue mirror job"
                );
                anyhow::anyhow!("Failed to enqueue mirror job: {}", e)
            })?;

        tracing::info!(
            job_id = %job.id,
            property_id = %property_id,
            image_count,
            "Mirror job submitted to queue"
        );

        Ok(job.id)
    }

    async fn worker_pool(
        repository: MirrorJobRepository,
        config: MirrorQueueConfig,
        context: Weak<dyn JobContext>,
        mut shutdown_rx: mpsc::Receiver<()>,
        pool: Option<sqlx::PgPool>,
    ) {
        let use_listen = pool.is_some();
        tracing::info!(
            max_workers = config.max_workers,
            poll_interval_ms = config.poll_interval_ms,
            listen_notify = use_listen,
            "Mirror job worker pool started"
        );

        let semaphore = Arc::new(Semaphore::new(config.max_workers));
        let poll_interval = Duration::from_millis(config.poll_interval_ms);

        // Wakes the main loop when LISTEN receives a NOTIFY.
        let (notify_tx, mut notify_rx) = mpsc::channel::<()>(16);
        if let Some(pool) = pool {
            let tx = notify_tx.clone();
            tokio::spawn(async move {
                loop {
                    match sqlx::postgres::PgListener::connect_with(&pool).await {
                        Ok(mut listener) => {
                            if let Err(e) = listener.listen(JOB_NOTIFY_CHANNEL).await {
                                tracing::warn!(error = %e, "LISTEN failed, will retry");
                                tokio::time::sleep(Duration::from_secs(5)).await;
                                continue;
                            }
                            while listener.recv().await.is_ok() {
                                let _ = tx.send(()).await;
                            }
                        }
                        Err(e) => {
                            tracing::warn!(error = %e, "PgListener connect failed, will retry");
                            tokio::time::sleep(Duration::from_secs(5)).await;
                        }
                    }
                }
            });
        }

        // Spawn stale job reaper (if interval > 0)
        let (reaper_shutdown_tx, mut reaper_shutdown_rx) = mpsc::channel::<()>(1);
        if config.stale_job_reap_interval_secs > 0 {
            let repo_for_reaper = repository.clone();
            let reap_interval = Duration::from_secs(config.stale_job_reap_interval_secs);
            let grace_period = config.stale_job_grace_period_secs;
            tokio::spawn(async move {
                let mut interval = tokio::time::interval(reap_interval);
                interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
                loop {
                    tokio::select! {
                        _ = interval.tick() => {
                            if let Err(e) = repo_for_reaper.reap_stale_running(grace_period).await {
                                tracing::error!(error = %e, "Stale job reaper failed");
                            }
                        }
                        _ = reaper_shutdown_rx.recv() => break,
                    }
                }
            });
        }

        loop {
            tokio::select! {
                _ = shutdown_rx.recv() => {
                    tracing::info!("Mirror job worker pool shutting down");
                    let _ = reaper_shutdown_tx.send(()).await;
                    break;
                }
                _ = notify_rx.recv() => {
                    Self::claim_and_dispatch_one(&repository, &semaphore, &context).await;
                }
                _ = sleep(poll_interval) => {
                    Self::claim_and_dispatch_one(&repository, &semaphore, &context).await;
                }
            }
        }

        tracing::info!("Mirror job worker pool stopped");
    }

    async fn claim_and_dispatch_one(
        repository: &MirrorJobRepository,
        semaphore: &Arc<Semaphore>,
        context: &Weak<dyn JobContext>,
    ) {
        let permit = match semaphore.clone().try_acquire_owned() {
            Ok(permit) => permit,
            Err(_) => {
                tracing::debug!("No workers available, skipping claim");
                return;
            }
        };

        match repository.claim_next().await {
            Ok(Some(job)) => {
                let repo = repository.clone();
                let ctx = context.clone();

                tokio::spawn(async move {
                    let _permit = permit;
                    if let Err(e) = Self::process_job_with_retry(job, repo, ctx).await {
                        tracing::error!(error = %e, "Job processing failed after retries");
                    }
                });
            }
            Ok(None) => {
                drop(permit);
                tracing::trace!("No jobs available in queue");
            }
            Err(e) => {
                drop(permit);
                tracing::error!(error = %e, "Failed to claim job from queue");
            }
        }
    }

    #[tracing::instrument(skip(repository, context), fields(job.id = %job.id, property.id = %job.property_id))]
    async fn process_job_with_retry(
        job: MirrorJob,
        repository: MirrorJobRepository,
        context: Weak<dyn JobContext>,
    ) -> Result<()> {
        let ctx = context
            .upgrade()
            .ok_or_else(|| anyhow::anyhow!("JobContext was dropped, cannot process job"))?;

        match ctx.process_job(&job).await {
            Ok(result) => {
                repository
                    .mark_completed(job.id, result)
                    .await
                    .context("Failed to mark job as completed")?;
                tracing::info!(job_id = %job.id, "Mirror job completed");
                Ok(())
            }
            Err(e) => {
                tracing::error!(
                    job_id = %job.id,
                    error = %e,
                    retry_count = job.retry_count,
                    max_retries = job.max_retries,
                    "Mirror job execution failed"
                );

                if job.retry_count < job.max_retries {
                    let backoff_seconds = compute_retry_backoff_seconds(job.retry_count);
                    tracing::info!(
                        job_id = %job.id,
                        retry_count = job.retry_count + 1,
                        backoff_seconds,
                        "Scheduling job retry"
                    );
                    repository
                        .retry_later(job.id, &e.to_string(), backoff_seconds)
                        .await
                        .context("Failed to requeue job for retry")?;
                    Ok(())
                } else {
                    repository
                        .mark_failed(job.id, &e.to_string())
                        .await
                        .context("Failed to mark job as failed")?;
                    tracing::error!(job_id = %job.id, "Mirror job failed after max retries");
                    Err(e)
                }
            }
        }
    }

    /// Signals the worker pool to stop claiming new jobs and exit the main loop.
    ///
    /// Returns immediately after sending the signal; it does **not** wait for
    /// in-flight jobs to complete. Already-spawned job handlers keep running
    /// until they finish. The stale reaper makes jobs lost to a hard kill
    /// eligible for another worker.
    pub async fn shutdown(&self) {
        tracing::info!("Initiating mirror queue shutdown");
        let _ = self.shutdown_tx.send(()).await;
    }
}

impl Clone for MirrorQueue {
    fn clone(&self) -> Self {
        Self {
            repository: self.repository.clone(),
            config: self.config.clone(),
            shutdown_tx: self.shutdown_tx.clone(),
        }
    }
}
