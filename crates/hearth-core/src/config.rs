//! Configuration module
//!
//! Environment-driven configuration for the API and worker. Values come from
//! the process environment (with `.env` support via dotenvy); every optional
//! setting has a named default constant below.

use std::env;

use crate::storage_types::StorageBackend;

const MAX_CONNECTIONS: u32 = 20;
const CONNECTION_TIMEOUT_SECS: u64 = 30;
const DOWNLOAD_TIMEOUT_SECS: u64 = 30;
const PROXY_TIMEOUT_SECS: u64 = 10;
const PROXY_CACHE_MAX_AGE_SECS: u64 = 300;
const QUEUE_MAX_WORKERS: usize = 4;
const QUEUE_POLL_INTERVAL_MS: u64 = 1000;
const QUEUE_MAX_RETRIES: i32 = 3;
const STALE_JOB_REAP_INTERVAL_SECS: u64 = 60;
const STALE_JOB_GRACE_PERIOD_SECS: i64 = 300;

/// Application configuration for the image mirror service.
#[derive(Clone, Debug)]
pub struct Config {
    pub server_port: u16,
    pub cors_origins: Vec<String>,
    pub environment: String,
    pub database_url: String,
    pub db_max_connections: u32,
    pub db_timeout_seconds: u64,
    // Storage configuration
    pub storage_backend: Option<StorageBackend>,
    pub s3_bucket: Option<String>,
    pub s3_region: Option<String>,
    /// Custom endpoint for S3-compatible providers (MinIO, DigitalOcean Spaces, etc.)
    pub s3_endpoint: Option<String>,
    pub aws_region: Option<String>,
    pub local_storage_path: Option<String>,
    pub local_storage_base_url: Option<String>,
    // Image pipeline configuration
    pub download_timeout_secs: u64,
    pub proxy_timeout_secs: u64,
    pub proxy_cache_max_age_secs: u64,
    // Mirror job queue configuration
    pub queue_max_workers: usize,
    pub queue_poll_interval_ms: u64,
    pub queue_max_retries: i32,
    /// Interval in seconds between runs of the stale job reaper. 0 = disabled.
    pub stale_job_reap_interval_secs: u64,
    /// Grace period in seconds before a job stuck in `running` is reaped.
    pub stale_job_grace_period_secs: i64,
}

impl Config {
    pub fn from_env() -> Result<Self, anyhow::Error> {
        dotenvy::dotenv().ok();

        let environment = env::var("ENVIRONMENT")
            .or_else(|_| env::var("APP_ENV"))
            .unwrap_or_else(|_| "development".to_string());

        let cors_origins_str = env::var("CORS_ORIGINS").unwrap_or_else(|_| "*".to_string());
        let is_production =
            environment.to_lowercase() == "production" || environment.to_lowercase() == "prod";
        if is_production && cors_origins_str.trim() == "*" {
            return Err(anyhow::anyhow!(
                "CORS_ORIGINS cannot be '*' in production. Please specify explicit origins."
            ));
        }

        let cors_origins: Vec<String> = cors_origins_str
            .split(',')
            .map(|s| s.trim().to_string())
            .collect();

        let storage_backend =
            env::var("STORAGE_BACKEND")
                .ok()
                .and_then(|s| match s.to_lowercase().as_str() {
                    "s3" => Some(StorageBackend::S3),
                    "local" => Some(StorageBackend::Local),
                    _ => None,
                });

        let config = Config {
            server_port: env::var("PORT")
                .unwrap_or_else(|_| "4000".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("PORT must be a valid number"))?,
            cors_origins,
            environment,
            database_url: env::var("DATABASE_URL")
                .map_err(|_| anyhow::anyhow!("DATABASE_URL must be set"))?,
            db_max_connections: env::var("DB_MAX_CONNECTIONS")
                .unwrap_or_else(|_| MAX_CONNECTIONS.to_string())
                .parse()
                .unwrap_or(MAX_CONNECTIONS),
            db_timeout_seconds: env::var("DB_TIMEOUT_SECONDS")
                .unwrap_or_else(|_| CONNECTION_TIMEOUT_SECS.to_string())
                .parse()
                .unwrap_or(CONNECTION_TIMEOUT_SECS),
            storage_backend,
            s3_bucket: env::var("S3_BUCKET").ok(),
            s3_region: env::var("S3_REGION").ok(),
            s3_endpoint: env::var("S3_ENDPOINT").ok(),
            aws_region: env::var("AWS_REGION").ok(),
            local_storage_path: env::var("LOCAL_STORAGE_PATH").ok(),
            local_storage_base_url: env::var("LOCAL_STORAGE_BASE_URL").ok(),
            download_timeout_secs: env::var("DOWNLOAD_TIMEOUT_SECS")
                .unwrap_or_else(|_| DOWNLOAD_TIMEOUT_SECS.to_string())
                .parse()
                .unwrap_or(DOWNLOAD_TIMEOUT_SECS),
            proxy_timeout_secs: env::var("PROXY_TIMEOUT_SECS")
                .unwrap_or_else(|_| PROXY_TIMEOUT_SECS.to_string())
                .parse()
                .unwrap_or(PROXY_TIMEOUT_SECS),
            proxy_cache_max_age_secs: env::var("PROXY_CACHE_MAX_AGE_SECS")
                .unwrap_or_else(|_| PROXY_CACHE_MAX_AGE_SECS.to_string())
                .parse()
                .unwrap_or(PROXY_CACHE_MAX_AGE_SECS),
            queue_max_workers: env::var("QUEUE_MAX_WORKERS")
                .unwrap_or_else(|_| QUEUE_MAX_WORKERS.to_string())
                .parse()
                .unwrap_or(QUEUE_MAX_WORKERS),
            queue_poll_interval_ms: env::var("QUEUE_POLL_INTERVAL_MS")
                .unwrap_or_else(|_| QUEUE_POLL_INTERVAL_MS.to_string())
                .parse()
                .unwrap_or(QUEUE_POLL_INTERVAL_MS),
            queue_max_retries: env::var("QUEUE_MAX_RETRIES")
                .unwrap_or_else(|_| QUEUE_MAX_RETRIES.to_string())
                .parse()
                .unwrap_or(QUEUE_MAX_RETRIES),
            stale_job_reap_interval_secs: env::var("STALE_JOB_REAP_INTERVAL_SECS")
                .unwrap_or_else(|_| STALE_JOB_REAP_INTERVAL_SECS.to_string())
                .parse()
                .unwrap_or(STALE_JOB_REAP_INTERVAL_SECS),
            stale_job_grace_period_secs: env::var("STALE_JOB_GRACE_PERIOD_SECS")
                .unwrap_or_else(|_| STALE_JOB_GRACE_PERIOD_SECS.to_string())
                .parse()
                .unwrap_or(STALE_JOB_GRACE_PERIOD_SECS),
        };

        Ok(config)
    }

    /// Fail fast on configuration combinations that cannot work at runtime.
    pub fn validate(&self) -> Result<(), anyhow::Error> {
        match self.storage_backend {
            Some(StorageBackend::S3) => {
                if self.s3_bucket.is_none() {
                    return Err(anyhow::anyhow!("S3_BUCKET must be set for the s3 backend"));
                }
                if self.s3_region.is_none() && self.aws_region.is_none() {
                    return Err(anyhow::anyhow!(
                        "S3_REGION or AWS_REGION must be set for the s3 backend"
                    ));
                }
            }
            Some(StorageBackend::Local) => {
                if self.local_storage_path.is_none() || self.local_storage_base_url.is_none() {
                    return Err(anyhow::anyhow!(
                        "LOCAL_STORAGE_PATH and LOCAL_STORAGE_BASE_URL must be set for the local backend"
                    ));
                }
            }
            None => {}
        }
        if self.queue_max_workers == 0 {
            return Err(anyhow::anyhow!("QUEUE_MAX_WORKERS must be at least 1"));
        }
        Ok(())
    }

    /// Check if the application is running in production mode
    pub fn is_production(&self) -> bool {
        let env = self.environment.to_lowercase();
        env == "production" || env == "prod"
    }
}
