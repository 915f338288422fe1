//! Hearth database library.
//!
//! sqlx/Postgres repositories for the image mirror ledger and the persisted
//! mirror job queue. Repositories are thin structs over a `PgPool`; schema
//! lives in the workspace `migrations/` directory and is applied at startup.

pub mod db;

pub use db::mirror_job::{MirrorJobRepository, JOB_NOTIFY_CHANNEL};
pub use db::property_image::PropertyImageRepository;
