//! Background mirror job queue.
//!
//! A worker pool claims persisted jobs from Postgres and dispatches them to a
//! [`JobContext`] implemented by the API's application state.

pub mod context;
pub mod queue;

pub use context::JobContext;
pub use queue::{MirrorQueue, MirrorQueueConfig};
