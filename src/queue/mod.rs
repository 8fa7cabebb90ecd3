//! Job queue consumption.
//!
//! A [`JobQueue`] hands out raw payloads; the [`Worker`] decodes them, runs the
//! quiz pipeline and persists either the quiz or an error record.

pub mod jobs;
pub mod redis_queue;
pub mod workers;

use async_trait::async_trait;
use std::time::Duration;

use crate::types::AppResult;

pub use jobs::{Job, JobDecodeError};
pub use redis_queue::RedisJobQueue;
pub use workers::{JobOutcome, Worker, WorkerSettings, WorkerSnapshot, WorkerState, WorkerStats};

/// A payload popped from a named queue.
#[derive(Debug, Clone)]
pub struct RawJob {
    pub queue: String,
    pub payload: Vec<u8>,
}

#[async_trait]
pub trait JobQueue: Send + Sync {
    /// Block for at most `timeout` waiting for the next payload.
    async fn pop(&self, timeout: Duration) -> AppResult<Option<RawJob>>;

    fn name(&self) -> &str;
}
