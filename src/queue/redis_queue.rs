// Redis list transport: the web backend LPUSHes, the worker BLPOPs

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use std::time::Duration;
use tracing::{debug, info};

use crate::queue::jobs::Job;
use crate::queue::{JobQueue, RawJob};
use crate::types::AppResult;

#[derive(Clone)]
pub struct RedisJobQueue {
    conn: ConnectionManager,
    queue_name: String,
}

impl RedisJobQueue {
    pub async fn connect(url: &str, queue_name: &str) -> AppResult<Self> {
        let client = redis::Client::open(url)?;
        let conn = ConnectionManager::new(client).await?;
        info!(queue = queue_name, "Connected to Redis job queue");
        Ok(Self {
            conn,
            queue_name: queue_name.to_string(),
        })
    }

    pub fn queue_name(&self) -> &str {
        &self.queue_name
    }

    /// Enqueue a job the same way the web backend does. Returns the queue length.
    pub async fn push(&self, job: &Job) -> AppResult<u64> {
        let payload = job.encode()?;
        let mut conn = self.conn.clone();
        let len: u64 = conn.lpush(&self.queue_name, payload).await?;
        debug!(queue = %self.queue_name, len, "Job enqueued");
        Ok(len)
    }
}

#[async_trait]
impl JobQueue for RedisJobQueue {
    async fn pop(&self, timeout: Duration) -> AppResult<Option<RawJob>> {
        let mut conn = self.conn.clone();
        let popped: Option<(String, Vec<u8>)> =
            conn.blpop(&self.queue_name, timeout.as_secs_f64()).await?;

        Ok(popped.map(|(queue, payload)| RawJob { queue, payload }))
    }

    fn name(&self) -> &str {
        &self.queue_name
    }
}
