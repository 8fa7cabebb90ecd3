use async_trait::async_trait;
use sqlx::postgres::{PgPool, PgPoolOptions};

use crate::config::DatabaseConfig;
use crate::models::{ErrorRecord, QuizResult};
use crate::types::AppResult;

pub use operations::*;
pub use pool::*;

pub mod operations;
pub mod pool;

pub async fn create_pool(config: &DatabaseConfig) -> AppResult<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .connect(&config.url)
        .await?;

    // Test connection
    sqlx::query("SELECT 1").fetch_one(&pool).await?;

    Ok(pool)
}

pub async fn run_migrations(pool: &PgPool) -> AppResult<()> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .map_err(|e| crate::types::AppError::Internal(format!("migration failed: {}", e)))?;
    Ok(())
}

/// Where finished quizzes and failed jobs end up.
#[async_trait]
pub trait QuizStore: Send + Sync {
    /// Append every entry to the quiz identified by `result.quiz_id`.
    /// Returns the number of quiz documents matched (0 or 1).
    async fn append_quiz(&self, result: &QuizResult) -> AppResult<u64>;

    async fn record_failure(&self, record: &ErrorRecord) -> AppResult<()>;
}
