use async_trait::async_trait;
use sqlx::PgPool;
use tracing::debug;

use crate::db::QuizStore;
use crate::models::{ErrorRecord, QuizEntry, QuizResult};
use crate::types::AppResult;

pub struct DatabaseOperations;

impl DatabaseOperations {
    // Quiz operations

    /// Push each entry onto the end of the quiz's `quiz` array in one statement.
    pub async fn append_quiz_entries(
        pool: &PgPool,
        quiz_id: &str,
        entries: &[QuizEntry],
    ) -> AppResult<u64> {
        let payload = serde_json::to_value(entries)?;

        let result = sqlx::query(
            r#"
            UPDATE quizzes
            SET quiz = quiz || $2::jsonb, updated_at = NOW()
            WHERE quiz_id = $1
            "#,
        )
        .bind(quiz_id)
        .bind(payload)
        .execute(pool)
        .await?;

        Ok(result.rows_affected())
    }

    // Error record operations

    pub async fn insert_job_error(pool: &PgPool, record: &ErrorRecord) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO job_errors (job_id, quiz_id, filename, status, error, failed_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(&record.job_id)
        .bind(&record.quiz_id)
        .bind(&record.filename)
        .bind(&record.status)
        .bind(&record.error)
        .bind(record.timestamp)
        .execute(pool)
        .await?;

        Ok(())
    }
}

/// [`QuizStore`] over the Postgres pool.
#[derive(Clone)]
pub struct PgQuizStore {
    pool: PgPool,
}

impl PgQuizStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl QuizStore for PgQuizStore {
    async fn append_quiz(&self, result: &QuizResult) -> AppResult<u64> {
        let matched =
            DatabaseOperations::append_quiz_entries(&self.pool, &result.quiz_id, &result.entries).await?;
        debug!(quiz_id = %result.quiz_id, entries = result.entries.len(), matched, "Quiz entries appended");
        Ok(matched)
    }

    async fn record_failure(&self, record: &ErrorRecord) -> AppResult<()> {
        DatabaseOperations::insert_job_error(&self.pool, record).await
    }
}
