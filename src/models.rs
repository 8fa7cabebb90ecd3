use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::queue::{WorkerSnapshot, WorkerStats};

/// Shared state for the health endpoint.
#[derive(Clone)]
pub struct AppState {
    pub pool: sqlx::PgPool,
    pub stats: Arc<WorkerStats>,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: String,
    pub database: String,
    pub worker: WorkerSnapshot,
}

/// Placeholder text for an option the model left out.
pub const MISSING_OPTION: &str = "(Missing Option)";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OptionLetter {
    A,
    B,
    C,
    D,
}

impl OptionLetter {
    /// Case-insensitive `a`-`d`.
    pub fn from_char(c: char) -> Option<Self> {
        match c.to_ascii_lowercase() {
            'a' => Some(OptionLetter::A),
            'b' => Some(OptionLetter::B),
            'c' => Some(OptionLetter::C),
            'd' => Some(OptionLetter::D),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct McqOptions {
    pub a: String,
    pub b: String,
    pub c: String,
    pub d: String,
}

/// A multiple-choice question with exactly four options.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Mcq {
    pub question: String,
    pub options: McqOptions,
    pub correct_option: OptionLetter,
}

/// A free-text question with an answer produced by retrieval.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnsweredQuestion {
    pub question: String,
    pub answer: String,
}

/// One element of a quiz document's `quiz` array.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum QuizEntry {
    MultipleChoice(Mcq),
    OpenEnded(AnsweredQuestion),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizResult {
    pub quiz_id: String,
    pub entries: Vec<QuizEntry>,
}

/// Diagnostic document written when a job cannot be completed.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorRecord {
    pub job_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quiz_id: Option<String>,
    pub filename: String,
    pub status: String,
    pub error: String,
    pub timestamp: DateTime<Utc>,
}

impl ErrorRecord {
    pub const STATUS_FAILED: &'static str = "failed";

    pub fn failed(
        job_id: impl Into<String>,
        quiz_id: Option<String>,
        filename: impl Into<String>,
        error: impl Into<String>,
    ) -> Self {
        Self {
            job_id: job_id.into(),
            quiz_id,
            filename: filename.into(),
            status: Self::STATUS_FAILED.to_string(),
            error: error.into(),
            timestamp: Utc::now(),
        }
    }
}
