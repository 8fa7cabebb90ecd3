//! Agent System
//!
//! The agents that turn an uploaded document into quiz entries:
//!
//! - **Question Agent**: one completion per chunk, parsed into a question
//! - **Answer Agent**: retrieval-augmented answers for free-text questions
//!
//! ## Pipeline Overview
//!
//! ```text
//!  Document path
//!       │
//!       ▼
//! ┌─────────────┐
//! │  Extractor  │  → Plain text (PDF pages in order)
//! └─────────────┘
//!       │
//!       ▼
//! ┌─────────────┐
//! │   Chunker   │  → Overlapping windows, capped at max_chunks
//! └─────────────┘
//!       │
//!       ▼
//! ┌─────────────┐
//! │  Question   │  → Sequential, stops at max_questions
//! │   Agent     │
//! └─────────────┘
//!       │
//!       ▼ (rag mode only)
//! ┌─────────────┐
//! │   Answer    │  → Index over finer chunks, one answer per question
//! │   Agent     │
//! └─────────────┘
//!       │
//!       ▼
//!  Quiz entries
//! ```

pub mod answer;
pub mod parsing;
pub mod prompts;
pub mod question;

use std::path::Path;
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::config::{PipelineConfig, PipelineMode};
use crate::embeddings::{Chunk, TextChunker, TextExtractor, VectorIndex};
use crate::models::{AnsweredQuestion, Mcq, QuizEntry};
use crate::types::{AppError, AppResult};

pub use answer::{AnswerAgent, UNANSWERED};
pub use parsing::{extract_questions, looks_like_question, parse_mcq_output};
pub use prompts::PromptTemplate;
pub use question::QuestionAgent;

pub struct QuizPipeline {
    extractor: Arc<dyn TextExtractor>,
    questions: QuestionAgent,
    answers: Option<AnswerAgent>,
    config: PipelineConfig,
    chunker: TextChunker,
    answer_chunker: TextChunker,
}

impl QuizPipeline {
    pub fn new(
        extractor: Arc<dyn TextExtractor>,
        questions: QuestionAgent,
        answers: Option<AnswerAgent>,
        config: PipelineConfig,
    ) -> AppResult<Self> {
        if config.mode == PipelineMode::Rag && answers.is_none() {
            return Err(AppError::Config(
                "rag pipeline mode requires an answer agent".to_string(),
            ));
        }
        let chunker = TextChunker::new(config.chunk_size, config.chunk_overlap)?;
        let answer_chunker = TextChunker::new(config.answer_chunk_size, config.answer_chunk_overlap)?;

        Ok(Self {
            extractor,
            questions,
            answers,
            config,
            chunker,
            answer_chunker,
        })
    }

    /// Run the configured variant. Only extraction failures are returned as errors.
    pub async fn run(&self, path: &Path) -> AppResult<Vec<QuizEntry>> {
        match self.config.mode {
            PipelineMode::Mcq => Ok(self
                .run_mcq(path)
                .await?
                .into_iter()
                .map(QuizEntry::MultipleChoice)
                .collect()),
            PipelineMode::Rag => {
                let (index, questions) = self.run_rag(path).await?;
                Ok(self
                    .answer_questions(&index, questions)
                    .await
                    .into_iter()
                    .map(QuizEntry::OpenEnded)
                    .collect())
            }
        }
    }

    pub async fn run_mcq(&self, path: &Path) -> AppResult<Vec<Mcq>> {
        let chunks = self.load_chunks(path).await?;
        let mcqs = self.generate_mcqs(&chunks).await;
        info!(path = %path.display(), chunks = chunks.len(), questions = mcqs.len(), "MCQ generation finished");
        Ok(mcqs)
    }

    /// One question per chunk, in chunk order, until `max_questions` is reached.
    pub async fn generate_mcqs(&self, chunks: &[Chunk]) -> Vec<Mcq> {
        let mut mcqs = Vec::new();

        for chunk in self.limit_chunks(chunks) {
            if mcqs.len() >= self.config.max_questions {
                debug!(chunk = chunk.index, "Question limit reached, stopping early");
                break;
            }
            if chunk.content.trim().is_empty() {
                continue;
            }
            if let Some(mcq) = self.questions.generate_mcq(chunk).await {
                mcqs.push(mcq);
            }
        }
        mcqs
    }

    /// Free-text questions plus an index to answer them from.
    pub async fn run_rag(&self, path: &Path) -> AppResult<(VectorIndex, Vec<String>)> {
        let chunks = self.load_chunks(path).await?;
        let answers = self.answer_agent()?;

        let mut questions: Vec<String> = Vec::new();
        for chunk in self.limit_chunks(&chunks) {
            if questions.len() >= self.config.max_questions {
                debug!(chunk = chunk.index, "Question limit reached, stopping early");
                break;
            }
            if chunk.content.trim().is_empty() {
                continue;
            }
            for question in self.questions.generate_questions(chunk).await {
                if !questions.contains(&question) {
                    questions.push(question);
                }
            }
        }

        let before = questions.len();
        questions.retain(|q| looks_like_question(q));
        questions.truncate(self.config.max_questions);
        if questions.len() < before {
            debug!(kept = questions.len(), dropped = before - questions.len(), "Questions filtered");
        }

        let answer_chunks = self.answer_chunker.rechunk(&chunks);
        let index = match answers.build_index(answer_chunks).await {
            Ok(index) => index,
            Err(e) => {
                warn!(error = %e, "Failed to build retrieval index, answers will be placeholders");
                VectorIndex::empty()
            }
        };

        info!(path = %path.display(), questions = questions.len(), indexed = index.len(), "Question extraction finished");
        Ok((index, questions))
    }

    pub async fn answer_questions(&self, index: &VectorIndex, questions: Vec<String>) -> Vec<AnsweredQuestion> {
        let Some(answers) = self.answers.as_ref() else {
            return questions
                .into_iter()
                .map(|question| AnsweredQuestion {
                    question,
                    answer: UNANSWERED.to_string(),
                })
                .collect();
        };

        let mut answered = Vec::with_capacity(questions.len());
        for question in questions.into_iter().take(self.config.max_questions) {
            let answer = answers.answer(&question, index).await;
            answered.push(AnsweredQuestion { question, answer });
        }
        answered
    }

    async fn load_chunks(&self, path: &Path) -> AppResult<Vec<Chunk>> {
        let text = self.extractor.extract_text(path).await?;
        let chunks = self.chunker.chunk(&text);
        debug!(path = %path.display(), chars = text.chars().count(), chunks = chunks.len(), "Document segmented");
        Ok(chunks)
    }

    /// `max_chunks == 0` means no limit.
    fn limit_chunks<'a>(&self, chunks: &'a [Chunk]) -> &'a [Chunk] {
        match self.config.max_chunks {
            0 => chunks,
            max => &chunks[..chunks.len().min(max)],
        }
    }

    fn answer_agent(&self) -> AppResult<&AnswerAgent> {
        self.answers
            .as_ref()
            .ok_or_else(|| AppError::Config("no answer agent configured".to_string()))
    }
}
