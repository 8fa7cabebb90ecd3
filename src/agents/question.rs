//! Question Agent
//!
//! Sends one chunk at a time through the quiz prompt and turns the reply into
//! a question. A failed call or an unparseable reply costs only that chunk.

use std::sync::Arc;

use crate::agents::parsing::{extract_questions, parse_mcq_output};
use crate::agents::prompts::PromptTemplate;
use crate::embeddings::Chunk;
use crate::llm::LLM;
use crate::models::Mcq;
use tracing::{debug, warn};

pub struct QuestionAgent {
    llm: Arc<LLM>,
    template: PromptTemplate,
}

impl QuestionAgent {
    pub fn new(llm: Arc<LLM>) -> Self {
        Self::with_template(llm, PromptTemplate::question())
    }

    pub fn with_template(llm: Arc<LLM>, template: PromptTemplate) -> Self {
        Self { llm, template }
    }

    /// Raw completion for a chunk, or `None` if the call failed.
    pub async fn generate_raw(&self, chunk: &Chunk) -> Option<String> {
        let prompt = self.template.render(&[("text", &chunk.content)]);

        match self.llm.complete(&prompt).await {
            Ok(raw) => {
                debug!(chunk = chunk.index, response_len = raw.len(), "Chunk completion received");
                Some(raw)
            }
            Err(e) => {
                warn!(chunk = chunk.index, error = %e, "Question generation failed for chunk");
                None
            }
        }
    }

    /// Structured multiple-choice question for a chunk.
    pub async fn generate_mcq(&self, chunk: &Chunk) -> Option<Mcq> {
        let raw = self.generate_raw(chunk).await?;
        let parsed = parse_mcq_output(&raw);
        if parsed.is_none() {
            warn!(
                chunk = chunk.index,
                response = %raw.chars().take(200).collect::<String>(),
                "Unparseable quiz output, skipping chunk"
            );
        }
        parsed
    }

    /// Free-text questions for a chunk; empty when nothing question-like came back.
    pub async fn generate_questions(&self, chunk: &Chunk) -> Vec<String> {
        match self.generate_raw(chunk).await {
            Some(raw) => {
                let questions = extract_questions(&raw);
                if questions.is_empty() {
                    warn!(chunk = chunk.index, "No questions found in completion");
                }
                questions
            }
            None => Vec::new(),
        }
    }
}
