//! Answer Agent
//!
//! Retrieval-augmented answering for free-text questions: the document's
//! chunks are embedded into a [`VectorIndex`], the closest chunks to each
//! question become the prompt context, and the model answers from them.

use std::sync::Arc;

use crate::agents::prompts::PromptTemplate;
use crate::embeddings::{Chunk, Embedder, VectorIndex};
use crate::llm::LLM;
use crate::types::AppResult;
use tracing::{debug, warn};

/// Answer stored when retrieval or completion fails for a question.
pub const UNANSWERED: &str = "Unable to generate answer.";

pub struct AnswerAgent {
    llm: Arc<LLM>,
    embedder: Arc<dyn Embedder>,
    template: PromptTemplate,
    top_k: usize,
}

impl AnswerAgent {
    pub fn new(llm: Arc<LLM>, embedder: Arc<dyn Embedder>, top_k: usize) -> Self {
        Self {
            llm,
            embedder,
            template: PromptTemplate::answer(),
            top_k,
        }
    }

    pub async fn build_index(&self, chunks: Vec<Chunk>) -> AppResult<VectorIndex> {
        VectorIndex::build(self.embedder.as_ref(), chunks).await
    }

    /// Answer one question from the index. Never fails: any error yields [`UNANSWERED`].
    pub async fn answer(&self, question: &str, index: &VectorIndex) -> String {
        match self.try_answer(question, index).await {
            Ok(answer) => answer,
            Err(e) => {
                warn!(question, error = %e, "Answer generation failed");
                UNANSWERED.to_string()
            }
        }
    }

    async fn try_answer(&self, question: &str, index: &VectorIndex) -> AppResult<String> {
        let hits = index.search(self.embedder.as_ref(), question, self.top_k).await?;
        if hits.is_empty() {
            warn!(question, "No context retrieved for question");
            return Ok(UNANSWERED.to_string());
        }
        debug!(question, hits = hits.len(), top_score = hits[0].score, "Context retrieved");

        let context = hits
            .iter()
            .map(|h| h.text.as_str())
            .collect::<Vec<_>>()
            .join("\n\n");
        let prompt = self.template.render(&[("context", &context), ("question", question)]);

        let answer = self.llm.complete(&prompt).await?;
        Ok(answer.trim().to_string())
    }
}
