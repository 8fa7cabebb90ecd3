// In-memory fakes shared by unit tests

use async_trait::async_trait;
use std::collections::{HashSet, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::db::QuizStore;
use crate::embeddings::{Embedder, TextExtractor};
use crate::llm::{CompletionSettings, LLMAdapter, LLM};
use crate::models::{ErrorRecord, QuizResult};
use crate::queue::{JobQueue, RawJob};
use crate::types::{AppError, AppResult, LLMRequest, LLMResponse, TokenUsage};

/// Replays canned completions; the last response repeats forever.
pub struct ScriptedAdapter {
    responses: Vec<Result<String, String>>,
    prompts: Arc<Mutex<Vec<String>>>,
}

impl ScriptedAdapter {
    pub fn always(response: &str) -> Self {
        Self::sequence(vec![Ok(response.to_string())])
    }

    pub fn failing() -> Self {
        Self::sequence(vec![Err("model unavailable".to_string())])
    }

    pub fn sequence(responses: Vec<Result<String, String>>) -> Self {
        Self {
            responses,
            prompts: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Every prompt received so far, in call order.
    pub fn prompts(&self) -> Arc<Mutex<Vec<String>>> {
        self.prompts.clone()
    }
}

#[async_trait]
impl LLMAdapter for ScriptedAdapter {
    async fn create_chat_completion(&self, request: &LLMRequest) -> AppResult<LLMResponse> {
        let prompt = request
            .messages
            .last()
            .map(|m| m.content.clone())
            .unwrap_or_default();
        let call = {
            let mut prompts = self.prompts.lock().unwrap();
            prompts.push(prompt);
            prompts.len() - 1
        };

        let response = self
            .responses
            .get(call)
            .or_else(|| self.responses.last())
            .cloned()
            .unwrap_or_else(|| Err("no scripted response".to_string()));

        match response {
            Ok(content) => Ok(LLMResponse {
                content,
                finish_reason: "stop".to_string(),
                usage: TokenUsage::default(),
            }),
            Err(e) => Err(AppError::LLMApi(e)),
        }
    }
}

pub fn llm_with(adapter: ScriptedAdapter) -> Arc<LLM> {
    Arc::new(LLM::with_adapter(
        Box::new(adapter),
        "scripted",
        CompletionSettings {
            model: "test-model".to_string(),
            max_tokens: 256,
            temperature: 0.0,
        },
    ))
}

/// Bag-of-letters embedder: deterministic and good enough to rank overlap.
pub struct LetterEmbedder;

#[async_trait]
impl Embedder for LetterEmbedder {
    async fn embed_batch(&self, texts: &[&str]) -> AppResult<Vec<Vec<f32>>> {
        Ok(texts
            .iter()
            .map(|t| {
                let mut v = vec![0.0f32; 26];
                for c in t.to_lowercase().chars() {
                    if c.is_ascii_lowercase() {
                        v[(c as u8 - b'a') as usize] += 1.0;
                    }
                }
                v
            })
            .collect())
    }
}

pub struct FailingEmbedder;

#[async_trait]
impl Embedder for FailingEmbedder {
    async fn embed_batch(&self, _texts: &[&str]) -> AppResult<Vec<Vec<f32>>> {
        Err(AppError::Embedding("embedding service down".to_string()))
    }
}

/// Returns fixed text (or a fixed error) for any path and remembers what was asked for.
pub struct StubExtractor {
    result: Result<String, String>,
    paths: Arc<Mutex<Vec<PathBuf>>>,
}

impl StubExtractor {
    pub fn text(text: &str) -> Self {
        Self {
            result: Ok(text.to_string()),
            paths: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn failing(reason: &str) -> Self {
        Self {
            result: Err(reason.to_string()),
            paths: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn paths(&self) -> Arc<Mutex<Vec<PathBuf>>> {
        self.paths.clone()
    }
}

#[async_trait]
impl TextExtractor for StubExtractor {
    async fn extract_text(&self, path: &Path) -> AppResult<String> {
        self.paths.lock().unwrap().push(path.to_path_buf());
        self.result.clone().map_err(AppError::Extraction)
    }
}

pub enum QueueEvent {
    Payload(Vec<u8>),
    TransportError(String),
}

/// Scripted queue; reports "no job" once the script runs out.
pub struct MemoryQueue {
    events: Mutex<VecDeque<QueueEvent>>,
}

impl MemoryQueue {
    pub fn new(events: Vec<QueueEvent>) -> Self {
        Self {
            events: Mutex::new(events.into()),
        }
    }

    pub fn payloads(payloads: &[&str]) -> Self {
        Self::new(
            payloads
                .iter()
                .map(|p| QueueEvent::Payload(p.as_bytes().to_vec()))
                .collect(),
        )
    }

    pub fn remaining(&self) -> usize {
        self.events.lock().unwrap().len()
    }
}

#[async_trait]
impl JobQueue for MemoryQueue {
    async fn pop(&self, timeout: Duration) -> AppResult<Option<RawJob>> {
        let next = self.events.lock().unwrap().pop_front();
        match next {
            Some(QueueEvent::Payload(payload)) => Ok(Some(RawJob {
                queue: "memory".to_string(),
                payload,
            })),
            Some(QueueEvent::TransportError(e)) => Err(AppError::Internal(e)),
            None => {
                tokio::time::sleep(timeout.min(Duration::from_millis(5))).await;
                Ok(None)
            }
        }
    }

    fn name(&self) -> &str {
        "memory"
    }
}

/// Records every write. Knows every quiz id unless restricted with [`MemoryStore::knowing`].
#[derive(Default)]
pub struct MemoryStore {
    known: Option<HashSet<String>>,
    fail_writes: bool,
    pub updates: Mutex<Vec<QuizResult>>,
    pub errors: Mutex<Vec<ErrorRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn knowing(quiz_ids: &[&str]) -> Self {
        Self {
            known: Some(quiz_ids.iter().map(|s| s.to_string()).collect()),
            ..Self::default()
        }
    }

    pub fn unavailable() -> Self {
        Self {
            fail_writes: true,
            ..Self::default()
        }
    }

    pub fn updates(&self) -> Vec<QuizResult> {
        self.updates.lock().unwrap().clone()
    }

    pub fn errors(&self) -> Vec<ErrorRecord> {
        self.errors.lock().unwrap().clone()
    }
}

#[async_trait]
impl QuizStore for MemoryStore {
    async fn append_quiz(&self, result: &QuizResult) -> AppResult<u64> {
        if self.fail_writes {
            return Err(AppError::Internal("store unavailable".to_string()));
        }
        let matched = match &self.known {
            Some(known) if !known.contains(&result.quiz_id) => 0,
            _ => 1,
        };
        self.updates.lock().unwrap().push(result.clone());
        Ok(matched)
    }

    async fn record_failure(&self, record: &ErrorRecord) -> AppResult<()> {
        if self.fail_writes {
            return Err(AppError::Internal("store unavailable".to_string()));
        }
        self.errors.lock().unwrap().push(record.clone());
        Ok(())
    }
}
