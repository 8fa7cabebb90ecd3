// In-memory similarity index over chunk embeddings

use crate::embeddings::text_chunker::Chunk;
use crate::types::{AppError, AppResult};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use tracing::debug;

/// Texts embedded per request when building an index.
const EMBED_BATCH_SIZE: usize = 32;

/// Embedding backend: one vector per input text, in input order.
#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed_batch(&self, texts: &[&str]) -> AppResult<Vec<Vec<f32>>>;
}

/// Embedder backed by a local Ollama instance.
pub struct OllamaEmbedder {
    client: Client,
    base_url: String,
    model: String,
}

impl OllamaEmbedder {
    pub fn new(base_url: &str, model: &str) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
        }
    }
}

#[derive(Serialize)]
struct OllamaEmbedRequest<'a> {
    model: &'a str,
    input: Vec<&'a str>,
}

#[derive(Deserialize)]
struct OllamaEmbedResponse {
    embeddings: Vec<Vec<f32>>,
}

#[async_trait]
impl Embedder for OllamaEmbedder {
    async fn embed_batch(&self, texts: &[&str]) -> AppResult<Vec<Vec<f32>>> {
        let request = OllamaEmbedRequest {
            model: &self.model,
            input: texts.to_vec(),
        };

        let response = self
            .client
            .post(format!("{}/api/embed", self.base_url))
            .json(&request)
            .send()
            .await
            .map_err(|e| AppError::Embedding(format!("embedding request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::Embedding(format!("{}: {}", status, body)));
        }

        let parsed: OllamaEmbedResponse = response
            .json()
            .await
            .map_err(|e| AppError::Embedding(format!("failed to parse embedding response: {}", e)))?;

        Ok(parsed.embeddings)
    }
}

#[derive(Debug, Clone)]
pub struct SearchResult {
    pub chunk_index: usize,
    pub text: String,
    pub score: f32,
}

struct IndexedChunk {
    chunk: Chunk,
    embedding: Vec<f32>,
}

/// Brute-force cosine index. Documents here are a handful of chunks, so a
/// linear scan is enough.
#[derive(Default)]
pub struct VectorIndex {
    entries: Vec<IndexedChunk>,
}

impl VectorIndex {
    pub fn empty() -> Self {
        Self::default()
    }

    pub async fn build(embedder: &dyn Embedder, chunks: Vec<Chunk>) -> AppResult<Self> {
        let mut entries = Vec::with_capacity(chunks.len());

        for batch in chunks.chunks(EMBED_BATCH_SIZE) {
            let texts: Vec<&str> = batch.iter().map(|c| c.content.as_str()).collect();
            let embeddings = embedder.embed_batch(&texts).await?;
            if embeddings.len() != batch.len() {
                return Err(AppError::Embedding(format!(
                    "expected {} embeddings, got {}",
                    batch.len(),
                    embeddings.len()
                )));
            }
            entries.extend(
                batch
                    .iter()
                    .cloned()
                    .zip(embeddings)
                    .map(|(chunk, embedding)| IndexedChunk { chunk, embedding }),
            );
        }

        debug!(chunks = entries.len(), "Vector index built");
        Ok(Self { entries })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub async fn search(
        &self,
        embedder: &dyn Embedder,
        query: &str,
        limit: usize,
    ) -> AppResult<Vec<SearchResult>> {
        if self.entries.is_empty() || limit == 0 {
            return Ok(Vec::new());
        }
        let query_embedding = embedder
            .embed_batch(&[query])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| AppError::Embedding("no embedding returned for query".to_string()))?;
        Ok(self.search_by_vector(&query_embedding, limit))
    }

    /// Top `limit` chunks by cosine similarity; ties keep document order.
    pub fn search_by_vector(&self, query: &[f32], limit: usize) -> Vec<SearchResult> {
        let mut scored: Vec<SearchResult> = self
            .entries
            .iter()
            .map(|e| SearchResult {
                chunk_index: e.chunk.index,
                text: e.chunk.content.clone(),
                score: cosine_similarity(query, &e.embedding),
            })
            .collect();

        scored.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(Ordering::Equal)
                .then(a.chunk_index.cmp(&b.chunk_index))
        });
        scored.truncate(limit);
        scored
    }
}

/// Cosine similarity between two vectors. Returns 0.0 for zero-length or zero-norm vectors.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dim = a.len().min(b.len());
    if dim == 0 {
        return 0.0;
    }

    let mut dot = 0.0;
    let mut norm_a = 0.0;
    let mut norm_b = 0.0;
    for i in 0..dim {
        dot += a[i] * b[i];
        norm_a += a[i] * a[i];
        norm_b += b[i] * b[i];
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom <= f32::EPSILON {
        return 0.0;
    }
    dot / denom
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::LetterEmbedder;

    fn chunk(index: usize, content: &str) -> Chunk {
        Chunk {
            index,
            content: content.to_string(),
            char_offset: 0,
        }
    }

    #[test]
    fn test_cosine_similarity_identical_and_orthogonal() {
        assert!((cosine_similarity(&[1.0, 2.0], &[1.0, 2.0]) - 1.0).abs() < 1e-6);
        assert_eq!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]), 0.0);
        assert_eq!(cosine_similarity(&[], &[]), 0.0);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 1.0]), 0.0);
    }

    #[tokio::test]
    async fn test_search_ranks_most_similar_first() {
        let chunks = vec![chunk(0, "zzzz zzzz"), chunk(1, "photosynthesis light"), chunk(2, "qqqq")];
        let index = VectorIndex::build(&LetterEmbedder, chunks).await.unwrap();
        assert_eq!(index.len(), 3);

        let hits = index.search(&LetterEmbedder, "photosynthesis", 2).await.unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].chunk_index, 1);
    }

    #[tokio::test]
    async fn test_empty_index_returns_nothing() {
        let hits = VectorIndex::empty().search(&LetterEmbedder, "anything", 4).await.unwrap();
        assert!(hits.is_empty());
    }

    #[tokio::test]
    async fn test_ollama_embedder_posts_batch() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/api/embed")
            .match_body(mockito::Matcher::PartialJson(serde_json::json!({
                "model": "all-minilm",
                "input": ["one", "two"]
            })))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"model":"all-minilm","embeddings":[[0.1,0.2],[0.3,0.4]]}"#)
            .create_async()
            .await;

        let embedder = OllamaEmbedder::new(&server.url(), "all-minilm");
        let vectors = embedder.embed_batch(&["one", "two"]).await.unwrap();

        mock.assert_async().await;
        assert_eq!(vectors.len(), 2);
        assert_eq!(vectors[1], vec![0.3, 0.4]);
    }
}
