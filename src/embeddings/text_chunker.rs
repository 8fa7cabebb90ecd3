//! Fixed-window text segmentation.
//!
//! Text is cut into windows of `chunk_size` characters; every window after the
//! first starts `chunk_size - overlap` characters after its predecessor, so
//! adjacent chunks share exactly `overlap` characters. Only the final chunk
//! may be shorter than `chunk_size`.

use crate::types::{AppError, AppResult};
use serde::{Deserialize, Serialize};

/// A bounded slice of extracted document text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Chunk {
    /// 0-based position in the chunk sequence.
    pub index: usize,
    pub content: String,
    /// Offset, in characters, of the first character within the source text.
    pub char_offset: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextChunker {
    chunk_size: usize,
    overlap: usize,
}

impl TextChunker {
    pub fn new(chunk_size: usize, overlap: usize) -> AppResult<Self> {
        if chunk_size == 0 {
            return Err(AppError::InvalidRequest("chunk size must be at least 1".to_string()));
        }
        if overlap >= chunk_size {
            return Err(AppError::InvalidRequest(format!(
                "overlap ({}) must be smaller than chunk size ({})",
                overlap, chunk_size
            )));
        }
        Ok(Self { chunk_size, overlap })
    }

    /// Split `text` into overlapping windows. Empty text yields no chunks.
    pub fn chunk(&self, text: &str) -> Vec<Chunk> {
        if text.is_empty() {
            return Vec::new();
        }

        // Byte offset of every char boundary, plus the end of the string.
        let boundaries: Vec<usize> = text
            .char_indices()
            .map(|(i, _)| i)
            .chain(std::iter::once(text.len()))
            .collect();
        let char_count = boundaries.len() - 1;
        let step = self.chunk_size - self.overlap;

        let mut chunks = Vec::with_capacity(char_count / step + 1);
        let mut start = 0;
        loop {
            let end = (start + self.chunk_size).min(char_count);
            chunks.push(Chunk {
                index: chunks.len(),
                content: text[boundaries[start]..boundaries[end]].to_string(),
                char_offset: start,
            });
            if end == char_count {
                break;
            }
            start += step;
        }
        chunks
    }

    /// Re-split already chunked text into finer chunks, keeping offsets
    /// relative to the original document.
    pub fn rechunk(&self, chunks: &[Chunk]) -> Vec<Chunk> {
        let mut out = Vec::new();
        for parent in chunks {
            for child in self.chunk(&parent.content) {
                out.push(Chunk {
                    index: out.len(),
                    content: child.content,
                    char_offset: parent.char_offset + child.char_offset,
                });
            }
        }
        out
    }
}

/// Convenience wrapper around [`TextChunker`].
pub fn segment(text: &str, chunk_size: usize, overlap: usize) -> AppResult<Vec<Chunk>> {
    Ok(TextChunker::new(chunk_size, overlap)?.chunk(text))
}
