// Document text extraction (PDF via lopdf, plain text/markdown read directly)

use crate::types::{AppError, AppResult};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Turns a file on disk into its full text content.
#[async_trait]
pub trait TextExtractor: Send + Sync {
    async fn extract_text(&self, path: &Path) -> AppResult<String>;
}

pub struct DocumentProcessor;

impl DocumentProcessor {
    pub async fn process_document(path: &Path) -> AppResult<String> {
        match tokio::fs::metadata(path).await {
            Ok(meta) if meta.is_file() => {}
            Ok(_) => {
                return Err(AppError::Extraction(format!("{} is not a file", path.display())));
            }
            Err(e) => {
                return Err(AppError::Extraction(format!("cannot open {}: {}", path.display(), e)));
            }
        }

        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_lowercase)
            .unwrap_or_default();

        match extension.as_str() {
            "pdf" => {
                let owned: PathBuf = path.to_path_buf();
                tokio::task::spawn_blocking(move || extract_pdf_text(&owned))
                    .await
                    .map_err(|e| AppError::Internal(format!("PDF extraction task failed: {}", e)))?
            }
            "txt" | "text" | "md" | "markdown" => tokio::fs::read_to_string(path)
                .await
                .map_err(|e| AppError::Extraction(format!("cannot read {}: {}", path.display(), e))),
            other => Err(AppError::Extraction(format!("unsupported file type: {:?}", other))),
        }
    }
}

#[async_trait]
impl TextExtractor for DocumentProcessor {
    async fn extract_text(&self, path: &Path) -> AppResult<String> {
        Self::process_document(path).await
    }
}

/// Concatenate the text of every page in page order. Pages that fail to
/// decode are skipped; a document where no page decodes is an error.
fn extract_pdf_text(path: &Path) -> AppResult<String> {
    let document = lopdf::Document::load(path)
        .map_err(|e| AppError::Extraction(format!("failed to load PDF {}: {}", path.display(), e)))?;

    let pages = document.get_pages();
    let mut text = String::new();
    let mut decoded = 0usize;

    for page_number in pages.keys() {
        match document.extract_text(&[*page_number]) {
            Ok(page_text) => {
                if !text.is_empty() && !text.ends_with('\n') {
                    text.push('\n');
                }
                text.push_str(&page_text);
                decoded += 1;
            }
            Err(e) => warn!(page = page_number, error = %e, "Skipping undecodable PDF page"),
        }
    }

    if decoded == 0 && !pages.is_empty() {
        return Err(AppError::Extraction(format!(
            "no readable pages in {}",
            path.display()
        )));
    }

    debug!(pages = pages.len(), decoded, chars = text.len(), "PDF text extracted");
    Ok(text)
}
