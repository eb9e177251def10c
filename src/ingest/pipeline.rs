//! Batch ingestion pipeline
//!
//! Reads protocol documents, chunks them, and writes them to the vector
//! store with provenance metadata. Runs offline, never on the request
//! path. A single bad document is skipped with a warning and never aborts
//! a batch run.

use std::path::Path;
use std::sync::Arc;

use crate::error::{ApiError, ApiResult};
use crate::ingest::chunker::{assemble_chunks, paragraph_chunks, windowed_chunks};
use crate::models::Chunk;
use crate::vector_db::DocumentStore;

/// Outcome of a batch ingestion run
#[derive(Debug, Default)]
pub struct IngestSummary {
    pub files_processed: usize,
    pub files_skipped: usize,
    pub chunks_added: usize,
}

/// Ingestion pipeline over an injected store handle
pub struct IngestPipeline {
    store: Arc<dyn DocumentStore>,
}

impl IngestPipeline {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    /// Ingest raw text under a source label, at paragraph granularity
    pub async fn ingest_text(&self, content: &str, source: &str) -> ApiResult<usize> {
        let chunks = assemble_chunks(paragraph_chunks(content), source);
        self.replace_source(source, chunks).await
    }

    /// Ingest a plain-text file; the file stem is the source label unless
    /// overridden
    pub async fn ingest_text_file(
        &self,
        path: &Path,
        source_override: Option<&str>,
    ) -> ApiResult<usize> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ApiError::Internal(format!("Failed to read {}: {}", path.display(), e)))?;
        let source = match source_override {
            Some(label) => label.to_string(),
            None => file_stem(path),
        };
        self.ingest_text(&content, &source).await
    }

    /// Ingest a PDF: per-page text joined with page separators, then
    /// overlapping fixed-size windows
    pub async fn ingest_pdf_file(&self, path: &Path) -> ApiResult<usize> {
        let text = extract_pdf_text(path)?;
        let source = file_stem(path);
        let chunks = assemble_chunks(windowed_chunks(&text), &source);
        self.replace_source(&source, chunks).await
    }

    /// Ingest every .pdf and .txt file in a directory. Unparseable files
    /// are logged and skipped; the run continues.
    pub async fn ingest_directory(&self, dir: &Path) -> ApiResult<IngestSummary> {
        let mut entries: Vec<_> = std::fs::read_dir(dir)
            .map_err(|e| ApiError::Internal(format!("Failed to read {}: {}", dir.display(), e)))?
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .collect();
        entries.sort();

        let mut summary = IngestSummary::default();

        for path in entries {
            let extension = path
                .extension()
                .and_then(|ext| ext.to_str())
                .map(str::to_ascii_lowercase);

            let result = match extension.as_deref() {
                Some("pdf") => self.ingest_pdf_file(&path).await,
                Some("txt") => self.ingest_text_file(&path, None).await,
                _ => continue,
            };

            match result {
                Ok(added) => {
                    tracing::info!("Ingested {} ({} chunks)", path.display(), added);
                    summary.files_processed += 1;
                    summary.chunks_added += added;
                }
                Err(e) => {
                    tracing::warn!("⚠️ Skipping {}: {}", path.display(), e);
                    summary.files_skipped += 1;
                }
            }
        }

        Ok(summary)
    }

    /// Replace all stored chunks for a source.
    ///
    /// Deleting first keeps re-ingestion idempotent: an unchanged document
    /// leaves the collection count unchanged, and a shrunk document leaves
    /// no stale tail chunks under higher indexes.
    async fn replace_source(&self, source: &str, chunks: Vec<Chunk>) -> ApiResult<usize> {
        self.store.delete_source(source).await?;
        self.store.add_chunks(&chunks).await
    }
}

fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// Extract text from a PDF, page by page, joined with blank lines
fn extract_pdf_text(path: &Path) -> ApiResult<String> {
    let doc = lopdf::Document::load(path)
        .map_err(|e| ApiError::Internal(format!("Failed to load PDF: {}", e)))?;

    let mut pages_text = Vec::new();
    for page_number in doc.get_pages().keys() {
        let page_text = doc
            .extract_text(&[*page_number])
            .map_err(|e| ApiError::Internal(format!("Page {} extraction failed: {}", page_number, e)))?;
        pages_text.push(page_text);
    }

    Ok(pages_text.join("\n\n"))
}
