//! Vector store module

use async_trait::async_trait;

use crate::error::ApiResult;
use crate::models::{Chunk, RetrievedChunk};

pub mod chroma_client;

pub use chroma_client::ChromaClient;

/// Persistent similarity-search index over protocol chunks.
///
/// Injected into the query engine and the ingestion pipeline so tests can
/// substitute an in-memory fake for the hosted store.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Upsert chunks under their deterministic ids
    async fn add_chunks(&self, chunks: &[Chunk]) -> ApiResult<usize>;

    /// Top-k chunks ranked by similarity to `text`, most similar first
    async fn query(&self, text: &str, top_k: usize) -> ApiResult<Vec<RetrievedChunk>>;

    /// Number of chunks in the collection
    async fn count(&self) -> ApiResult<usize>;

    /// Remove every chunk whose metadata names `source`
    async fn delete_source(&self, source: &str) -> ApiResult<()>;
}
