//! Chunk model - the unit of stored and retrieved protocol text

use serde::{Deserialize, Serialize};

/// A bounded span of source text stored independently for retrieval
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Chunk {
    pub text: String,
    pub source: String,
    pub chunk_index: usize,
    pub chunk_count: usize,
}

impl Chunk {
    /// Store id for this chunk. Deterministic, so re-ingesting a source
    /// overwrites its prior entries instead of duplicating them.
    pub fn id(&self) -> String {
        chunk_id(&self.source, self.chunk_index)
    }

    pub fn metadata(&self) -> ChunkMetadata {
        ChunkMetadata {
            source: self.source.clone(),
            chunk_index: self.chunk_index,
            chunk_count: self.chunk_count,
            content_hash: format!("{:x}", md5::compute(&self.text)),
            page: None,
        }
    }
}

/// Metadata stored alongside each chunk in the vector store
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChunkMetadata {
    pub source: String,
    pub chunk_index: usize,
    pub chunk_count: usize,
    #[serde(default)]
    pub content_hash: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page: Option<u32>,
}

/// Build the store id for a chunk of `source` at `index`.
///
/// Whitespace runs in the source label are collapsed to `_` so ids stay
/// stable across human-entered labels and file stems alike.
pub fn chunk_id(source: &str, index: usize) -> String {
    let normalized: String = source.split_whitespace().collect::<Vec<_>>().join("_");
    format!("{}_{}", normalized, index)
}
