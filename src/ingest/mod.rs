//! Ingestion module

pub mod chunker;
pub mod pipeline;

pub use pipeline::{IngestPipeline, IngestSummary};
