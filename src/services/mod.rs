//! Services module

pub mod embedding_client;
pub mod generation_client;
pub mod query_engine;

pub use embedding_client::EmbeddingClient;
pub use generation_client::{Generator, OpenAiClient};
pub use query_engine::QueryEngine;
