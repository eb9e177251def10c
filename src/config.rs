//! Configuration module for protocol-assist service

use std::env;

#[derive(Debug, Clone)]
pub struct Config {
    // Server
    pub port: u16,
    pub host: String,

    // Chroma vector store
    pub chroma_url: String,
    pub chroma_collection: String,

    // OpenAI
    pub openai_api_key: String,
    pub openai_base_url: String,
    pub generation_model: String,
    pub embedding_model: String,
    pub generation_timeout_secs: u64,
}

impl Config {
    pub fn from_env() -> Self {
        Self {
            port: env::var("PORT")
                .unwrap_or_else(|_| "8000".to_string())
                .parse()
                .expect("Invalid PORT"),
            host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),

            chroma_url: env::var("CHROMA_URL")
                .unwrap_or_else(|_| "http://localhost:8001".to_string()),
            chroma_collection: env::var("CHROMA_COLLECTION")
                .unwrap_or_else(|_| "jts_protocols".to_string()),

            openai_api_key: env::var("OPENAI_API_KEY").unwrap_or_default(),
            openai_base_url: env::var("OPENAI_BASE_URL")
                .unwrap_or_else(|_| "https://api.openai.com/v1".to_string()),
            generation_model: env::var("GENERATION_MODEL")
                .unwrap_or_else(|_| "gpt-4".to_string()),
            embedding_model: env::var("EMBEDDING_MODEL")
                .unwrap_or_else(|_| "text-embedding-3-small".to_string()),
            generation_timeout_secs: env::var("GENERATION_TIMEOUT_SECS")
                .unwrap_or_else(|_| "60".to_string())
                .parse()
                .unwrap_or(60),
        }
    }
}
