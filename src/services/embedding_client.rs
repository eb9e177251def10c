//! Embedding client for the hosted embeddings endpoint

use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::error::{ApiError, ApiResult};

/// Client for the OpenAI embeddings API
pub struct EmbeddingClient {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
}

#[derive(Debug, Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    input: Vec<&'a str>,
}

#[derive(Debug, Deserialize)]
struct EmbedResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

impl EmbeddingClient {
    pub fn new(base_url: &str, api_key: &str, model: &str) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            model: model.to_string(),
        }
    }

    /// Embed a single text
    pub async fn embed(&self, text: &str) -> ApiResult<Vec<f32>> {
        let mut embeddings = self.request(vec![text]).await?;
        embeddings
            .pop()
            .ok_or_else(|| ApiError::Embedding("Empty embedding response".to_string()))
    }

    /// Embed multiple texts in one request
    pub async fn embed_batch(&self, texts: &[String]) -> ApiResult<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let input: Vec<&str> = texts.iter().map(String::as_str).collect();
        self.request(input).await
    }

    async fn request(&self, input: Vec<&str>) -> ApiResult<Vec<Vec<f32>>> {
        let url = format!("{}/embeddings", self.base_url);
        let expected = input.len();

        let response = self.client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&EmbedRequest {
                model: &self.model,
                input,
            })
            .send()
            .await
            .map_err(|e| ApiError::Embedding(format!("Request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(ApiError::Embedding(format!("Embed failed: {} - {}", status, body)));
        }

        let result: EmbedResponse = response
            .json()
            .await
            .map_err(|e| ApiError::Embedding(format!("Parse failed: {}", e)))?;

        if result.data.len() != expected {
            return Err(ApiError::Embedding(format!(
                "Expected {} embeddings, got {}",
                expected,
                result.data.len()
            )));
        }

        Ok(result.data.into_iter().map(|d| d.embedding).collect())
    }
}
