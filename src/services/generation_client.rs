//! Generation client for the hosted language model

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::error::{ApiError, ApiResult};

/// Lower temperature for more consistent medical guidance
const GENERATION_TEMPERATURE: f32 = 0.3;
/// Cap on generated tokens per response
const MAX_COMPLETION_TOKENS: u32 = 1000;

/// Hosted language model invoked with a system/user prompt pair.
///
/// Injected into the query engine so tests can substitute a fake and
/// assert on call counts.
#[async_trait]
pub trait Generator: Send + Sync {
    async fn generate(&self, system_prompt: &str, user_prompt: &str) -> ApiResult<String>;
}

/// Client for the OpenAI chat completions API
pub struct OpenAiClient {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ChatResponseMessage {
    content: String,
}

impl OpenAiClient {
    /// Build the client. Fails when no API key is configured; the server
    /// then runs degraded and rejects queries instead of crashing.
    pub fn new(config: &Config) -> ApiResult<Self> {
        if config.openai_api_key.is_empty() {
            return Err(ApiError::Config(
                "OPENAI_API_KEY not found in environment".to_string(),
            ));
        }

        // The request timeout is the generation timeout; a slow completion
        // surfaces as a generation error, not a hung request.
        let client = Client::builder()
            .timeout(Duration::from_secs(config.generation_timeout_secs))
            .build()
            .map_err(|e| ApiError::Generation(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: config.openai_base_url.trim_end_matches('/').to_string(),
            api_key: config.openai_api_key.clone(),
            model: config.generation_model.clone(),
        })
    }
}

#[async_trait]
impl Generator for OpenAiClient {
    async fn generate(&self, system_prompt: &str, user_prompt: &str) -> ApiResult<String> {
        let url = format!("{}/chat/completions", self.base_url);

        let request = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage { role: "system", content: system_prompt },
                ChatMessage { role: "user", content: user_prompt },
            ],
            temperature: GENERATION_TEMPERATURE,
            max_tokens: MAX_COMPLETION_TOKENS,
        };

        let response = self.client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&request)
            .send()
            .await
            .map_err(|e| ApiError::Generation(format!("Request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(ApiError::Generation(format!(
                "Completion failed: {} - {}",
                status, body
            )));
        }

        let result: ChatResponse = response
            .json()
            .await
            .map_err(|e| ApiError::Generation(format!("Parse failed: {}", e)))?;

        result
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .ok_or_else(|| ApiError::Generation("No completion choices returned".to_string()))
    }
}
