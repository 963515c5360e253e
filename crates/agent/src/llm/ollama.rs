use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use tablechat_core::ChatMessage;

use super::{error_for_status, CompletionRequest, LlmClient, LlmError};

/// Client for Ollama's native `/api/chat` endpoint with streaming disabled.
#[derive(Clone)]
pub struct OllamaClient {
    client: Client,
    base_url: String,
    model: String,
}

impl OllamaClient {
    pub fn new(client: Client, base_url: &str, model: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
        }
    }
}

#[async_trait]
impl LlmClient for OllamaClient {
    fn model(&self) -> &str {
        &self.model
    }

    async fn complete(&self, request: CompletionRequest) -> Result<String, LlmError> {
        let url = format!("{}/api/chat", self.base_url);
        let body = OllamaRequest {
            model: &self.model,
            messages: &request.messages,
            stream: false,
            options: OllamaOptions {
                temperature: request.temperature,
                num_predict: request.max_tokens,
            },
        };
        debug!(
            event_name = "llm.request",
            provider = "ollama",
            model = %self.model,
            message_count = request.messages.len()
        );

        let response = self.client.post(&url).json(&body).send().await?;
        let payload: OllamaResponse = error_for_status(response)
            .await?
            .json()
            .await
            .map_err(|error| LlmError::InvalidResponse(error.to_string()))?;

        Ok(payload.message.content)
    }

    async fn check_health(&self) -> Result<(), LlmError> {
        let url = format!("{}/api/tags", self.base_url);
        let response = self.client.get(&url).send().await?;
        error_for_status(response).await.map(|_| ())
    }
}

#[derive(Debug, Serialize)]
struct OllamaRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    stream: bool,
    options: OllamaOptions,
}

#[derive(Debug, Serialize)]
struct OllamaOptions {
    temperature: f32,
    num_predict: u32,
}

#[derive(Debug, Deserialize)]
struct OllamaResponse {
    message: OllamaMessage,
}

#[derive(Debug, Deserialize)]
struct OllamaMessage {
    #[serde(default)]
    content: String,
}
