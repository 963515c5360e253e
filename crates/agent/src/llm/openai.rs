use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tracing::debug;

use tablechat_core::ChatMessage;

use super::{error_for_status, CompletionRequest, LlmClient, LlmError};

/// Client for any endpoint speaking the OpenAI chat-completions protocol.
#[derive(Clone)]
pub struct OpenAiClient {
    client: Client,
    base_url: String,
    model: String,
    api_key: Option<SecretString>,
}

impl OpenAiClient {
    pub fn new(client: Client, base_url: &str, model: &str, api_key: Option<SecretString>) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            api_key,
        }
    }

    fn authorized(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.api_key {
            Some(key) => builder.bearer_auth(key.expose_secret()),
            None => builder,
        }
    }
}

#[async_trait]
impl LlmClient for OpenAiClient {
    fn model(&self) -> &str {
        &self.model
    }

    async fn complete(&self, request: CompletionRequest) -> Result<String, LlmError> {
        let url = format!("{}/v1/chat/completions", self.base_url);
        let body = ChatCompletionRequest {
            model: &self.model,
            messages: &request.messages,
            temperature: request.temperature,
            max_tokens: request.max_tokens,
        };
        debug!(
            event_name = "llm.request",
            provider = "openai",
            model = %self.model,
            message_count = request.messages.len()
        );

        let response = self.authorized(self.client.post(&url)).json(&body).send().await?;
        let payload: ChatCompletionResponse = error_for_status(response)
            .await?
            .json()
            .await
            .map_err(|error| LlmError::InvalidResponse(error.to_string()))?;

        let choice = payload.choices.into_iter().next().ok_or_else(|| {
            LlmError::InvalidResponse("completion response carried no choices".to_string())
        })?;
        Ok(choice.message.content.unwrap_or_default())
    }

    async fn check_health(&self) -> Result<(), LlmError> {
        let url = format!("{}/v1/models", self.base_url);
        let response = self.authorized(self.client.get(&url)).send().await?;
        error_for_status(response).await.map(|_| ())
    }
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<ChatCompletionChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionChoice {
    message: ChatCompletionMessage,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionMessage {
    content: Option<String>,
}
