//! Language-model clients.
//!
//! The core only ever sees [`LlmClient::complete`]: an ordered list of role-tagged
//! messages in, generated text out. Nothing guarantees the text is well-formed
//! JSON, even when the prompt asks for it, and blank text is passed through.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use thiserror::Error;

use tablechat_core::config::{LlmConfig, LlmProvider};
use tablechat_core::ChatMessage;

pub mod ollama;
pub mod openai;
pub mod scripted;

pub use ollama::OllamaClient;
pub use openai::OpenAiClient;
pub use scripted::ScriptedLlmClient;

const OPENAI_DEFAULT_BASE_URL: &str = "https://api.openai.com";
const OLLAMA_DEFAULT_BASE_URL: &str = "http://localhost:11434";

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("language model request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("language model returned {status}: {body}")]
    Status { status: u16, body: String },
    #[error("language model response could not be decoded: {0}")]
    InvalidResponse(String),
    #[error("language model unavailable: {0}")]
    Unavailable(String),
}

#[derive(Clone, Debug, PartialEq)]
pub struct CompletionRequest {
    pub messages: Vec<ChatMessage>,
    pub temperature: f32,
    pub max_tokens: u32,
}

#[async_trait]
pub trait LlmClient: Send + Sync {
    fn model(&self) -> &str;

    async fn complete(&self, request: CompletionRequest) -> Result<String, LlmError>;

    async fn check_health(&self) -> Result<(), LlmError>;
}

pub fn build_client(config: &LlmConfig) -> Result<Arc<dyn LlmClient>, LlmError> {
    let http = Client::builder().timeout(Duration::from_secs(config.timeout_secs.max(1))).build()?;

    let client: Arc<dyn LlmClient> = match config.provider {
        LlmProvider::Ollama => {
            let base_url = config.base_url.as_deref().unwrap_or(OLLAMA_DEFAULT_BASE_URL);
            Arc::new(OllamaClient::new(http, base_url, &config.model))
        }
        LlmProvider::OpenAi => {
            let base_url = config.base_url.as_deref().unwrap_or(OPENAI_DEFAULT_BASE_URL);
            Arc::new(OpenAiClient::new(http, base_url, &config.model, config.api_key.clone()))
        }
    };
    Ok(client)
}

pub(crate) async fn error_for_status(
    response: reqwest::Response,
) -> Result<reqwest::Response, LlmError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    Err(LlmError::Status { status: status.as_u16(), body })
}
