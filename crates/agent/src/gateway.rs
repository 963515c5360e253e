use std::sync::Arc;

use tracing::debug;

use tablechat_core::config::LlmConfig;
use tablechat_core::{ChatMessage, Intent};

use crate::extraction::extract_intent;
use crate::llm::{CompletionRequest, LlmClient, LlmError};

const INTENT_SYSTEM_PROMPT: &str = "You classify requests made against a spreadsheet-like \
database. Reply with a single JSON object and nothing else, shaped like \
{\"action\": \"query\" | \"create\" | \"update\" | \"delete\" | \"unknown\", \
\"confidence\": <number between 0 and 1>}.";

/// Prompt-level access to the language model shared by every agent.
#[derive(Clone)]
pub struct CompletionGateway {
    client: Arc<dyn LlmClient>,
    temperature: f32,
    max_tokens: u32,
}

impl CompletionGateway {
    pub fn new(client: Arc<dyn LlmClient>, temperature: f32, max_tokens: u32) -> Self {
        Self { client, temperature, max_tokens }
    }

    pub fn from_config(client: Arc<dyn LlmClient>, config: &LlmConfig) -> Self {
        Self::new(client, config.temperature, config.max_tokens)
    }

    pub fn model(&self) -> &str {
        self.client.model()
    }

    pub async fn check_health(&self) -> Result<(), LlmError> {
        self.client.check_health().await
    }

    /// Sends `prompt` as the user turn, preceded by `system_prompt` when given.
    pub async fn complete(
        &self,
        prompt: &str,
        system_prompt: Option<&str>,
    ) -> Result<String, LlmError> {
        let mut messages = Vec::with_capacity(2);
        if let Some(system_prompt) = system_prompt {
            messages.push(ChatMessage::system(system_prompt));
        }
        messages.push(ChatMessage::user(prompt));

        let request = CompletionRequest {
            messages,
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        };
        let completion = self.client.complete(request).await?;
        debug!(
            event_name = "llm.completion",
            model = %self.client.model(),
            chars = completion.len()
        );
        Ok(completion)
    }

    /// Advisory only. Unparseable output becomes [`Intent::unknown`].
    pub async fn classify_intent(&self, message: &str) -> Result<Intent, LlmError> {
        let raw = self.complete(message, Some(INTENT_SYSTEM_PROMPT)).await?;
        Ok(extract_intent(&raw))
    }
}
