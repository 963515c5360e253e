//! Task agents. Each one claims messages by keyword and answers them end to end.

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;

use crate::llm::LlmError;

pub mod create;
pub mod list_tables;
pub mod query;

pub use create::CreateAgent;
pub use list_tables::ListTablesAgent;
pub use query::{QueryAgent, BASIC_QUERY_KEYWORDS, QUERY_KEYWORDS};

/// Store failures never reach this type; agents turn them into apologetic replies.
#[derive(Debug, Error)]
pub enum AgentError {
    #[error(transparent)]
    Completion(#[from] LlmError),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct AgentDescriptor {
    pub name: &'static str,
    pub description: &'static str,
}

#[async_trait]
pub trait Agent: Send + Sync {
    fn name(&self) -> &'static str;

    fn description(&self) -> &'static str;

    /// Cheap, side-effect-free keyword test.
    fn can_handle(&self, text: &str) -> bool;

    async fn process(&self, text: &str) -> Result<String, AgentError>;

    fn descriptor(&self) -> AgentDescriptor {
        AgentDescriptor { name: self.name(), description: self.description() }
    }
}

/// Case-insensitive substring test against each keyword.
pub(crate) fn mentions_any(text: &str, keywords: &[&str]) -> bool {
    let text = text.to_lowercase();
    keywords.iter().any(|keyword| text.contains(keyword))
}

pub(crate) fn render_value(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}
