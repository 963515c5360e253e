use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;

use super::{CompletionRequest, LlmClient, LlmError};

enum Scripted {
    Text(String),
    Failure(String),
}

#[derive(Default)]
struct ScriptState {
    replies: VecDeque<Scripted>,
    requests: Vec<CompletionRequest>,
}

/// Replays queued completions in order and records every request it receives.
#[derive(Default)]
pub struct ScriptedLlmClient {
    state: Mutex<ScriptState>,
}

impl ScriptedLlmClient {
    pub fn new<I, S>(replies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let client = Self::default();
        for reply in replies {
            client.push_reply(reply);
        }
        client
    }

    pub fn push_reply(&self, reply: impl Into<String>) {
        self.lock().replies.push_back(Scripted::Text(reply.into()));
    }

    pub fn push_failure(&self, message: impl Into<String>) {
        self.lock().replies.push_back(Scripted::Failure(message.into()));
    }

    pub fn calls(&self) -> usize {
        self.lock().requests.len()
    }

    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.lock().requests.clone()
    }

    fn lock(&self) -> MutexGuard<'_, ScriptState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl LlmClient for ScriptedLlmClient {
    fn model(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, request: CompletionRequest) -> Result<String, LlmError> {
        let mut state = self.lock();
        state.requests.push(request);
        match state.replies.pop_front() {
            Some(Scripted::Text(text)) => Ok(text),
            Some(Scripted::Failure(message)) => Err(LlmError::Unavailable(message)),
            None => Err(LlmError::Unavailable("no scripted completion left".to_string())),
        }
    }

    async fn check_health(&self) -> Result<(), LlmError> {
        Ok(())
    }
}
