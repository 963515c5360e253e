use std::sync::Arc;
use std::time::Instant;

use thiserror::Error;
use tracing::{debug, info, warn};

use tablechat_core::{ApplicationError, Message};
use tablechat_store::{SchemaResolver, TabularStore};

use crate::agents::{Agent, AgentDescriptor, AgentError, CreateAgent, ListTablesAgent, QueryAgent};
use crate::gateway::CompletionGateway;
use crate::locator::TableLocator;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DispatchContext {
    pub correlation_id: String,
}

impl Default for DispatchContext {
    fn default() -> Self {
        Self { correlation_id: "unknown-correlation-id".to_owned() }
    }
}

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("request contains no user message")]
    NoUserMessage,
    #[error("no agent can handle message: {text}")]
    NoAgentMatched { text: String },
    #[error("agent `{agent}` failed: {source}")]
    Agent {
        agent: &'static str,
        #[source]
        source: AgentError,
    },
}

impl From<DispatchError> for ApplicationError {
    fn from(value: DispatchError) -> Self {
        match value {
            DispatchError::NoUserMessage => Self::NoUserMessage,
            DispatchError::NoAgentMatched { text } => Self::NoAgentMatched { text },
            error @ DispatchError::Agent { .. } => Self::Integration(error.to_string()),
        }
    }
}

/// Routes a conversation to the first registered agent whose keyword test accepts
/// the latest user message. Registration order is routing priority.
#[derive(Default)]
pub struct Dispatcher {
    agents: Vec<Arc<dyn Agent>>,
    classifier: Option<CompletionGateway>,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<A>(&mut self, agent: A)
    where
        A: Agent + 'static,
    {
        self.agents.push(Arc::new(agent));
    }

    /// Classify every routed message and log the result. Routing ignores it.
    pub fn with_intent_classification(mut self, gateway: CompletionGateway) -> Self {
        self.classifier = Some(gateway);
        self
    }

    pub fn agent_count(&self) -> usize {
        self.agents.len()
    }

    pub fn agents(&self) -> Vec<AgentDescriptor> {
        self.agents.iter().map(|agent| agent.descriptor()).collect()
    }

    pub async fn route(&self, message: &Message) -> Result<String, DispatchError> {
        self.route_with_context(message, &DispatchContext::default()).await
    }

    pub async fn route_with_context(
        &self,
        message: &Message,
        ctx: &DispatchContext,
    ) -> Result<String, DispatchError> {
        let text = message.latest_user_text().ok_or(DispatchError::NoUserMessage)?;
        let started = Instant::now();

        if let Some(classifier) = &self.classifier {
            match classifier.classify_intent(text).await {
                Ok(intent) => info!(
                    event_name = "dispatch.intent",
                    correlation_id = %ctx.correlation_id,
                    action = intent.action.as_str(),
                    confidence = intent.confidence
                ),
                Err(error) => warn!(
                    event_name = "dispatch.intent.failed",
                    correlation_id = %ctx.correlation_id,
                    error = %error
                ),
            }
        }

        let mut selected = None;
        for agent in &self.agents {
            let matched = agent.can_handle(text);
            debug!(
                event_name = "dispatch.candidacy",
                correlation_id = %ctx.correlation_id,
                agent = agent.name(),
                matched
            );
            if matched {
                selected = Some(agent);
                break;
            }
        }

        let Some(agent) = selected else {
            info!(event_name = "dispatch.unmatched", correlation_id = %ctx.correlation_id);
            return Err(DispatchError::NoAgentMatched { text: text.to_string() });
        };
        info!(
            event_name = "dispatch.selected",
            correlation_id = %ctx.correlation_id,
            agent = agent.name()
        );

        let reply = agent.process(text).await.map_err(|source| {
            warn!(
                event_name = "dispatch.failed",
                correlation_id = %ctx.correlation_id,
                agent = agent.name(),
                elapsed_ms = started.elapsed().as_millis() as u64,
                error = %source
            );
            DispatchError::Agent { agent: agent.name(), source }
        })?;
        info!(
            event_name = "dispatch.completed",
            correlation_id = %ctx.correlation_id,
            agent = agent.name(),
            elapsed_ms = started.elapsed().as_millis() as u64
        );
        Ok(reply)
    }
}

/// Registers the list-tables, query, and create agents, in that order.
pub fn default_dispatcher(
    store: Arc<dyn TabularStore>,
    gateway: CompletionGateway,
    default_table: &str,
) -> Dispatcher {
    let resolver = SchemaResolver::new(store.clone());
    let locator = TableLocator::new(resolver.clone(), default_table);

    let mut dispatcher = Dispatcher::new();
    dispatcher.register(ListTablesAgent::new(resolver));
    dispatcher.register(QueryAgent::new(gateway.clone(), store.clone(), locator.clone()));
    dispatcher.register(CreateAgent::new(gateway, store, locator));
    dispatcher
}
