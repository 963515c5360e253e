use std::sync::Arc;

use tablechat_agent::{
    build_client, default_dispatcher, CompletionGateway, Dispatcher, LlmClient, LlmError,
};
use tablechat_core::config::AppConfig;
use tablechat_store::{AirtableClient, StoreError, TabularStore};
use thiserror::Error;
use tracing::info;

pub struct Application {
    pub config: AppConfig,
    pub dispatcher: Arc<Dispatcher>,
    pub model: String,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error("tabular store client could not be created: {0}")]
    Store(#[source] StoreError),
    #[error("language model client could not be created: {0}")]
    LlmClient(#[source] LlmError),
    #[error("language model is unreachable: {0}")]
    LlmUnreachable(#[source] LlmError),
}

pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(
        event_name = "system.bootstrap.start",
        correlation_id = "bootstrap",
        "starting application bootstrap"
    );

    let store: Arc<dyn TabularStore> =
        Arc::new(AirtableClient::new(&config.airtable).map_err(BootstrapError::Store)?);
    let llm = build_client(&config.llm).map_err(BootstrapError::LlmClient)?;

    assemble(config, store, llm).await
}

/// Wires the dispatcher once the model has answered a reachability check.
pub async fn assemble(
    config: AppConfig,
    store: Arc<dyn TabularStore>,
    llm: Arc<dyn LlmClient>,
) -> Result<Application, BootstrapError> {
    let gateway = CompletionGateway::from_config(llm, &config.llm);
    gateway.check_health().await.map_err(BootstrapError::LlmUnreachable)?;
    info!(
        event_name = "system.bootstrap.model_reachable",
        correlation_id = "bootstrap",
        provider = ?config.llm.provider,
        model = %gateway.model(),
        "language model reachable"
    );

    let mut dispatcher = default_dispatcher(store, gateway.clone(), &config.agent.default_table);
    if config.agent.classify_intent {
        dispatcher = dispatcher.with_intent_classification(gateway.clone());
    }
    info!(
        event_name = "system.bootstrap.dispatcher_ready",
        correlation_id = "bootstrap",
        agent_count = dispatcher.agent_count(),
        default_table = %config.agent.default_table,
        "dispatcher ready"
    );

    Ok(Application { model: gateway.model().to_string(), dispatcher: Arc::new(dispatcher), config })
}
