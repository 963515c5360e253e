use std::sync::Arc;

use tablechat_agent::{
    build_client, default_dispatcher, CompletionGateway, DispatchError, LlmClient,
};
use tablechat_core::config::{AppConfig, LoadOptions};
use tablechat_core::{ApplicationError, Message};
use tablechat_store::{AirtableClient, TabularStore};

use crate::commands::{load_config, runtime, CommandResult};

pub fn run(options: LoadOptions, text: &str) -> CommandResult {
    let config = match load_config("ask", options) {
        Ok(config) => config,
        Err(result) => return result,
    };

    let store = match AirtableClient::new(&config.airtable) {
        Ok(client) => client,
        Err(error) => return CommandResult::failure("ask", "store_client", error.to_string(), 4),
    };
    let llm = match build_client(&config.llm) {
        Ok(client) => client,
        Err(error) => return CommandResult::failure("ask", "llm_client", error.to_string(), 5),
    };

    run_with(&config, Arc::new(store), llm, text)
}

pub fn run_with(
    config: &AppConfig,
    store: Arc<dyn TabularStore>,
    llm: Arc<dyn LlmClient>,
    text: &str,
) -> CommandResult {
    let runtime = match runtime("ask") {
        Ok(runtime) => runtime,
        Err(result) => return result,
    };

    let gateway = CompletionGateway::from_config(llm, &config.llm);
    let mut dispatcher = default_dispatcher(store, gateway.clone(), &config.agent.default_table);
    if config.agent.classify_intent {
        dispatcher = dispatcher.with_intent_classification(gateway);
    }

    match runtime.block_on(dispatcher.route(&Message::from_user_text(text))) {
        Ok(answer) => CommandResult::success("ask", answer),
        Err(error @ DispatchError::Agent { .. }) => {
            CommandResult::failure("ask", "llm_failure", error.to_string(), 5)
        }
        Err(error) => {
            let interface = ApplicationError::from(error).into_interface("cli");
            CommandResult::failure(
                "ask",
                interface.kind(),
                format!("{} ({})", interface.user_message(), interface.message()),
                6,
            )
        }
    }
}
