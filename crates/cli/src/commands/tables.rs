use std::sync::Arc;

use tablechat_core::config::LoadOptions;
use tablechat_store::{AirtableClient, SchemaResolver, TabularStore};

use crate::commands::{load_config, runtime, CommandResult};

pub fn run(options: LoadOptions) -> CommandResult {
    let config = match load_config("tables", options) {
        Ok(config) => config,
        Err(result) => return result,
    };

    match AirtableClient::new(&config.airtable) {
        Ok(client) => run_with_store(Arc::new(client)),
        Err(error) => CommandResult::failure("tables", "store_client", error.to_string(), 4),
    }
}

pub fn run_with_store(store: Arc<dyn TabularStore>) -> CommandResult {
    let runtime = match runtime("tables") {
        Ok(runtime) => runtime,
        Err(result) => return result,
    };

    match runtime.block_on(SchemaResolver::new(store).tables()) {
        Ok(tables) if tables.is_empty() => {
            CommandResult::success("tables", "the base has no tables")
        }
        Ok(tables) => {
            let lines = tables
                .iter()
                .map(|table| format!("{} ({})", table.name, table.id))
                .collect::<Vec<_>>();
            CommandResult::success("tables", lines.join("\n"))
        }
        Err(error) => CommandResult::failure("tables", "store_connectivity", error.to_string(), 4),
    }
}
