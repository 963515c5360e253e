use async_trait::async_trait;
use tracing::{debug, warn};

use tablechat_store::SchemaResolver;

use super::{mentions_any, Agent, AgentError};

const KEYWORDS: &[&str] = &[
    "list tables",
    "list all tables",
    "list the tables",
    "list my tables",
    "show tables",
    "show all tables",
    "show the tables",
    "show me the tables",
    "show me all tables",
    "show my tables",
    "what tables",
    "which tables",
    "available tables",
    "tables are there",
    "tables do i have",
    "tables in my base",
    "tables in the base",
];

pub const NO_TABLES_REPLY: &str = "Sorry, I couldn't find any tables in your base. \
Check that the base id and access token are correct.";

/// Lists the tables in the base. Never calls the language model.
pub struct ListTablesAgent {
    resolver: SchemaResolver,
}

impl ListTablesAgent {
    pub fn new(resolver: SchemaResolver) -> Self {
        Self { resolver }
    }
}

#[async_trait]
impl Agent for ListTablesAgent {
    fn name(&self) -> &'static str {
        "list_tables"
    }

    fn description(&self) -> &'static str {
        "Lists the tables available in the connected base."
    }

    fn can_handle(&self, text: &str) -> bool {
        mentions_any(text, KEYWORDS)
    }

    async fn process(&self, _text: &str) -> Result<String, AgentError> {
        let tables = match self.resolver.tables().await {
            Ok(tables) => tables,
            Err(error) => {
                warn!(event_name = "agent.list_tables.failed", error = %error);
                return Ok(format!("Sorry, I couldn't read the tables in your base: {error}"));
            }
        };
        debug!(event_name = "agent.list_tables.fetched", table_count = tables.len());

        if tables.is_empty() {
            return Ok(NO_TABLES_REPLY.to_string());
        }

        let mut reply = String::from("Here are the tables in your base:");
        for (index, table) in tables.iter().enumerate() {
            reply.push_str(&format!("\n{}. {} ({})", index + 1, table.name, table.id));
        }
        Ok(reply)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use tablechat_store::{InMemoryTabularStore, SchemaResolver};

    use super::{ListTablesAgent, NO_TABLES_REPLY};
    use crate::agents::Agent;

    #[test]
    fn claims_table_listing_phrasings() {
        let agent =
            ListTablesAgent::new(SchemaResolver::new(Arc::new(InMemoryTabularStore::new())));
        assert!(agent.can_handle("What tables do I have?"));
        assert!(agent.can_handle("please list all tables"));
        assert!(agent.can_handle("Which tables are in this base"));
        assert!(!agent.can_handle("find tasks in the projects table"));
    }

    #[tokio::test]
    async fn lists_tables_in_store_order() {
        let store = Arc::new(InMemoryTabularStore::new());
        store.add_table("tblTasks000000001", "Tasks");
        store.add_table("tblProjects000001", "Projects");
        let agent = ListTablesAgent::new(SchemaResolver::new(store));

        let reply = agent.process("list tables").await.expect("reply");

        assert_eq!(
            reply,
            "Here are the tables in your base:\n\
             1. Tasks (tblTasks000000001)\n\
             2. Projects (tblProjects000001)"
        );
    }

    #[tokio::test]
    async fn empty_base_gets_apology() {
        let agent =
            ListTablesAgent::new(SchemaResolver::new(Arc::new(InMemoryTabularStore::new())));
        assert_eq!(agent.process("list tables").await.expect("reply"), NO_TABLES_REPLY);
    }

    #[tokio::test]
    async fn unreachable_store_gets_apology_with_store_error() {
        let store = Arc::new(InMemoryTabularStore::new());
        store.add_table("tblTasks000000001", "Tasks");
        store.set_unavailable(Some("INVALID_PERMISSIONS_OR_MODEL_NOT_FOUND"));
        let agent = ListTablesAgent::new(SchemaResolver::new(store));

        let reply = agent.process("list tables").await.expect("reply");

        assert!(reply.starts_with("Sorry, I couldn't read the tables in your base: "));
        assert!(reply.contains("INVALID_PERMISSIONS_OR_MODEL_NOT_FOUND"));
        assert_ne!(reply, NO_TABLES_REPLY);
    }
}
