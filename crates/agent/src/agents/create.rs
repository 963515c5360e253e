use std::sync::Arc;

use async_trait::async_trait;
use tracing::{info, warn};

use tablechat_core::CreateParameters;
use tablechat_store::TabularStore;

use super::{mentions_any, render_value, Agent, AgentError};
use crate::gateway::CompletionGateway;
use crate::locator::TableLocator;

const KEYWORDS: &[&str] = &["create", "add", "new", "insert", "make"];

const FIELDS_SYSTEM_PROMPT: &str = r#"You turn requests to add a record to an Airtable table
into field values.
Reply with a single JSON object and no other text, shaped like
{"fields": {"<Field name>": <value>}}.
Use the field names the user mentions.
Use strings for text, numbers for numbers, and true/false for checkboxes.

Examples:
Request: Create a task called Write report with status Todo
{"fields": {"Name": "Write report", "Status": "Todo"}}

Request: Add a new project named Website Redesign owned by Dana with budget 12000
{"fields": {"Name": "Website Redesign", "Owner": "Dana", "Budget": 12000}}"#;

pub const UNPARSEABLE_FIELDS_REPLY: &str = "Sorry, I couldn't work out which field values to use. \
Try naming each field and its value, for example: \
create a task with Name \"Write report\" and Status \"Todo\".";

/// Writes one record from the model's `{"fields": {...}}` reply.
///
/// The reply must parse as-is; otherwise the user gets an apology carrying the parse
/// error. An empty field map is still written, as an empty record.
pub struct CreateAgent {
    gateway: CompletionGateway,
    store: Arc<dyn TabularStore>,
    locator: TableLocator,
}

impl CreateAgent {
    pub fn new(
        gateway: CompletionGateway,
        store: Arc<dyn TabularStore>,
        locator: TableLocator,
    ) -> Self {
        Self { gateway, store, locator }
    }
}

#[async_trait]
impl Agent for CreateAgent {
    fn name(&self) -> &'static str {
        "create"
    }

    fn description(&self) -> &'static str {
        "Creates a record from a natural-language description of its fields."
    }

    fn can_handle(&self, text: &str) -> bool {
        mentions_any(text, KEYWORDS)
    }

    async fn process(&self, text: &str) -> Result<String, AgentError> {
        let target = self.locator.resolve_target(text).await;

        let prompt = format!("Table: {}\nRequest: {}", target.label, text);
        let raw = self.gateway.complete(&prompt, Some(FIELDS_SYSTEM_PROMPT)).await?;

        // No brace-span recovery here.
        let params = match serde_json::from_str::<CreateParameters>(&raw) {
            Ok(params) => params,
            Err(error) => {
                warn!(event_name = "agent.create.unparseable_fields", error = %error);
                return Ok(format!("{UNPARSEABLE_FIELDS_REPLY} ({error})"));
            }
        };

        let record = match self.store.create_record(&target.name, params.fields).await {
            Ok(record) => record,
            Err(error) => {
                warn!(
                    event_name = "agent.create.store_failed",
                    table = %target.name,
                    error = %error
                );
                return Ok(format!(
                    "Sorry, I couldn't create the record in the {} table: {error}",
                    target.label
                ));
            }
        };
        info!(
            event_name = "agent.create.record_created",
            table = %target.name,
            record_id = %record.id
        );

        let mut reply = format!("Record created in {} with id {}.", target.label, record.id);
        for (field, value) in &record.fields {
            reply.push_str(&format!("\n- {field}: {}", render_value(value)));
        }
        Ok(reply)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serde_json::json;
    use tablechat_store::{InMemoryTabularStore, SchemaResolver};

    use super::{CreateAgent, UNPARSEABLE_FIELDS_REPLY};
    use crate::agents::Agent;
    use crate::gateway::CompletionGateway;
    use crate::llm::ScriptedLlmClient;
    use crate::locator::TableLocator;

    fn agent(store: Arc<InMemoryTabularStore>, llm: Arc<ScriptedLlmClient>) -> CreateAgent {
        let locator = TableLocator::new(SchemaResolver::new(store.clone()), "Tasks");
        CreateAgent::new(CompletionGateway::new(llm, 0.0, 512), store, locator)
    }

    fn tasks_store() -> Arc<InMemoryTabularStore> {
        let store = Arc::new(InMemoryTabularStore::new());
        store.add_table_with_fields("tblTasks000000001", "Tasks", &["Name", "Status", "Estimate"]);
        store
    }

    #[test]
    fn claims_creation_phrasings() {
        let agent = agent(tasks_store(), Arc::new(ScriptedLlmClient::default()));
        assert!(agent.can_handle("Add a task to water the plants"));
        assert!(agent.can_handle("INSERT a row"));
        assert!(!agent.can_handle("find overdue tasks"));
    }

    #[tokio::test]
    async fn creates_record_and_confirms_fields() {
        let store = tasks_store();
        let llm = Arc::new(ScriptedLlmClient::new([
            r#"{"fields": {"Name": "Water plants", "Status": "Todo", "Estimate": 2}}"#,
        ]));

        let reply = agent(store.clone(), llm)
            .process("create a task to water plants")
            .await
            .expect("reply");

        let records = store.records("Tasks");
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].fields["Name"], json!("Water plants"));
        assert!(reply.starts_with(&format!("Record created in Tasks with id {}.", records[0].id)));
        assert!(reply.contains("\n- Name: Water plants"));
        assert!(reply.contains("\n- Estimate: 2"));
    }

    #[tokio::test]
    async fn wrapped_output_is_not_written() {
        let store = tasks_store();
        let llm = Arc::new(ScriptedLlmClient::new([
            "Sure! Here you go: {\"fields\": {\"Name\": \"Water plants\"}}",
        ]));

        let reply =
            agent(store.clone(), llm).process("add a task to water plants").await.expect("reply");

        assert!(reply.starts_with(UNPARSEABLE_FIELDS_REPLY));
        assert!(reply.contains("expected value at line 1 column 1"));
        assert_eq!(store.create_requests(), 0);
    }

    #[tokio::test]
    async fn truncated_output_reports_parse_error() {
        let store = tasks_store();
        let llm = Arc::new(ScriptedLlmClient::new([r#"{"fields": {"Name": "#]));

        let reply = agent(store.clone(), llm).process("add a task").await.expect("reply");

        assert!(reply.starts_with(UNPARSEABLE_FIELDS_REPLY));
        assert!(reply.contains("EOF while parsing"));
        assert_eq!(store.create_requests(), 0);
    }

    #[tokio::test]
    async fn blank_output_is_an_apology_not_an_error() {
        let store = tasks_store();
        let llm = Arc::new(ScriptedLlmClient::new(["   "]));

        let reply = agent(store.clone(), llm).process("add a task").await.expect("reply");

        assert!(reply.starts_with(UNPARSEABLE_FIELDS_REPLY));
        assert!(reply.contains("EOF while parsing"));
        assert_eq!(store.create_requests(), 0);
    }

    #[tokio::test]
    async fn empty_field_set_creates_empty_record() {
        let store = tasks_store();
        let llm = Arc::new(ScriptedLlmClient::new([r#"{"fields": {}}"#]));

        let reply = agent(store.clone(), llm).process("add something").await.expect("reply");

        let records = store.records("Tasks");
        assert_eq!(records.len(), 1);
        assert!(records[0].fields.is_empty());
        assert_eq!(reply, format!("Record created in Tasks with id {}.", records[0].id));
    }

    #[tokio::test]
    async fn rejected_write_becomes_apology() {
        let store = tasks_store();
        let llm = Arc::new(ScriptedLlmClient::new([r#"{"fields": {"Colour": "red"}}"#]));

        let reply = agent(store.clone(), llm).process("add a red task").await.expect("reply");

        assert!(reply.starts_with("Sorry, I couldn't create the record in the Tasks table"));
        assert!(reply.contains("Unknown field name"));
        assert!(store.records("Tasks").is_empty());
    }
}
