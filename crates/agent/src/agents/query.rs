use std::sync::Arc;

use async_trait::async_trait;
use tracing::{info, warn};

use tablechat_store::{fetch_all, TabularStore};

use super::{mentions_any, Agent, AgentError};
use crate::extraction::extract_query_parameters;
use crate::gateway::CompletionGateway;
use crate::locator::TableLocator;

pub const QUERY_KEYWORDS: &[&str] = &[
    "find",
    "search",
    "show",
    "get",
    "list",
    "what",
    "who",
    "which",
    "give",
    "tell me",
    "details",
    "more information",
    "info on",
    "about",
    "describe",
];

/// Narrower keyword set that leaves conversational phrasings unclaimed.
pub const BASIC_QUERY_KEYWORDS: &[&str] = &["find", "search", "show", "get", "list", "query"];

const PARAMETERS_SYSTEM_PROMPT: &str = r#"You translate questions about an Airtable table
into list-records parameters.
Reply with a single JSON object and no other text. It has three keys:
- "fields": array of field names to return; empty to return every field
- "filterByFormula": an Airtable formula selecting the matching records;
  empty string for no filter
- "maxRecords": positive integer upper bound on the number of records

Examples:
Request: Show me all tasks that are done
{"fields": [], "filterByFormula": "{Status} = 'Done'", "maxRecords": 10}

Request: Give me details on the Website Redesign project
{"fields": [], "filterByFormula": "SEARCH('Website Redesign', {Name})", "maxRecords": 1}

Request: Who owns the five most recent high priority items?
{"fields": ["Name", "Owner"], "filterByFormula": "{Priority} = 'High'", "maxRecords": 5}

Request: List everything
{"fields": [], "filterByFormula": "", "maxRecords": 10}"#;

const SUMMARY_SYSTEM_PROMPT: &str = "You answer questions using records fetched from an \
Airtable table. Only use the records provided. Refer to records by their name where they \
have one. Keep the answer short and readable; use a list when there are several records.";

pub struct QueryAgent {
    gateway: CompletionGateway,
    store: Arc<dyn TabularStore>,
    locator: TableLocator,
    keywords: &'static [&'static str],
}

impl QueryAgent {
    pub fn new(
        gateway: CompletionGateway,
        store: Arc<dyn TabularStore>,
        locator: TableLocator,
    ) -> Self {
        Self { gateway, store, locator, keywords: QUERY_KEYWORDS }
    }

    pub fn with_keywords(mut self, keywords: &'static [&'static str]) -> Self {
        self.keywords = keywords;
        self
    }
}

#[async_trait]
impl Agent for QueryAgent {
    fn name(&self) -> &'static str {
        "query"
    }

    fn description(&self) -> &'static str {
        "Finds records matching a natural-language question and summarises them."
    }

    fn can_handle(&self, text: &str) -> bool {
        mentions_any(text, self.keywords)
    }

    async fn process(&self, text: &str) -> Result<String, AgentError> {
        let target = self.locator.resolve_target(text).await;

        let prompt = format!("Table: {}\nRequest: {}", target.label, text);
        let raw = self.gateway.complete(&prompt, Some(PARAMETERS_SYSTEM_PROMPT)).await?;
        let params = extract_query_parameters(&raw);

        let records = match fetch_all(self.store.as_ref(), &target.name, &params).await {
            Ok(records) => records,
            Err(error) => {
                warn!(
                    event_name = "agent.query.store_failed",
                    table = %target.name,
                    error = %error
                );
                return Ok(format!(
                    "Sorry, I couldn't read records from the {} table: {error}",
                    target.label
                ));
            }
        };
        info!(
            event_name = "agent.query.records_fetched",
            table = %target.name,
            filter = %params.filter_by_formula,
            max_records = params.max_records,
            record_count = records.len()
        );

        if records.is_empty() {
            return Ok(format!(
                "I couldn't find any records in the {} table matching your request.",
                target.label
            ));
        }

        let serialized =
            serde_json::to_string_pretty(&records).unwrap_or_else(|_| "[]".to_string());
        let prompt = format!(
            "Question: {text}\n\nRecords from the {} table (JSON):\n{serialized}",
            target.label
        );
        Ok(self.gateway.complete(&prompt, Some(SUMMARY_SYSTEM_PROMPT)).await?)
    }
}
