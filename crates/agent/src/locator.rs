//! Picks the table a message is about.
//!
//! A table is mentioned when the lowercased message contains one of the phrases
//! below with the table's lowercased display name substituted in. Tables are
//! tried in the order the store lists them, so the first listed match wins.

use tracing::{debug, warn};

use tablechat_core::TableInfo;
use tablechat_store::{display_name_in, is_table_id, SchemaResolver};

const MENTION_TEMPLATES: [&str; 8] = [
    "in the {name} table",
    "from the {name} table",
    "in {name} table",
    "from {name} table",
    "in the {name}",
    "from the {name}",
    "in {name}",
    "from {name}",
];

pub fn locate_table<'a>(message: &str, tables: &'a [TableInfo]) -> Option<&'a TableInfo> {
    let message = message.to_lowercase();
    tables.iter().find(|table| {
        let name = table.name.to_lowercase();
        !name.is_empty()
            && MENTION_TEMPLATES
                .iter()
                .any(|template| message.contains(&template.replace("{name}", &name)))
    })
}

/// Where a request should be sent and how to refer to it in replies.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TargetTable {
    pub name: String,
    pub label: String,
}

#[derive(Clone)]
pub struct TableLocator {
    resolver: SchemaResolver,
    default_table: String,
}

impl TableLocator {
    pub fn new(resolver: SchemaResolver, default_table: impl Into<String>) -> Self {
        Self { resolver, default_table: default_table.into() }
    }

    pub fn default_table(&self) -> &str {
        &self.default_table
    }

    /// Falls back to the default table when nothing is mentioned or the listing fails.
    pub async fn resolve_target(&self, message: &str) -> TargetTable {
        let tables = match self.resolver.tables().await {
            Ok(tables) => tables,
            Err(error) => {
                warn!(
                    event_name = "locator.tables_unavailable",
                    error = %error,
                    default_table = %self.default_table,
                    "using default table"
                );
                Vec::new()
            }
        };

        if let Some(table) = locate_table(message, &tables) {
            debug!(event_name = "locator.matched", table = %table.name, table_id = %table.id);
            return TargetTable { name: table.name.clone(), label: table.name.clone() };
        }

        let label = if is_table_id(&self.default_table) {
            display_name_in(&self.default_table, &tables).unwrap_or(&self.default_table).to_string()
        } else {
            self.default_table.clone()
        };
        debug!(event_name = "locator.defaulted", table = %self.default_table);
        TargetTable { name: self.default_table.clone(), label }
    }
}
