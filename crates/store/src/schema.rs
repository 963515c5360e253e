use std::sync::Arc;

use tablechat_core::{TableInfo, TABLE_ID_PREFIX};

use crate::{StoreError, TabularStore};

/// Maps between table display names and identifiers.
///
/// Nothing is cached: every lookup refetches the table list from the store.
#[derive(Clone)]
pub struct SchemaResolver {
    store: Arc<dyn TabularStore>,
}

impl SchemaResolver {
    pub fn new(store: Arc<dyn TabularStore>) -> Self {
        Self { store }
    }

    pub async fn tables(&self) -> Result<Vec<TableInfo>, StoreError> {
        self.store.list_tables().await
    }

    /// Display name for an identifier-looking string; other input is returned unchanged.
    pub async fn display_name(&self, identifier: &str) -> Result<String, StoreError> {
        if !is_table_id(identifier) {
            return Ok(identifier.to_string());
        }

        let tables = self.tables().await?;
        Ok(display_name_in(identifier, &tables).unwrap_or(identifier).to_string())
    }

    /// Identifier for a display name (case-insensitive); identifiers pass through.
    pub async fn table_id(&self, name: &str) -> Result<Option<String>, StoreError> {
        if is_table_id(name) {
            return Ok(Some(name.to_string()));
        }

        let tables = self.tables().await?;
        Ok(tables
            .into_iter()
            .find(|table| table.name.eq_ignore_ascii_case(name))
            .map(|table| table.id))
    }
}

/// `tbl` followed by at least one ASCII alphanumeric and nothing else.
pub fn is_table_id(candidate: &str) -> bool {
    candidate
        .strip_prefix(TABLE_ID_PREFIX)
        .is_some_and(|rest| !rest.is_empty() && rest.chars().all(|ch| ch.is_ascii_alphanumeric()))
}

pub fn display_name_in<'a>(identifier: &str, tables: &'a [TableInfo]) -> Option<&'a str> {
    tables.iter().find(|table| table.id == identifier).map(|table| table.name.as_str())
}
