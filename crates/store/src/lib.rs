//! Tabular store access: the store trait, the Airtable REST client, an in-memory
//! store for tests and demos, and the schema resolver.

use async_trait::async_trait;
use thiserror::Error;
use tracing::debug;

use tablechat_core::{FieldMap, QueryParameters, Record, RecordPage, TableInfo};

pub mod airtable;
pub mod memory;
pub mod schema;

pub use airtable::AirtableClient;
pub use memory::InMemoryTabularStore;
pub use schema::{display_name_in, is_table_id, SchemaResolver};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("tabular store request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("tabular store returned {status}: {message}")]
    Status { status: u16, message: String },
    #[error("could not decode tabular store response: {0}")]
    Decode(String),
    #[error("unknown table `{0}`")]
    UnknownTable(String),
    #[error("invalid tabular store url: {0}")]
    InvalidUrl(String),
}

#[async_trait]
pub trait TabularStore: Send + Sync {
    async fn list_tables(&self) -> Result<Vec<TableInfo>, StoreError>;

    /// Fetches one page. `offset` is the continuation token from the previous page.
    async fn find_page(
        &self,
        table: &str,
        params: &QueryParameters,
        offset: Option<String>,
    ) -> Result<RecordPage, StoreError>;

    async fn create_record(&self, table: &str, fields: FieldMap) -> Result<Record, StoreError>;
}

/// Drains pages until the store stops handing out an offset or `max_records` is reached.
pub async fn fetch_all<S>(
    store: &S,
    table: &str,
    params: &QueryParameters,
) -> Result<Vec<Record>, StoreError>
where
    S: TabularStore + ?Sized,
{
    let limit = params.max_records as usize;
    let mut records = Vec::new();
    let mut offset = None;
    let mut pages = 0_u32;

    loop {
        let page = store.find_page(table, params, offset.take()).await?;
        pages += 1;
        records.extend(page.records);

        if records.len() >= limit {
            records.truncate(limit);
            break;
        }
        match page.offset {
            Some(next) => offset = Some(next),
            None => break,
        }
    }

    debug!(
        event_name = "store.fetch_all.completed",
        table,
        pages,
        record_count = records.len(),
        "paginated fetch completed"
    );
    Ok(records)
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use tablechat_core::{FieldMap, QueryParameters};

    use crate::{fetch_all, InMemoryTabularStore};

    fn fields(name: &str) -> FieldMap {
        let mut map = FieldMap::new();
        map.insert("Name".to_string(), json!(name));
        map
    }

    fn seeded_store(page_size: usize, rows: usize) -> InMemoryTabularStore {
        let store = InMemoryTabularStore::with_page_size(page_size);
        store.add_table("tblTasks0000001", "Tasks");
        for index in 0..rows {
            store.seed_record("Tasks", fields(&format!("task {index}")));
        }
        store
    }

    #[tokio::test]
    async fn fetch_all_accumulates_pages_until_exhausted() {
        let store = seeded_store(2, 5);
        let params = QueryParameters { max_records: 50, ..QueryParameters::default() };

        let records = fetch_all(&store, "Tasks", &params).await.expect("fetch should succeed");

        assert_eq!(records.len(), 5);
        assert_eq!(store.page_requests(), 3);
    }

    #[tokio::test]
    async fn fetch_all_stops_at_max_records() {
        let store = seeded_store(2, 9);
        let params = QueryParameters { max_records: 3, ..QueryParameters::default() };

        let records = fetch_all(&store, "Tasks", &params).await.expect("fetch should succeed");

        assert_eq!(records.len(), 3);
        assert_eq!(store.page_requests(), 2);
        assert_eq!(records[2].fields["Name"], json!("task 2"));
    }

    #[tokio::test]
    async fn fetch_all_surfaces_unknown_table() {
        let store = seeded_store(2, 1);

        let error = fetch_all(&store, "Missing", &QueryParameters::default())
            .await
            .expect_err("unknown table should fail");

        assert!(error.to_string().contains("Missing"));
    }
}
