//! Airtable REST client.
//!
//! Table listing goes through the metadata API (`/meta/bases/{base}/tables`);
//! record reads and writes go through `/{base}/{table}`. Every call is bounded by
//! the configured timeout.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Response, Url};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use tablechat_core::config::AirtableConfig;
use tablechat_core::{FieldMap, QueryParameters, Record, RecordPage, TableInfo};

use crate::{StoreError, TabularStore};

const MAX_PAGE_SIZE: u32 = 100;

#[derive(Clone)]
pub struct AirtableClient {
    client: Client,
    api_url: Url,
    base_id: String,
    api_key: SecretString,
}

impl AirtableClient {
    pub fn new(config: &AirtableConfig) -> Result<Self, StoreError> {
        let client =
            Client::builder().timeout(Duration::from_secs(config.timeout_secs.max(1))).build()?;
        Self::with_client(client, &config.api_url, &config.base_id, config.api_key.clone())
    }

    pub fn with_client(
        client: Client,
        api_url: &str,
        base_id: &str,
        api_key: SecretString,
    ) -> Result<Self, StoreError> {
        let api_url = Url::parse(api_url.trim_end_matches('/'))
            .map_err(|error| StoreError::InvalidUrl(format!("{api_url}: {error}")))?;
        if api_url.cannot_be_a_base() {
            return Err(StoreError::InvalidUrl(api_url.to_string()));
        }

        Ok(Self { client, api_url, base_id: base_id.to_string(), api_key })
    }

    pub fn base_id(&self) -> &str {
        &self.base_id
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url, StoreError> {
        let mut url = self.api_url.clone();
        url.path_segments_mut()
            .map_err(|_| StoreError::InvalidUrl(self.api_url.to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn table_url(&self, table: &str) -> Result<Url, StoreError> {
        self.endpoint(&[self.base_id.as_str(), table])
    }
}

#[async_trait]
impl TabularStore for AirtableClient {
    async fn list_tables(&self) -> Result<Vec<TableInfo>, StoreError> {
        let url = self.endpoint(&["meta", "bases", self.base_id.as_str(), "tables"])?;
        debug!(event_name = "store.request", operation = "list_tables", url = %url);

        let response =
            self.client.get(url).bearer_auth(self.api_key.expose_secret()).send().await?;
        let payload: TablesResponse = decode(response).await?;

        Ok(payload.tables.into_iter().map(|table| TableInfo::new(table.id, table.name)).collect())
    }

    async fn find_page(
        &self,
        table: &str,
        params: &QueryParameters,
        offset: Option<String>,
    ) -> Result<RecordPage, StoreError> {
        let url = self.table_url(table)?;
        let query = list_query(params, offset.as_deref());
        debug!(
            event_name = "store.request",
            operation = "find_page",
            table,
            has_offset = offset.is_some(),
            filter = %params.filter_by_formula,
            max_records = params.max_records
        );

        let response = self
            .client
            .get(url)
            .query(&query)
            .bearer_auth(self.api_key.expose_secret())
            .send()
            .await?;
        let payload: ListRecordsResponse = decode(response).await?;

        Ok(RecordPage {
            records: payload.records.into_iter().map(AirtableRecord::into_record).collect(),
            offset: payload.offset,
        })
    }

    async fn create_record(&self, table: &str, fields: FieldMap) -> Result<Record, StoreError> {
        let url = self.table_url(table)?;
        debug!(
            event_name = "store.request",
            operation = "create_record",
            table,
            field_count = fields.len()
        );

        let response = self
            .client
            .post(url)
            .bearer_auth(self.api_key.expose_secret())
            .json(&CreateRecordRequest { fields, typecast: true })
            .send()
            .await?;
        let payload: AirtableRecord = decode(response).await?;

        Ok(payload.into_record())
    }
}

fn list_query(params: &QueryParameters, offset: Option<&str>) -> Vec<(&'static str, String)> {
    let mut query = Vec::new();
    if !params.filter_by_formula.trim().is_empty() {
        query.push(("filterByFormula", params.filter_by_formula.clone()));
    }
    query.push(("maxRecords", params.max_records.to_string()));
    query.push(("pageSize", params.max_records.clamp(1, MAX_PAGE_SIZE).to_string()));
    for field in &params.fields {
        query.push(("fields[]", field.clone()));
    }
    if let Some(offset) = offset {
        query.push(("offset", offset.to_string()));
    }
    query
}

async fn decode<T>(response: Response) -> Result<T, StoreError>
where
    T: for<'de> Deserialize<'de>,
{
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        let message = error_message(&body);
        warn!(event_name = "store.response.error", status = status.as_u16(), message = %message);
        return Err(StoreError::Status { status: status.as_u16(), message });
    }

    response.json::<T>().await.map_err(|error| StoreError::Decode(error.to_string()))
}

/// Airtable reports errors either as `{"error": {"type", "message"}}` or `{"error": "TYPE"}`.
fn error_message(body: &str) -> String {
    let Ok(payload) = serde_json::from_str::<Value>(body) else {
        return body.trim().to_string();
    };

    match payload.get("error") {
        Some(Value::Object(error)) => {
            let kind = error.get("type").and_then(Value::as_str).unwrap_or("UNKNOWN");
            match error.get("message").and_then(Value::as_str) {
                Some(message) => format!("{kind}: {message}"),
                None => kind.to_string(),
            }
        }
        Some(Value::String(kind)) => kind.clone(),
        _ => body.trim().to_string(),
    }
}

#[derive(Debug, Deserialize)]
struct TablesResponse {
    tables: Vec<AirtableTable>,
}

#[derive(Debug, Deserialize)]
struct AirtableTable {
    id: String,
    name: String,
}

#[derive(Debug, Deserialize)]
struct ListRecordsResponse {
    #[serde(default)]
    records: Vec<AirtableRecord>,
    offset: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AirtableRecord {
    id: String,
    #[serde(default)]
    fields: FieldMap,
}

impl AirtableRecord {
    fn into_record(self) -> Record {
        Record { id: self.id, fields: self.fields }
    }
}

#[derive(Debug, Serialize)]
struct CreateRecordRequest {
    fields: FieldMap,
    typecast: bool,
}
