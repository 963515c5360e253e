use std::collections::BTreeSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;

use tablechat_core::{FieldMap, QueryParameters, Record, RecordPage, TableInfo};

use crate::{StoreError, TabularStore};

const DEFAULT_PAGE_SIZE: usize = 100;

struct MemoryTable {
    info: TableInfo,
    known_fields: Option<BTreeSet<String>>,
    records: Vec<Record>,
}

#[derive(Default)]
struct MemoryState {
    tables: Vec<MemoryTable>,
    next_record: usize,
    unavailable: Option<String>,
}

/// Store held entirely in process memory.
///
/// Filter formulas are not evaluated; every record in the table matches. Field
/// selection, `maxRecords`, and offset pagination behave like the remote API.
pub struct InMemoryTabularStore {
    state: Mutex<MemoryState>,
    page_size: usize,
    list_requests: AtomicUsize,
    page_requests: AtomicUsize,
    create_requests: AtomicUsize,
}

impl Default for InMemoryTabularStore {
    fn default() -> Self {
        Self::with_page_size(DEFAULT_PAGE_SIZE)
    }
}

impl InMemoryTabularStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_page_size(page_size: usize) -> Self {
        Self {
            state: Mutex::new(MemoryState::default()),
            page_size: page_size.max(1),
            list_requests: AtomicUsize::new(0),
            page_requests: AtomicUsize::new(0),
            create_requests: AtomicUsize::new(0),
        }
    }

    pub fn add_table(&self, id: &str, name: &str) {
        self.lock().tables.push(MemoryTable {
            info: TableInfo::new(id, name),
            known_fields: None,
            records: Vec::new(),
        });
    }

    /// Like [`add_table`](Self::add_table) but rejects writes to fields outside `fields`.
    pub fn add_table_with_fields(&self, id: &str, name: &str, fields: &[&str]) {
        self.lock().tables.push(MemoryTable {
            info: TableInfo::new(id, name),
            known_fields: Some(fields.iter().map(|field| field.to_string()).collect()),
            records: Vec::new(),
        });
    }

    pub fn seed_record(&self, table: &str, fields: FieldMap) -> Option<String> {
        let mut state = self.lock();
        let id = next_record_id(&mut state);
        let target = state.tables.iter_mut().find(|candidate| matches_table(candidate, table))?;
        target.records.push(Record { id: id.clone(), fields });
        Some(id)
    }

    /// Every subsequent call fails with a 503 carrying `message` until cleared with `None`.
    pub fn set_unavailable(&self, message: Option<&str>) {
        self.lock().unavailable = message.map(str::to_string);
    }

    pub fn records(&self, table: &str) -> Vec<Record> {
        self.lock()
            .tables
            .iter()
            .find(|candidate| matches_table(candidate, table))
            .map(|candidate| candidate.records.clone())
            .unwrap_or_default()
    }

    pub fn list_requests(&self) -> usize {
        self.list_requests.load(Ordering::SeqCst)
    }

    pub fn page_requests(&self) -> usize {
        self.page_requests.load(Ordering::SeqCst)
    }

    pub fn create_requests(&self) -> usize {
        self.create_requests.load(Ordering::SeqCst)
    }

    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl TabularStore for InMemoryTabularStore {
    async fn list_tables(&self) -> Result<Vec<TableInfo>, StoreError> {
        self.list_requests.fetch_add(1, Ordering::SeqCst);
        let state = self.lock();
        check_available(&state)?;
        Ok(state.tables.iter().map(|table| table.info.clone()).collect())
    }

    async fn find_page(
        &self,
        table: &str,
        params: &QueryParameters,
        offset: Option<String>,
    ) -> Result<RecordPage, StoreError> {
        self.page_requests.fetch_add(1, Ordering::SeqCst);
        let state = self.lock();
        check_available(&state)?;

        let target = state
            .tables
            .iter()
            .find(|candidate| matches_table(candidate, table))
            .ok_or_else(|| StoreError::UnknownTable(table.to_string()))?;

        let start = match offset {
            Some(raw) => raw.parse::<usize>().map_err(|_| StoreError::Status {
                status: 422,
                message: format!("invalid offset `{raw}`"),
            })?,
            None => 0,
        };
        let limit = (params.max_records as usize).min(target.records.len());
        let end = (start + self.page_size).min(limit);

        let records = target
            .records
            .get(start..end)
            .unwrap_or_default()
            .iter()
            .map(|record| project(record, &params.fields))
            .collect();
        let offset = (end < limit).then(|| end.to_string());

        Ok(RecordPage { records, offset })
    }

    async fn create_record(&self, table: &str, fields: FieldMap) -> Result<Record, StoreError> {
        self.create_requests.fetch_add(1, Ordering::SeqCst);
        let mut state = self.lock();
        check_available(&state)?;

        let id = next_record_id(&mut state);
        let target = state
            .tables
            .iter_mut()
            .find(|candidate| matches_table(candidate, table))
            .ok_or_else(|| StoreError::UnknownTable(table.to_string()))?;

        if let Some(known_fields) = &target.known_fields {
            if let Some(unknown) = fields.keys().find(|name| !known_fields.contains(*name)) {
                return Err(StoreError::Status {
                    status: 422,
                    message: format!("Unknown field name: \"{unknown}\""),
                });
            }
        }

        let record = Record { id, fields };
        target.records.push(record.clone());
        Ok(record)
    }
}

fn matches_table(candidate: &MemoryTable, table: &str) -> bool {
    candidate.info.name == table || candidate.info.id == table
}

fn next_record_id(state: &mut MemoryState) -> String {
    state.next_record += 1;
    format!("rec{:014}", state.next_record)
}

fn check_available(state: &MemoryState) -> Result<(), StoreError> {
    match &state.unavailable {
        Some(message) => Err(StoreError::Status { status: 503, message: message.clone() }),
        None => Ok(()),
    }
}

fn project(record: &Record, fields: &[String]) -> Record {
    if fields.is_empty() {
        return record.clone();
    }

    let projected = record
        .fields
        .iter()
        .filter(|(name, _)| fields.iter().any(|wanted| wanted == *name))
        .map(|(name, value)| (name.clone(), value.clone()))
        .collect();
    Record { id: record.id.clone(), fields: projected }
}
