use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Field-name to value mapping as accepted by the tabular store.
pub type FieldMap = Map<String, Value>;

/// Prefix the store uses for table identifiers (`tblXXXXXXXXXXXXXX`).
pub const TABLE_ID_PREFIX: &str = "tbl";

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableInfo {
    pub id: String,
    pub name: String,
}

impl TableInfo {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self { id: id.into(), name: name.into() }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub id: String,
    #[serde(default)]
    pub fields: FieldMap,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct RecordPage {
    pub records: Vec<Record>,
    /// Continuation token; `None` once the last page has been returned.
    pub offset: Option<String>,
}
