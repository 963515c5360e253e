use serde::{Deserialize, Serialize};

use crate::domain::table::FieldMap;

pub const DEFAULT_MAX_RECORDS: u32 = 10;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryParameters {
    /// Empty means "all fields".
    pub fields: Vec<String>,
    /// Store formula; empty means "no filter".
    pub filter_by_formula: String,
    pub max_records: u32,
}

impl Default for QueryParameters {
    fn default() -> Self {
        Self {
            fields: Vec::new(),
            filter_by_formula: String::new(),
            max_records: DEFAULT_MAX_RECORDS,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct CreateParameters {
    pub fields: FieldMap,
}
