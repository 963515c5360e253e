//! Shared domain types, configuration, and error taxonomy for tablechat.

pub mod config;
pub mod domain;
pub mod errors;

pub use domain::intent::{Intent, IntentAction};
pub use domain::message::{ChatMessage, Message, Role};
pub use domain::parameters::{CreateParameters, QueryParameters, DEFAULT_MAX_RECORDS};
pub use domain::table::{FieldMap, Record, RecordPage, TableInfo, TABLE_ID_PREFIX};
pub use errors::{ApplicationError, InterfaceError};
