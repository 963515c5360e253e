//! Natural-language access to a tabular store.
//!
//! A [`Dispatcher`] hands the latest user message to the first agent whose
//! keyword test accepts it:
//! 1. **List tables** (`agents::list_tables`) - answers from the store alone
//! 2. **Query** (`agents::query`) - model writes a filter, store fetches, model summarises
//! 3. **Create** (`agents::create`) - model writes field values, store inserts
//!
//! The language model only translates between prose and store parameters. Record
//! contents always come from the store.

pub mod agents;
pub mod dispatcher;
pub mod extraction;
pub mod gateway;
pub mod llm;
pub mod locator;

pub use agents::{Agent, AgentDescriptor, AgentError};
pub use dispatcher::{default_dispatcher, DispatchContext, DispatchError, Dispatcher};
pub use gateway::CompletionGateway;
pub use llm::{build_client, CompletionRequest, LlmClient, LlmError};
pub use locator::{locate_table, TableLocator, TargetTable};
