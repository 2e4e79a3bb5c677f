//! `jira-dump` flattens Jira issues and their related records into tabular rows.
//! Columns are declared as key paths into the raw REST payload.

/// Runtime configuration loading and validation.
pub mod config;
/// Session orchestration over the cached search results.
pub mod dump;
/// CSV writers for row streams.
pub mod export;
/// Row extraction from raw records.
pub mod extract;
/// Jira REST client.
pub mod jira;
/// Logging helpers used throughout the crate.
pub mod logging;
/// Runtime metrics counters.
pub mod metrics;
/// Offset-based search pagination and the issue source seam.
pub mod paginate;
/// Field paths and nested lookup.
pub mod path;
/// Declared schemas and their discovery.
pub mod profile;
/// Progress reporting for long-running views.
pub mod progress;
/// Column schemas and request negotiation.
pub mod schema;

pub use dump::{DumpError, DumpSession, Dumper};
pub use extract::OutputRow;
pub use path::FieldPath;
pub use profile::DumpProfile;
pub use schema::FieldSchema;
