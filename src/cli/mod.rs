//! CLI command handlers

pub mod commands;
pub mod options;

pub use commands::{export, import, query_text, run_export, run_import, ExportSummary, ImportSummary};
pub use options::{parse_db_table, ExportOptions, ImportOptions, DEFAULT_BATCH_SIZE};
