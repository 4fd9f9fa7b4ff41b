//! bcp-excel - bulk copy between Excel workbooks and SQL tables
//!
//! Import reads one sheet, resolves a typed definition for every named
//! column and loads the rows in batches. Export runs a query and writes each
//! of its result sets as a worksheet.
//!
//! # Column definitions
//!
//! A column's type comes from the first of:
//!
//! - a `DEF` row in the sheet, marked in a `_CONTROL` column
//! - a format directive such as `i,s20,u30`
//! - the default `varchar(512) null`
//!
//! # Example
//!
//! ```no_run
//! use bcp_excel::cli::{run_import, ImportOptions};
//!
//! let mut opts = ImportOptions::new("people.xlsx", "people.db", "people");
//! opts.format = Some("i,s40".to_string());
//! opts.batch_size = 500;
//!
//! let summary = run_import(&opts)?;
//! println!("Loaded {} rows", summary.rows_loaded);
//! # Ok::<(), bcp_excel::error::BcpError>(())
//! ```

pub mod cli;
pub mod core;
pub mod db;
pub mod error;
pub mod excel;
pub mod logging;
pub mod parser;
pub mod types;

// Re-export commonly used types
pub use error::{BcpError, BcpResult};
pub use types::{ColumnTypeHint, DbValue, HintKind, SourceColumn, SqlValue};
