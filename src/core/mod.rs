//! Import engine: typed fields, column resolution and row batching

pub mod batch;
pub mod controller;
pub mod field;

pub use batch::{ExtractStats, RowBatch, RowBatches};
pub use controller::{default_definition, resolve_definition, BatchOptions, BcpController};
pub use field::{ColumnDefinition, Field, FieldKind, TextType, DEFAULT_VARCHAR_WIDTH};
