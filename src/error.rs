use std::path::PathBuf;
use thiserror::Error;

pub type BcpResult<T> = Result<T, BcpError>;

#[derive(Error, Debug)]
pub enum BcpError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Excel read error: {0}")]
    Excel(String),

    #[error("Excel write error: {0}")]
    Xlsx(#[from] rust_xlsxwriter::XlsxError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid format token '{token}': {reason}")]
    FormatSyntax { token: String, reason: String },

    #[error("ColIx {column_index}, Name: {name}, Def: {definition} is not a valid SQL type definition")]
    InvalidDefinition {
        column_index: usize,
        name: String,
        definition: String,
    },

    #[error("ColIx {column_index}, Name: {name}, Def: {definition}, datatype: {token} is not supported")]
    UnsupportedType {
        column_index: usize,
        name: String,
        definition: String,
        token: String,
    },

    #[error("Row {row}, column {column}: {reason}")]
    RowExtraction {
        row: usize,
        column: usize,
        reason: String,
    },

    #[error("Bulk load of {rows} rows failed: {source}")]
    BatchTransport {
        rows: usize,
        #[source]
        source: rusqlite::Error,
    },

    #[error("NOT SUPPORTED: Table: {table}, ColIx: {position}, ColName: {name}, Datatype: {data_type}")]
    UnsupportedColumn {
        table: String,
        position: usize,
        name: String,
        data_type: String,
    },

    #[error("Table {table}, column {column}: {reason}")]
    CellConversion {
        table: String,
        column: String,
        reason: String,
    },

    #[error("Sheet number {0} does not exist")]
    SheetNotFound(usize),

    #[error("File: {} does not exist", .0.display())]
    FileNotFound(PathBuf),

    #[error("File: {} already exist", .0.display())]
    FileExists(PathBuf),

    #[error("Invalid option: {0}")]
    InvalidOption(String),
}

impl From<calamine::XlsxError> for BcpError {
    fn from(e: calamine::XlsxError) -> Self {
        BcpError::Excel(format!("{}\nProbably open in Excel", e))
    }
}
