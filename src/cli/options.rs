//! Run options for the import and export commands

use crate::error::{BcpError, BcpResult};
use serde::Serialize;
use std::path::PathBuf;

pub const DEFAULT_BATCH_SIZE: usize = 1000;

/// Split `<database>..<table>` at the first `..` that is not part of a
/// relative path
pub fn parse_db_table(value: &str) -> BcpResult<(PathBuf, String)> {
    let split = value.match_indices("..").find(|(i, _)| {
        !matches!(value[i + 2..].chars().next(), Some('/') | Some('\\') | None)
    });
    let Some((i, _)) = split else {
        return Err(BcpError::InvalidOption(
            "Argument must be [database]..[tablename]".to_string(),
        ));
    };
    let database = value[..i].trim();
    let table = value[i + 2..].trim();
    if database.is_empty() {
        return Err(BcpError::InvalidOption("Missing database".to_string()));
    }
    if table.is_empty() {
        return Err(BcpError::InvalidOption("Missing table name".to_string()));
    }
    Ok((PathBuf::from(database), table.to_string()))
}

fn check_action(action: &str) -> BcpResult<()> {
    if action != "into" {
        return Err(BcpError::InvalidOption(
            "Only 'into' action allowed".to_string(),
        ));
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImportOptions {
    pub filename: PathBuf,
    pub database: PathBuf,
    pub table: String,
    pub format: Option<String>,
    /// 1-based sheet line
    pub first_row: Option<usize>,
    /// 1-based sheet line, inclusive
    pub last_row: Option<usize>,
    pub batch_size: usize,
    /// Failed batches tolerated before the run stops
    pub max_errors: Option<usize>,
    pub col_width: Option<u32>,
    /// 1-based sheet number
    pub sheet: usize,
    pub force_create: bool,
    pub truncate: bool,
}

impl ImportOptions {
    pub fn new(filename: impl Into<PathBuf>, database: impl Into<PathBuf>, table: &str) -> Self {
        Self {
            filename: filename.into(),
            database: database.into(),
            table: table.to_string(),
            format: None,
            first_row: None,
            last_row: None,
            batch_size: DEFAULT_BATCH_SIZE,
            max_errors: None,
            col_width: None,
            sheet: 1,
            force_create: false,
            truncate: false,
        }
    }

    /// Build from the positional `<file> into <database>..<table>` arguments
    pub fn from_args(filename: PathBuf, action: &str, target: &str) -> BcpResult<Self> {
        check_action(action)?;
        let (database, table) = parse_db_table(target)?;
        Ok(Self::new(filename, database, &table))
    }

    /// Checks that must pass before any workbook or database is touched
    pub fn validate(&self) -> BcpResult<()> {
        if self.filename.as_os_str().is_empty() {
            return Err(BcpError::InvalidOption("Missing filename".to_string()));
        }
        if self.table.trim().is_empty() {
            return Err(BcpError::InvalidOption("Missing table name".to_string()));
        }
        if self.batch_size == 0 {
            return Err(BcpError::InvalidOption(
                "batch size must be a positive number".to_string(),
            ));
        }
        if self.sheet == 0 {
            return Err(BcpError::InvalidOption(
                "sheet numbers count from 1".to_string(),
            ));
        }
        if let (Some(first), Some(last)) = (self.first_row, self.last_row) {
            if first > last {
                return Err(BcpError::InvalidOption(format!(
                    "first row {} is after last row {}",
                    first, last
                )));
            }
        }
        if !self.filename.exists() {
            return Err(BcpError::FileNotFound(self.filename.clone()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExportOptions {
    pub database: PathBuf,
    /// Table name, or `SQL:<query>`, or `FILE:<path>`
    pub table: String,
    pub filename: PathBuf,
    pub force: bool,
    /// Metadata and hidden tables become sheets from level 3
    pub debug_level: u8,
}

impl ExportOptions {
    pub fn new(database: impl Into<PathBuf>, table: &str, filename: impl Into<PathBuf>) -> Self {
        Self {
            database: database.into(),
            table: table.to_string(),
            filename: filename.into(),
            force: false,
            debug_level: 0,
        }
    }

    /// Build from the positional `<database>..<table> into <file>` arguments
    pub fn from_args(target: &str, action: &str, filename: PathBuf) -> BcpResult<Self> {
        check_action(action)?;
        let (database, table) = parse_db_table(target)?;
        Ok(Self::new(database, &table, filename))
    }

    pub fn validate(&self) -> BcpResult<()> {
        if self.filename.as_os_str().is_empty() {
            return Err(BcpError::InvalidOption("Missing filename".to_string()));
        }
        if self.table.trim().is_empty() {
            return Err(BcpError::InvalidOption("Missing table name".to_string()));
        }
        if !self.database.exists() {
            return Err(BcpError::FileNotFound(self.database.clone()));
        }
        Ok(())
    }
}
