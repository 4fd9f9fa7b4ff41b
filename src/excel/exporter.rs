//! Excel exporter - relational result sets → Excel (.xlsx)
//!
//! Every result set of a query becomes one [`ExportTable`]. The first column
//! name decides what happens to it:
//!
//! - `__meta__` - a metadata table. Its values are fed back into the builder;
//!   a column called `name` sets the sheet name of the next visible table.
//! - `_anything` - a hidden table.
//! - otherwise - a visible table, always written as a sheet.
//!
//! Metadata and hidden tables are only written as sheets at debug level 3 and
//! above.

use crate::db::ResultSetHandler;
use crate::error::{BcpError, BcpResult};
use crate::types::{SourceColumn, SqlValue};
use rust_xlsxwriter::{Workbook, Worksheet};
use std::path::{Path, PathBuf};
use tracing::{debug, error, info};

/// First column name that marks a metadata result set
pub const META_MARKER: &str = "__meta__";

/// Debug level from which metadata and hidden tables become sheets
pub const SHOW_HIDDEN_LEVEL: u8 = 3;

const MAX_SHEET_NAME_LEN: usize = 31;

/// Cell type of an exported column
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportType {
    Text,
    Int32,
    Int16,
}

impl ExportType {
    /// Map a declared column type. Columns without a declared type (computed
    /// expressions) export as text; `None` means unsupported.
    pub fn from_declared(declared: Option<&str>) -> Option<Self> {
        let Some(declared) = declared else {
            return Some(ExportType::Text);
        };
        let lowered = declared.to_lowercase();
        let base = lowered.split('(').next().unwrap_or("").trim();
        match base {
            "" => Some(ExportType::Text),
            "int" | "integer" | "mediumint" => Some(ExportType::Int32),
            "smallint" => Some(ExportType::Int16),
            "text" | "varchar" | "nvarchar" | "char" | "nchar" | "clob" | "character"
            | "varying character" | "native character" | "ntext" => Some(ExportType::Text),
            _ => None,
        }
    }

    pub fn sql_name(&self) -> &'static str {
        match self {
            ExportType::Text => "TEXT",
            ExportType::Int32 | ExportType::Int16 => "INT",
        }
    }
}

/// One exported column
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportColumn {
    /// 1-based position in the result set and on the sheet
    pub column_index: usize,
    pub original_column_name: String,
    /// Unique (case-insensitive) within its table
    pub column_name: String,
    pub db_type: ExportType,
    pub allow_null: bool,
}

impl ExportColumn {
    fn new(source: &SourceColumn, column_index: usize) -> Option<Self> {
        let db_type = ExportType::from_declared(source.data_type.as_deref())?;
        Some(Self {
            column_index,
            original_column_name: source.base_name.clone(),
            column_name: source.base_name.clone(),
            db_type,
            allow_null: source.allow_null,
        })
    }

    fn sheet_column(&self) -> u16 {
        (self.column_index - 1) as u16
    }

    /// String projection of a value, for callbacks rather than cells
    pub fn value_as_string(&self, value: &SqlValue) -> String {
        match value {
            SqlValue::Null => String::new(),
            SqlValue::Text(s) => s.trim_end().to_string(),
            other => other.to_string(),
        }
    }

    /// Write one value as a typed cell. Nulls leave the cell empty.
    pub fn write_cell(
        &self,
        worksheet: &mut Worksheet,
        row: u32,
        value: &SqlValue,
        table: &str,
    ) -> BcpResult<()> {
        if value.is_null() {
            return Ok(());
        }
        let col = self.sheet_column();
        match self.db_type {
            ExportType::Text => {
                worksheet.write_string(row, col, self.value_as_string(value))?;
            }
            ExportType::Int32 => {
                let v: i32 = self.integer_value(value, table)?;
                worksheet.write_number(row, col, v)?;
            }
            ExportType::Int16 => {
                let v: i16 = self.integer_value(value, table)?;
                worksheet.write_number(row, col, v)?;
            }
        }
        Ok(())
    }

    fn integer_value<T: TryFrom<i64>>(&self, value: &SqlValue, table: &str) -> BcpResult<T> {
        let conversion_error = |reason: String| BcpError::CellConversion {
            table: table.to_string(),
            column: self.column_name.clone(),
            reason,
        };
        match value {
            SqlValue::Integer(i) => T::try_from(*i).map_err(|_| {
                conversion_error(format!("{} is out of range for {:?}", i, self.db_type))
            }),
            other => Err(conversion_error(format!(
                "expected an integer, got {}",
                other.type_name()
            ))),
        }
    }
}

/// How a result set is treated
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableKind {
    Meta,
    Hidden,
    Visible,
}

/// The columns and naming of one result set
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportTable {
    pub name: String,
    pub kind: TableKind,
    pub to_sheet: bool,
    pub columns: Vec<ExportColumn>,
}

impl ExportTable {
    fn new(name: String, kind: TableKind, to_sheet: bool) -> Self {
        Self {
            name,
            kind,
            to_sheet,
            columns: Vec::new(),
        }
    }

    /// Map the schema to columns. Unsupported types are dropped with a
    /// diagnostic, blank names become `col_<n>` and duplicate names get `x`
    /// appended until unique.
    fn set_columns(&mut self, schema: &[SourceColumn]) {
        let mut used: Vec<String> = Vec::new();
        for (i, source) in schema.iter().enumerate() {
            let position = i + 1;
            let Some(mut column) = ExportColumn::new(source, position) else {
                let diagnostic = BcpError::UnsupportedColumn {
                    table: self.name.clone(),
                    position,
                    name: source.base_name.clone(),
                    data_type: source.data_type.clone().unwrap_or_default(),
                };
                error!("{}", diagnostic);
                continue;
            };

            if column.column_name.trim().is_empty() {
                column.column_name = format!("col_{}", position);
            }
            while used.contains(&column.column_name.to_lowercase()) {
                column.column_name.push('x');
            }
            used.push(column.column_name.to_lowercase());
            self.columns.push(column);
        }
    }
}

struct OpenTable {
    table: ExportTable,
    sheet: Option<Worksheet>,
    next_row: u32,
}

/// Builds one workbook from a sequence of result sets
pub struct ExcelBuilder {
    workbook: Workbook,
    debug_level: u8,
    table_index: usize,
    next_table_name: Option<String>,
    sheet_names: Vec<String>,
    current: Option<OpenTable>,
    tables: usize,
    sheets: usize,
    rows: usize,
}

impl ExcelBuilder {
    pub fn new(debug_level: u8) -> Self {
        Self {
            workbook: Workbook::new(),
            debug_level,
            table_index: 1,
            next_table_name: None,
            sheet_names: Vec::new(),
            current: None,
            tables: 0,
            sheets: 0,
            rows: 0,
        }
    }

    /// Sheet name announced by the last metadata table, not yet used
    pub fn next_table_name(&self) -> Option<&str> {
        self.next_table_name.as_deref()
    }

    pub fn tables(&self) -> usize {
        self.tables
    }

    pub fn sheets(&self) -> usize {
        self.sheets
    }

    /// Data rows written to sheets
    pub fn rows(&self) -> usize {
        self.rows
    }

    fn positional_name(&mut self, prefix: &str) -> String {
        let name = format!("{}TABLE_{}", prefix, self.table_index);
        self.table_index += 1;
        name
    }

    /// Decide name, kind and columns for a result schema
    pub fn table_for(&mut self, schema: &[SourceColumn]) -> ExportTable {
        let first = schema.first().map(|c| c.base_name.as_str()).unwrap_or("");
        let show_hidden = self.debug_level >= SHOW_HIDDEN_LEVEL;

        let mut table = if first.eq_ignore_ascii_case(META_MARKER) {
            ExportTable::new(self.positional_name(""), TableKind::Meta, show_hidden)
        } else if first.starts_with('_') {
            ExportTable::new(self.positional_name("_HIDDEN_"), TableKind::Hidden, show_hidden)
        } else {
            let name = match self.next_table_name.take() {
                Some(name) => name,
                None => self.positional_name(""),
            };
            ExportTable::new(name, TableKind::Visible, true)
        };
        table.set_columns(schema);
        table
    }

    fn on_column_value(next_table_name: &mut Option<String>, column_name: &str, value: &str) {
        if column_name.trim().eq_ignore_ascii_case("name") {
            debug!(value, "Next table name");
            *next_table_name = Some(value.to_string());
        }
    }

    fn unique_sheet_name(&mut self, name: &str) -> String {
        let base = sanitize_sheet_name(name);
        let mut candidate = base.clone();
        let mut n = 2;
        while self
            .sheet_names
            .iter()
            .any(|used| used.eq_ignore_ascii_case(&candidate))
        {
            let suffix = format!("_{}", n);
            let keep = MAX_SHEET_NAME_LEN - suffix.len();
            let head: String = base.chars().take(keep).collect();
            candidate = format!("{}{}", trim_sheet_name(&head), suffix);
            n += 1;
        }
        self.sheet_names.push(candidate.clone());
        candidate
    }

    fn make_sheet(&mut self, table: &ExportTable) -> BcpResult<Worksheet> {
        let mut worksheet = Worksheet::new();
        let sheet_name = self.unique_sheet_name(&table.name);
        worksheet.set_name(&sheet_name)?;
        for column in &table.columns {
            worksheet.write_string(0, column.sheet_column(), &column.column_name)?;
        }
        Ok(worksheet)
    }

    /// Save the workbook. The caller has already resolved the final path.
    pub fn save(&mut self, path: &Path) -> BcpResult<()> {
        if self.current.is_some() {
            self.end()?;
        }
        self.workbook.save(path)?;
        info!(path = %path.display(), sheets = self.sheets, "Saved workbook");
        Ok(())
    }
}

impl ResultSetHandler for ExcelBuilder {
    fn begin(&mut self, schema: &[SourceColumn]) -> BcpResult<()> {
        if self.current.is_some() {
            self.end()?;
        }
        info!("READING TABLE #{}", self.tables);
        let table = self.table_for(schema);
        debug!(
            table = %table.name,
            kind = ?table.kind,
            to_sheet = table.to_sheet,
            columns = table.columns.len(),
            "Mapped result set"
        );
        let sheet = if table.to_sheet {
            Some(self.make_sheet(&table)?)
        } else {
            None
        };
        self.current = Some(OpenTable {
            table,
            sheet,
            next_row: 1,
        });
        self.tables += 1;
        Ok(())
    }

    fn record(&mut self, values: &[SqlValue]) -> BcpResult<()> {
        let Some(open) = self.current.as_mut() else {
            return Err(BcpError::InvalidOption(
                "record received outside a result set".to_string(),
            ));
        };

        for column in &open.table.columns {
            let value = values.get(column.column_index - 1).unwrap_or(&SqlValue::Null);
            if let Some(sheet) = open.sheet.as_mut() {
                column.write_cell(sheet, open.next_row, value, &open.table.name)?;
            }
            if open.table.kind == TableKind::Meta {
                Self::on_column_value(
                    &mut self.next_table_name,
                    &column.column_name,
                    &column.value_as_string(value),
                );
            }
        }

        if open.sheet.is_some() {
            open.next_row += 1;
            self.rows += 1;
        }
        Ok(())
    }

    fn end(&mut self) -> BcpResult<()> {
        let Some(open) = self.current.take() else {
            return Ok(());
        };
        if let Some(sheet) = open.sheet {
            info!(table = %open.table.name, rows = open.next_row - 1, "Wrote sheet");
            self.workbook.push_worksheet(sheet);
            self.sheets += 1;
        }
        Ok(())
    }
}

/// Make a table name usable as a worksheet name
pub fn sanitize_sheet_name(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| match c {
            '[' | ']' | ':' | '*' | '?' | '/' | '\\' => '_',
            c => c,
        })
        .collect();
    // Excel rejects names that start or end with an apostrophe, so trim
    // after cutting to length
    let cut: String = cleaned.chars().take(MAX_SHEET_NAME_LEN).collect();
    let trimmed = trim_sheet_name(&cut);
    if trimmed.is_empty() {
        return "TABLE".to_string();
    }
    trimmed.to_string()
}

fn trim_sheet_name(name: &str) -> &str {
    name.trim_matches(|c: char| c == '\'' || c.is_whitespace())
}

/// Append `.xlsx` when the path has no extension, then refuse an existing
/// file unless `force` is set
pub fn resolve_output_path(path: &Path, force: bool) -> BcpResult<PathBuf> {
    let mut path = path.to_path_buf();
    if path.extension().is_none() {
        path.set_extension("xlsx");
    }
    if path.exists() && !force {
        return Err(BcpError::FileExists(path));
    }
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn schema(cols: &[(&str, Option<&str>)]) -> Vec<SourceColumn> {
        cols.iter()
            .map(|(name, ty)| SourceColumn::new(*name, *ty))
            .collect()
    }

    #[test]
    fn test_export_type_mapping() {
        assert_eq!(ExportType::from_declared(Some("INT")), Some(ExportType::Int32));
        assert_eq!(ExportType::from_declared(Some("integer")), Some(ExportType::Int32));
        assert_eq!(ExportType::from_declared(Some("smallint")), Some(ExportType::Int16));
        assert_eq!(ExportType::from_declared(Some("varchar(20)")), Some(ExportType::Text));
        assert_eq!(ExportType::from_declared(None), Some(ExportType::Text));
        assert_eq!(ExportType::from_declared(Some("real")), None);
        assert_eq!(ExportType::from_declared(Some("blob")), None);
    }

    #[test]
    fn test_duplicate_names_are_made_unique() {
        let mut builder = ExcelBuilder::new(0);
        let table = builder.table_for(&schema(&[("x", None), ("X", None), ("x", None)]));
        let names: Vec<&str> = table.columns.iter().map(|c| c.column_name.as_str()).collect();
        assert_eq!(names, vec!["x", "Xx", "xxx"]);
        assert!(names.iter().all(|n| n.to_lowercase().starts_with('x')));
    }

    #[test]
    fn test_blank_names_get_positional_placeholder() {
        let mut builder = ExcelBuilder::new(0);
        let table = builder.table_for(&schema(&[("id", Some("int")), ("", Some("text"))]));
        assert_eq!(table.columns[1].column_name, "col_2");
        assert_eq!(table.columns[1].original_column_name, "");
    }

    #[test]
    fn test_unsupported_columns_are_dropped() {
        let mut builder = ExcelBuilder::new(0);
        let table = builder.table_for(&schema(&[
            ("id", Some("int")),
            ("price", Some("real")),
            ("name", Some("text")),
        ]));
        let positions: Vec<usize> = table.columns.iter().map(|c| c.column_index).collect();
        assert_eq!(positions, vec![1, 3]);
    }

    #[test]
    fn test_table_kinds_and_names() {
        let mut builder = ExcelBuilder::new(0);
        let meta = builder.table_for(&schema(&[("__META__", None), ("name", None)]));
        assert_eq!(meta.kind, TableKind::Meta);
        assert_eq!(meta.name, "TABLE_1");
        assert!(!meta.to_sheet);

        let hidden = builder.table_for(&schema(&[("_id", Some("int"))]));
        assert_eq!(hidden.kind, TableKind::Hidden);
        assert_eq!(hidden.name, "_HIDDEN_TABLE_2");
        assert!(!hidden.to_sheet);

        let visible = builder.table_for(&schema(&[("id", Some("int"))]));
        assert_eq!(visible.kind, TableKind::Visible);
        assert_eq!(visible.name, "TABLE_3");
        assert!(visible.to_sheet);
    }

    #[test]
    fn test_hidden_tables_shown_at_debug_level() {
        let mut builder = ExcelBuilder::new(SHOW_HIDDEN_LEVEL);
        assert!(builder.table_for(&schema(&[("__meta__", None)])).to_sheet);
        assert!(builder.table_for(&schema(&[("_x", None)])).to_sheet);
    }

    #[test]
    fn test_meta_table_names_next_visible_table() {
        let mut builder = ExcelBuilder::new(0);
        builder
            .begin(&schema(&[("__meta__", None), ("name", None)]))
            .unwrap();
        builder
            .record(&[SqlValue::Text(String::new()), SqlValue::Text("Orders  ".into())])
            .unwrap();
        builder.end().unwrap();
        assert_eq!(builder.next_table_name(), Some("Orders"));

        let orders = builder.table_for(&schema(&[("id", Some("int"))]));
        assert_eq!(orders.name, "Orders");
        assert_eq!(builder.next_table_name(), None);

        let next = builder.table_for(&schema(&[("id", Some("int"))]));
        assert_eq!(next.name, "TABLE_2");
    }

    #[test]
    fn test_value_as_string() {
        let column = ExportColumn::new(&SourceColumn::new("a", Some("text")), 1).unwrap();
        assert_eq!(column.value_as_string(&SqlValue::Null), "");
        assert_eq!(column.value_as_string(&SqlValue::Text("ab  ".into())), "ab");
        assert_eq!(column.value_as_string(&SqlValue::Integer(5)), "5");
    }

    #[test]
    fn test_int16_out_of_range_is_rejected() {
        let column = ExportColumn::new(&SourceColumn::new("n", Some("smallint")), 1).unwrap();
        let mut sheet = Worksheet::new();
        assert!(column
            .write_cell(&mut sheet, 1, &SqlValue::Integer(70_000), "t")
            .is_err());
        assert!(column
            .write_cell(&mut sheet, 1, &SqlValue::Integer(7), "t")
            .is_ok());
        assert!(column
            .write_cell(&mut sheet, 1, &SqlValue::Text("7".into()), "t")
            .is_err());
    }

    #[test]
    fn test_sanitize_sheet_name() {
        assert_eq!(sanitize_sheet_name("Orders"), "Orders");
        assert_eq!(sanitize_sheet_name("a/b:c"), "a_b_c");
        assert_eq!(sanitize_sheet_name(""), "TABLE");
        assert_eq!(sanitize_sheet_name(&"x".repeat(40)).len(), 31);
    }

    #[test]
    fn test_sheet_name_never_ends_with_apostrophe() {
        let long = format!("{}'bbbb", "a".repeat(30));
        assert_eq!(sanitize_sheet_name(&long), "a".repeat(30));
        assert_eq!(sanitize_sheet_name("'quoted'"), "quoted");

        let mut builder = ExcelBuilder::new(0);
        let name = format!("{}'bb", "a".repeat(28));
        assert_eq!(builder.unique_sheet_name(&name), name);
        assert_eq!(
            builder.unique_sheet_name(&name),
            format!("{}_2", "a".repeat(28))
        );
    }

    #[test]
    fn test_long_meta_name_still_makes_a_sheet() {
        let mut builder = ExcelBuilder::new(0);
        builder
            .begin(&schema(&[("__meta__", None), ("name", None)]))
            .unwrap();
        let long = format!("{}'bbbb", "a".repeat(30));
        builder
            .record(&[SqlValue::Text(String::new()), SqlValue::Text(long)])
            .unwrap();
        builder.begin(&schema(&[("id", Some("int"))])).unwrap();
        builder.record(&[SqlValue::Integer(1)]).unwrap();
        builder.end().unwrap();
        assert_eq!(builder.sheets(), 1);
        assert_eq!(builder.sheet_names, vec!["a".repeat(30)]);
    }

    #[test]
    fn test_unique_sheet_names() {
        let mut builder = ExcelBuilder::new(0);
        assert_eq!(builder.unique_sheet_name("Orders"), "Orders");
        assert_eq!(builder.unique_sheet_name("orders"), "orders_2");
        assert_eq!(builder.unique_sheet_name("Orders"), "Orders_3");
    }

    #[test]
    fn test_resolve_output_path() {
        let dir = tempfile::TempDir::new().unwrap();
        let resolved = resolve_output_path(&dir.path().join("report"), false).unwrap();
        assert_eq!(resolved, dir.path().join("report.xlsx"));

        std::fs::write(&resolved, b"x").unwrap();
        assert!(matches!(
            resolve_output_path(&dir.path().join("report"), false),
            Err(BcpError::FileExists(_))
        ));
        assert!(resolve_output_path(&resolved, true).is_ok());
    }
}
