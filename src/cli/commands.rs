use crate::cli::options::{ExportOptions, ImportOptions};
use crate::core::{BatchOptions, BcpController, ExtractStats, DEFAULT_VARCHAR_WIDTH};
use crate::db::SqliteConnection;
use crate::error::{BcpError, BcpResult};
use crate::excel::{resolve_output_path, ControlLayout, ExcelBuilder, ExcelReader};
use crate::parser::parse_format;
use colored::Colorize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::{debug, error, info, trace};

/// Outcome of an import run
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ImportSummary {
    pub rows_loaded: usize,
    pub batches_loaded: usize,
    pub batches_failed: usize,
    /// Rows in batches that failed to load
    pub rows_failed: usize,
    /// Set when the error budget ran out
    pub aborted: bool,
    pub extract: ExtractStats,
    pub elapsed: Duration,
}

/// Outcome of an export run
#[derive(Debug, Clone, PartialEq)]
pub struct ExportSummary {
    pub path: PathBuf,
    pub tables: usize,
    pub sheets: usize,
    pub rows: usize,
    pub elapsed: Duration,
}

/// Load one sheet into a table
pub fn run_import(opts: &ImportOptions) -> BcpResult<ImportSummary> {
    debug!(args = %serde_json::to_string(opts)?, "Import options");
    opts.validate()?;
    let started = Instant::now();

    let mut excel = ExcelReader::open(&opts.filename)?;
    let sheet = excel.read_sheet(opts.sheet - 1)?;
    let hints = parse_format(opts.format.as_deref())?;
    let layout = ControlLayout::discover(&sheet);

    let default_width = opts.col_width.unwrap_or(DEFAULT_VARCHAR_WIDTH);
    let mut controller = BcpController::new(&sheet, layout, &hints, default_width)?;
    if let Some(width) = opts.col_width {
        controller.apply_default_width(width);
    }
    for field in controller.fields() {
        trace!(
            "Got Field Ix: {}, Nm: {}, Def: {}",
            field.column_index,
            field.name,
            field.sql_type_name()
        );
    }

    let mut db = SqliteConnection::open(&opts.database)?;
    if opts.force_create {
        db.drop_table(&opts.table)?;
        db.create_table(&opts.table, &controller, false)?;
    } else {
        db.create_table(&opts.table, &controller, true)?;
    }
    if opts.truncate {
        db.truncate_table(&opts.table)?;
    }

    let mut summary = ImportSummary::default();
    let mut batches = controller.batches(
        &sheet,
        BatchOptions {
            batch_size: opts.batch_size,
            first_row: opts.first_row,
            last_row: opts.last_row,
        },
    )?;

    for batch in batches.by_ref() {
        match db.bulk_load(&opts.table, controller.fields(), &batch) {
            Ok(rows) => {
                summary.rows_loaded += rows;
                summary.batches_loaded += 1;
                info!("Inserted {} rows", rows);
            }
            Err(e @ BcpError::BatchTransport { .. }) => {
                error!("SQL Error: {}", e);
                summary.batches_failed += 1;
                summary.rows_failed += batch.len();
                if opts
                    .max_errors
                    .is_some_and(|max| summary.batches_failed >= max)
                {
                    error!("Too many errors. Aborting");
                    summary.aborted = true;
                    break;
                }
            }
            Err(e) => return Err(e),
        }
    }

    summary.extract = batches.stats();
    summary.elapsed = started.elapsed();
    info!(
        "Inserted {} rows in {} ms",
        summary.rows_loaded,
        summary.elapsed.as_millis()
    );
    if summary.batches_failed > 0 {
        error!(
            "Total {} errors, affecting {} rows",
            summary.batches_failed, summary.rows_failed
        );
    }
    Ok(summary)
}

/// Query text for an export target: `SQL:` runs the rest as a query, `FILE:`
/// runs the file's content, anything else is a table name
pub fn query_text(table: &str) -> BcpResult<String> {
    if let Some(file) = table.strip_prefix("FILE:") {
        let path = Path::new(file);
        if !path.exists() {
            return Err(BcpError::FileNotFound(path.to_path_buf()));
        }
        return Ok(fs::read_to_string(path)?);
    }
    if let Some(sql) = table.strip_prefix("SQL:") {
        return Ok(sql.to_string());
    }
    Ok(format!("select * from {}", crate::db::quote_ident(table)))
}

/// Run a query and write its result sets to a workbook
pub fn run_export(opts: &ExportOptions) -> BcpResult<ExportSummary> {
    debug!(args = %serde_json::to_string(opts)?, "Export options");
    opts.validate()?;
    let path = resolve_output_path(&opts.filename, opts.force)?;
    let query = query_text(&opts.table)?;
    let started = Instant::now();

    let db = SqliteConnection::open(&opts.database)?;
    let mut builder = ExcelBuilder::new(opts.debug_level);
    db.query(&query, &mut builder)?;
    builder.save(&path)?;

    let summary = ExportSummary {
        path,
        tables: builder.tables(),
        sheets: builder.sheets(),
        rows: builder.rows(),
        elapsed: started.elapsed(),
    };
    info!("DONE in {} ms", summary.elapsed.as_millis());
    Ok(summary)
}

/// Execute the import command
pub fn import(opts: ImportOptions) -> BcpResult<()> {
    println!("{}", "bcp-excel - Excel Import".bold().green());
    println!("   Input:  {}", opts.filename.display());
    println!(
        "   Target: {}..{}\n",
        opts.database.display(),
        opts.table
    );

    let summary = run_import(&opts)?;

    if summary.aborted {
        println!("{}", "Import aborted: too many failed batches".bold().red());
    } else {
        println!("{}", "Import Complete!".bold().green());
    }
    println!(
        "   Rows loaded:    {} in {} batches ({} ms)",
        summary.rows_loaded,
        summary.batches_loaded,
        summary.elapsed.as_millis()
    );
    if summary.extract.rows_failed > 0 {
        println!(
            "   {}",
            format!("Rows skipped:   {}", summary.extract.rows_failed).yellow()
        );
    }
    if summary.batches_failed > 0 {
        println!(
            "   {}",
            format!(
                "Failed batches: {} ({} rows)",
                summary.batches_failed, summary.rows_failed
            )
            .red()
        );
    }
    println!();
    Ok(())
}

/// Execute the export command
pub fn export(opts: ExportOptions) -> BcpResult<()> {
    println!("{}", "bcp-excel - Excel Export".bold().green());
    println!(
        "   Source: {}..{}",
        opts.database.display(),
        opts.table
    );
    println!("   Output: {}\n", opts.filename.display());

    let summary = run_export(&opts)?;

    println!("{}", "Export Complete!".bold().green());
    println!("   Excel file: {}", summary.path.display());
    println!(
        "   {} result sets, {} sheets, {} rows ({} ms)\n",
        summary.tables,
        summary.sheets,
        summary.rows,
        summary.elapsed.as_millis()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_text_table() {
        assert_eq!(query_text("orders").unwrap(), "select * from \"orders\"");
        assert_eq!(query_text("x]y").unwrap(), "select * from \"x]y\"");
    }

    #[test]
    fn test_query_text_sql_prefix() {
        assert_eq!(query_text("SQL:select 1").unwrap(), "select 1");
    }

    #[test]
    fn test_query_text_file_prefix() {
        let dir = tempfile::TempDir::new().unwrap();
        let file = dir.path().join("q.sql");
        fs::write(&file, "select 2;").unwrap();
        let target = format!("FILE:{}", file.display());
        assert_eq!(query_text(&target).unwrap(), "select 2;");

        let missing = format!("FILE:{}", dir.path().join("none.sql").display());
        assert!(matches!(query_text(&missing), Err(BcpError::FileNotFound(_))));
    }
}
