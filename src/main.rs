use anyhow::Context;
use bcp_excel::cli::{self, ExportOptions, ImportOptions, DEFAULT_BATCH_SIZE};
use bcp_excel::logging;
use clap::{ArgAction, Parser, Subcommand};
use colored::Colorize;
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser)]
#[command(name = "bcp-excel")]
#[command(about = "Bulk copy between Excel workbooks and SQL tables")]
#[command(long_about = "bcp-excel - Bulk copy between Excel workbooks and SQL tables

USAGE:
  bcp-excel import my_excel.xlsx into mydb.sqlite..mytbl
  bcp-excel import my_excel.xlsx into mydb.sqlite..mytbl --forcecreate --truncate
  bcp-excel export mydb.sqlite..mytbl into my_excel.xlsx
  bcp-excel export mydb.sqlite..mytbl into my_excel.xlsx --force

SETTING FORMAT:
  -f i,i,i    -  3 integer columns
  -f s50,u20  -  1 varchar(50) column, 1 nvarchar(20) column
  -f i,s,u30  -  1 int, 1 varchar(512) and 1 nvarchar(30) column

LOG LEVEL:
  default warn, -v info, -vv debug, -vvv trace (RUST_LOG overrides)")]
#[command(version)]
struct Cli {
    /// Increase log verbosity (repeatable)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(long_about = "Import a sheet of an Excel .xlsx file into a table.

Column types are taken from the first available source:
  1. a DEF row in the sheet, marked in a _CONTROL column
  2. the --format directive
  3. varchar(<colwidth>) null

Rows where every column is blank are skipped. Rows that fail to convert are
logged and skipped. Rows are loaded in batches; a failed batch is skipped and
counted against --errors.")]
    /// Import an Excel file into a table
    Import {
        /// Excel filename
        file: PathBuf,

        /// into
        action: String,

        /// [database]..[tablename]
        target: String,

        /// Column definitions: [i|s|u]<size>,[i|s|u]<size>,...
        #[arg(short = 'f', long)]
        format: Option<String>,

        /// First row of import - counting from line 1
        #[arg(short = 'F', long = "firstrow")]
        first_row: Option<usize>,

        /// Last row of import - counting from line 1
        #[arg(short = 'L', long = "lastrow")]
        last_row: Option<usize>,

        /// Number of rows to load in a batch
        #[arg(short = 'b', long = "batchsize", env = "BCP_BATCH_SIZE", default_value_t = DEFAULT_BATCH_SIZE)]
        batch_size: usize,

        /// Number of failed batches to allow before stopping
        #[arg(short = 'E', long = "errors")]
        max_errors: Option<usize>,

        /// Default varchar column size
        #[arg(long = "colwidth")]
        col_width: Option<u32>,

        /// Sheet number in excel. First sheet has number 1
        #[arg(long, default_value_t = 1)]
        sheet: usize,

        /// Drop and create the table
        #[arg(long = "forcecreate")]
        force_create: bool,

        /// Delete existing data in the table
        #[arg(long)]
        truncate: bool,
    },

    #[command(long_about = "Export a table or query to an Excel .xlsx file.

[tablename] may be prefixed to allow custom exports:
  SQL:<query>   the query is executed and every result set exported
  FILE:<path>   the content of the file is executed and exported

A result set whose first column is __meta__ is not written; its 'name'
column names the sheet of the next result set. Result sets whose first
column starts with '_' are hidden. Both are written at -vvv.")]
    /// Export a table or query to an Excel file
    Export {
        /// [database]..[tablename]
        target: String,

        /// into
        action: String,

        /// Excel filename
        file: PathBuf,

        /// Force overwrite existing Excel file
        #[arg(short = 'f', long)]
        force: bool,
    },
}

fn run(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Commands::Import {
            file,
            action,
            target,
            format,
            first_row,
            last_row,
            batch_size,
            max_errors,
            col_width,
            sheet,
            force_create,
            truncate,
        } => {
            let mut opts = ImportOptions::from_args(file, &action, &target)?;
            opts.format = format;
            opts.first_row = first_row;
            opts.last_row = last_row;
            opts.batch_size = batch_size;
            opts.max_errors = max_errors;
            opts.col_width = col_width;
            opts.sheet = sheet;
            opts.force_create = force_create;
            opts.truncate = truncate;
            cli::import(opts).context("Import failed")
        }

        Commands::Export {
            target,
            action,
            file,
            force,
        } => {
            let mut opts = ExportOptions::from_args(&target, &action, file)?;
            opts.force = force;
            opts.debug_level = cli.verbose;
            cli::export(opts).context("Export failed")
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{} {:#}", "Error:".bold().red(), e);
            ExitCode::FAILURE
        }
    }
}
