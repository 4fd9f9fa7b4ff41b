//! Excel side of the bulk copy
//!
//! - Import: read a sheet (calamine) and discover its control layout
//! - Export: turn relational result sets into worksheets (rust_xlsxwriter)

mod exporter;
mod importer;

pub use exporter::{
    resolve_output_path, sanitize_sheet_name, ExcelBuilder, ExportColumn, ExportTable,
    ExportType, TableKind, META_MARKER, SHOW_HIDDEN_LEVEL,
};
pub use importer::{
    cell_number, cell_text, ControlLayout, ExcelReader, SheetReader, CONTROL_MARKER,
    DEF_ROW_MARKER, NAME_ROW_MARKER,
};
