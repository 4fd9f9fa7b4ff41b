//! Excel reader - the spreadsheet side of an import

use crate::error::{BcpError, BcpResult};
use calamine::{open_workbook, Data, Range, Reader, Xlsx};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use tracing::{debug, info};

/// Marker in row 0 identifying the control column
pub const CONTROL_MARKER: &str = "_CONTROL";
/// Marker in the control column identifying the name row
pub const NAME_ROW_MARKER: &str = "COLNAME";
/// Marker in the control column identifying the definition row
pub const DEF_ROW_MARKER: &str = "DEF";

/// Read access to one sheet, by 0-based absolute row and column
pub trait SheetReader {
    /// Index of the last row, `None` for an empty sheet
    fn last_row(&self) -> Option<usize>;

    /// Index of the last non-blank cell in `row` plus one, 0 when the row is
    /// absent
    fn row_width(&self, row: usize) -> usize;

    fn cell(&self, row: usize, col: usize) -> Option<&Data>;

    /// Trimmed text of a cell, `None` when the cell is absent
    fn cell_string(&self, row: usize, col: usize) -> Option<String> {
        self.cell(row, col).map(|c| cell_text(c).trim().to_string())
    }
}

impl SheetReader for Range<Data> {
    fn last_row(&self) -> Option<usize> {
        self.end().map(|(row, _)| row as usize)
    }

    fn row_width(&self, row: usize) -> usize {
        let (Some((first_row, first_col)), Some((last_row, last_col))) = (self.start(), self.end())
        else {
            return 0;
        };
        let row = row as u32;
        if row < first_row || row > last_row {
            return 0;
        }
        (first_col..=last_col)
            .rev()
            .find(|&col| {
                self.get_value((row, col))
                    .is_some_and(|c| !matches!(c, Data::Empty))
            })
            .map(|col| col as usize + 1)
            .unwrap_or(0)
    }

    fn cell(&self, row: usize, col: usize) -> Option<&Data> {
        self.get_value((row as u32, col as u32))
    }
}

/// Cell rendered as text, the way it reads in Excel
pub fn cell_text(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Numeric value of a cell, if it has one
pub fn cell_number(cell: &Data) -> Option<f64> {
    match cell {
        Data::Float(f) => Some(*f),
        Data::Int(i) => Some(*i as f64),
        Data::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        Data::DateTime(dt) => Some(dt.as_f64()),
        Data::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Where the metadata rows of a sheet live
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControlLayout {
    pub control_column: Option<usize>,
    pub name_row: usize,
    pub definition_row: Option<usize>,
}

impl Default for ControlLayout {
    fn default() -> Self {
        Self {
            control_column: None,
            name_row: 0,
            definition_row: None,
        }
    }
}

impl ControlLayout {
    /// Look for a `_CONTROL` column in row 0 and the `COLNAME` / `DEF` rows
    /// below it. Without a control column, names are in row 0 and there is no
    /// definition row.
    pub fn discover<S: SheetReader>(sheet: &S) -> Self {
        let Some(control_column) = find_cell_in_row(sheet, 0, CONTROL_MARKER) else {
            return Self::default();
        };
        let name_row = find_cell_in_col(sheet, control_column, NAME_ROW_MARKER).unwrap_or(0);
        let definition_row = find_cell_in_col(sheet, control_column, DEF_ROW_MARKER);
        debug!(
            control_column,
            name_row, ?definition_row, "Found control column"
        );
        Self {
            control_column: Some(control_column),
            name_row,
            definition_row,
        }
    }

    /// First data row: the row after the later of the name and definition rows
    pub fn first_data_row(&self) -> usize {
        1 + self.name_row.max(self.definition_row.unwrap_or(0))
    }
}

fn find_cell_in_row<S: SheetReader>(sheet: &S, row: usize, search: &str) -> Option<usize> {
    (0..sheet.row_width(row)).find(|&col| sheet.cell_string(row, col).as_deref() == Some(search))
}

fn find_cell_in_col<S: SheetReader>(sheet: &S, col: usize, search: &str) -> Option<usize> {
    let last = sheet.last_row()?;
    (0..=last).find(|&row| sheet.cell_string(row, col).as_deref() == Some(search))
}

/// An open `.xlsx` workbook
pub struct ExcelReader {
    workbook: Xlsx<BufReader<File>>,
}

impl ExcelReader {
    pub fn open<P: AsRef<Path>>(path: P) -> BcpResult<Self> {
        let path = path.as_ref().to_path_buf();
        if !path.exists() {
            return Err(BcpError::FileNotFound(path));
        }
        let workbook: Xlsx<_> = open_workbook(&path)?;
        info!(path = %path.display(), "Opened workbook");
        Ok(Self { workbook })
    }

    /// Read a sheet by 0-based index
    pub fn read_sheet(&mut self, index: usize) -> BcpResult<Range<Data>> {
        let range = self
            .workbook
            .worksheet_range_at(index)
            .ok_or(BcpError::SheetNotFound(index + 1))??;
        Ok(range)
    }
}
