//! Column definition resolution for one sheet
//!
//! Each named column gets exactly one definition, taken from the first
//! available source:
//!
//! 1. the cell in the sheet's definition row (`DEF`), verbatim
//! 2. the format directive hint for that column position
//! 3. the default `varchar(<width>) null`

use crate::core::batch::RowBatches;
use crate::core::field::Field;
use crate::error::{BcpError, BcpResult};
use crate::excel::{ControlLayout, SheetReader};
use crate::types::ColumnTypeHint;
use tracing::debug;

/// Row range and batch size for one extraction pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchOptions {
    pub batch_size: usize,
    /// First sheet row to read, 1-based
    pub first_row: Option<usize>,
    /// Last sheet row to read, 1-based and inclusive
    pub last_row: Option<usize>,
}

impl BatchOptions {
    pub fn new(batch_size: usize) -> Self {
        Self {
            batch_size,
            first_row: None,
            last_row: None,
        }
    }
}

/// Default definition for columns without a definition cell or hint
pub fn default_definition(default_width: u32) -> String {
    format!("varchar({}) null", default_width)
}

/// Pick the definition for one column. Only the first available source is
/// used.
pub fn resolve_definition(
    definition_cell: Option<&str>,
    hint: Option<&ColumnTypeHint>,
    default_width: u32,
) -> String {
    if let Some(def) = definition_cell.map(str::trim).filter(|d| !d.is_empty()) {
        return def.to_string();
    }
    match hint {
        Some(h) => h.to_definition(default_width),
        None => default_definition(default_width),
    }
}

/// Resolved field list for one sheet
#[derive(Debug, Clone)]
pub struct BcpController {
    layout: ControlLayout,
    fields: Vec<Field>,
}

impl BcpController {
    /// Resolve a field for every named, non-control column of the name row.
    ///
    /// Fails on the first column whose definition cannot be turned into a
    /// field; a table is never created from a partial schema.
    pub fn new<S: SheetReader>(
        sheet: &S,
        layout: ControlLayout,
        hints: &[ColumnTypeHint],
        default_width: u32,
    ) -> BcpResult<Self> {
        let width = sheet.row_width(layout.name_row);
        let mut fields = Vec::new();

        for col in 0..width {
            if Some(col) == layout.control_column {
                continue;
            }

            // Hints are positional over the columns that remain once the
            // control column is taken out
            let hint_position = match layout.control_column {
                Some(ctrl) if col > ctrl => col - 1,
                _ => col,
            };

            let name = sheet.cell_string(layout.name_row, col).unwrap_or_default();
            if name.is_empty() {
                continue;
            }

            let definition_cell = layout
                .definition_row
                .and_then(|row| sheet.cell_string(row, col));
            let definition = resolve_definition(
                definition_cell.as_deref(),
                hints.get(hint_position),
                default_width,
            );
            debug!("{} : {}", name, definition);

            fields.push(Field::from_definition(col, fields.len(), &name, &definition)?);
        }

        Ok(Self { layout, fields })
    }

    pub fn layout(&self) -> &ControlLayout {
        &self.layout
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    /// Override the width of text fields that have none
    pub fn apply_default_width(&mut self, width: u32) {
        for field in &mut self.fields {
            field.apply_default_width(width);
        }
    }

    /// `[name] <type>` clauses, in destination order
    pub fn sql_definitions(&self) -> Vec<String> {
        self.fields.iter().map(Field::sql_def).collect()
    }

    /// Start a lazy pass over the data rows
    pub fn batches<'a, S: SheetReader>(
        &'a self,
        sheet: &'a S,
        options: BatchOptions,
    ) -> BcpResult<RowBatches<'a, S>> {
        if options.batch_size == 0 {
            return Err(BcpError::InvalidOption(
                "batch size must be a positive number".to_string(),
            ));
        }
        if options.first_row == Some(0) || options.last_row == Some(0) {
            return Err(BcpError::InvalidOption(
                "row numbers count from 1".to_string(),
            ));
        }

        let first_row = options
            .first_row
            .map(|r| r - 1)
            .unwrap_or_else(|| self.layout.first_data_row());
        let last_row = match (options.last_row, sheet.last_row()) {
            (Some(requested), Some(last)) => Some((requested - 1).min(last)),
            (None, last) => last,
            (Some(_), None) => None,
        };

        Ok(RowBatches::new(
            &self.fields,
            sheet,
            first_row,
            last_row,
            options.batch_size,
        ))
    }
}
