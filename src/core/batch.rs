//! Lazy batching of sheet rows
//!
//! [`RowBatches`] walks a row range once, builds one destination row per
//! sheet row through each field's `set_data`, and hands out bounded
//! [`RowBatch`]es. It is pull-based: nothing is read until the caller asks for
//! the next batch.

use crate::core::field::Field;
use crate::error::BcpResult;
use crate::excel::SheetReader;
use crate::types::DbValue;
use std::iter::FusedIterator;
use tracing::{debug, error, info};

/// A bounded group of coerced rows, each shaped like the field list
#[derive(Debug, Clone, PartialEq)]
pub struct RowBatch {
    rows: Vec<Vec<DbValue>>,
}

impl RowBatch {
    pub fn new(rows: Vec<Vec<DbValue>>) -> Self {
        Self { rows }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn rows(&self) -> &[Vec<DbValue>] {
        &self.rows
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Vec<DbValue>> {
        self.rows.iter()
    }

    pub fn into_rows(self) -> Vec<Vec<DbValue>> {
        self.rows
    }
}

/// Counters kept while rows are extracted
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExtractStats {
    pub rows_read: usize,
    pub rows_accepted: usize,
    pub rows_empty: usize,
    pub rows_failed: usize,
}

/// Single-pass iterator of row batches over an inclusive, 0-based row range
pub struct RowBatches<'a, S: SheetReader> {
    fields: &'a [Field],
    sheet: &'a S,
    next_row: usize,
    last_row: Option<usize>,
    batch_size: usize,
    stats: ExtractStats,
}

impl<'a, S: SheetReader> RowBatches<'a, S> {
    /// `batch_size` must be positive; the controller validates it
    pub(crate) fn new(
        fields: &'a [Field],
        sheet: &'a S,
        first_row: usize,
        last_row: Option<usize>,
        batch_size: usize,
    ) -> Self {
        debug!(first_row, ?last_row, batch_size, "Batching rows");
        Self {
            fields,
            sheet,
            next_row: first_row,
            last_row,
            batch_size,
            stats: ExtractStats::default(),
        }
    }

    pub fn stats(&self) -> ExtractStats {
        self.stats
    }

    /// Build the destination row for one sheet row. `None` means no field
    /// contributed a value.
    fn extract_row(&self, row: usize) -> BcpResult<Option<Vec<DbValue>>> {
        let mut values = vec![DbValue::Null; self.fields.len()];
        let mut inserted = false;
        for field in self.fields {
            inserted |= field.set_data(&mut values, self.sheet.cell(row, field.column_index), row)?;
        }
        Ok(inserted.then_some(values))
    }

    fn has_rows_left(&self) -> bool {
        self.last_row.is_some_and(|last| self.next_row <= last)
    }
}

impl<S: SheetReader> Iterator for RowBatches<'_, S> {
    type Item = RowBatch;

    fn next(&mut self) -> Option<RowBatch> {
        let mut rows = Vec::with_capacity(self.batch_size);

        while rows.len() < self.batch_size && self.has_rows_left() {
            let row = self.next_row;
            self.next_row += 1;
            self.stats.rows_read += 1;

            match self.extract_row(row) {
                Ok(Some(values)) => {
                    self.stats.rows_accepted += 1;
                    rows.push(values);
                }
                Ok(None) => {
                    self.stats.rows_empty += 1;
                    info!("No data in row {}", row + 1);
                }
                Err(e) => {
                    self.stats.rows_failed += 1;
                    error!(row = row + 1, "Error in data row: {}: {}", row + 1, e);
                }
            }
        }

        if rows.is_empty() {
            None
        } else {
            Some(RowBatch::new(rows))
        }
    }
}

impl<S: SheetReader> FusedIterator for RowBatches<'_, S> {}
