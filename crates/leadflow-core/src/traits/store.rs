//! Record store contract — row/column addressed tables with a header row.

use crate::error::{LeadflowError, Result};
use crate::table::Row;

/// An open table. Row 1 is the header; columns are 1-based.
pub trait RecordTable: Send {
    fn name(&self) -> &str;

    /// Column names from row 1.
    fn headers(&self) -> Result<Vec<String>>;

    /// All data rows in row order (row numbers start at 2).
    fn read_all_rows(&self) -> Result<Vec<Row>>;

    /// Overwrite one cell. Durable when this returns.
    fn write_cell(&mut self, row: usize, column: usize, value: &str) -> Result<()>;

    /// Overwrite consecutive rows starting at `starting_row`, positional in header order.
    fn bulk_write(&mut self, rows: &[Vec<String>], starting_row: usize) -> Result<()>;

    /// 1-based position of a named column.
    fn column_index(&self, name: &str) -> Result<usize> {
        self.headers()?
            .iter()
            .position(|h| h == name)
            .map(|i| i + 1)
            .ok_or_else(|| LeadflowError::missing_column(self.name(), name))
    }

    /// Row number just past the last data row.
    fn next_row(&self) -> Result<usize> {
        Ok(self.read_all_rows()?.len() + crate::table::FIRST_DATA_ROW)
    }

    /// Write one cell addressed by column name.
    fn write_named(&mut self, row: usize, column: &str, value: &str) -> Result<()> {
        let index = self.column_index(column)?;
        self.write_cell(row, index, value)
    }

    /// Bulk-write typed rows, serialized in this table's header order.
    fn write_rows(&mut self, rows: &[Row], starting_row: usize) -> Result<()> {
        if rows.is_empty() {
            return Ok(());
        }
        let headers = self.headers()?;
        let values: Vec<Vec<String>> = rows.iter().map(|r| r.to_values(&headers)).collect();
        self.bulk_write(&values, starting_row)
    }
}

/// A durable store holding named tables.
pub trait RecordStore: Send + Sync {
    fn open(&self, table: &str) -> Result<Box<dyn RecordTable>>;

    /// Create the table with `headers` if it does not exist yet.
    fn ensure_table(&self, table: &str, headers: &[String]) -> Result<()>;
}
