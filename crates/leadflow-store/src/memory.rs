//! In-memory record store. Every table handle shares the same sheets, so
//! writes through one handle are visible to all others immediately.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use leadflow_core::error::{LeadflowError, Result};
use leadflow_core::table::Row;
use leadflow_core::traits::{RecordStore, RecordTable};

/// Sheet name → rows (index 0 is the header row).
type Sheets = HashMap<String, Vec<Vec<String>>>;

#[derive(Debug, Default)]
struct Inner {
    sheets: Sheets,
    writes: usize,
}

#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<Inner>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create (or replace) a table with headers and data rows.
    pub fn put_table(&self, table: &str, headers: &[String], rows: Vec<Vec<String>>) {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        let mut sheet = vec![headers.to_vec()];
        sheet.extend(rows);
        inner.sheets.insert(table.to_string(), sheet);
    }

    /// Raw copy of a table including its header row.
    pub fn snapshot(&self, table: &str) -> Vec<Vec<String>> {
        lock(&self.inner)
            .map(|inner| inner.sheets.get(table).cloned().unwrap_or_default())
            .unwrap_or_default()
    }

    /// Number of write operations (cell or bulk) performed so far.
    pub fn write_count(&self) -> usize {
        lock(&self.inner).map(|inner| inner.writes).unwrap_or(0)
    }
}

impl RecordStore for MemoryStore {
    fn open(&self, table: &str) -> Result<Box<dyn RecordTable>> {
        let inner = lock(&self.inner)?;
        if !inner.sheets.contains_key(table) {
            return Err(LeadflowError::Store(format!("Table '{table}' not found")));
        }
        Ok(Box::new(MemoryTable {
            name: table.to_string(),
            inner: Arc::clone(&self.inner),
        }))
    }

    fn ensure_table(&self, table: &str, headers: &[String]) -> Result<()> {
        let mut inner = lock(&self.inner)?;
        inner
            .sheets
            .entry(table.to_string())
            .or_insert_with(|| vec![headers.to_vec()]);
        Ok(())
    }
}

struct MemoryTable {
    name: String,
    inner: Arc<Mutex<Inner>>,
}

impl MemoryTable {
    fn with_sheet<T>(&self, f: impl FnOnce(&mut Vec<Vec<String>>) -> T) -> Result<T> {
        let mut inner = lock(&self.inner)?;
        let sheet = inner
            .sheets
            .get_mut(&self.name)
            .ok_or_else(|| LeadflowError::Store(format!("Table '{}' was dropped", self.name)))?;
        Ok(f(sheet))
    }
}

impl RecordTable for MemoryTable {
    fn name(&self) -> &str {
        &self.name
    }

    fn headers(&self) -> Result<Vec<String>> {
        self.with_sheet(|sheet| sheet.first().cloned().unwrap_or_default())
    }

    fn read_all_rows(&self) -> Result<Vec<Row>> {
        self.with_sheet(|sheet| {
            let headers = sheet.first().cloned().unwrap_or_default();
            sheet
                .iter()
                .enumerate()
                .skip(1)
                .map(|(i, values)| Row::from_values(i + 1, &headers, values))
                .collect()
        })
    }

    fn write_cell(&mut self, row: usize, column: usize, value: &str) -> Result<()> {
        if row == 0 || column == 0 {
            return Err(LeadflowError::Store(format!(
                "Cell ({row}, {column}) is out of range; rows and columns are 1-based"
            )));
        }
        self.with_sheet(|sheet| set_cell(sheet, row, column, value))?;
        lock(&self.inner)?.writes += 1;
        Ok(())
    }

    fn bulk_write(&mut self, rows: &[Vec<String>], starting_row: usize) -> Result<()> {
        if starting_row == 0 {
            return Err(LeadflowError::Store("Rows are 1-based".into()));
        }
        self.with_sheet(|sheet| {
            for (offset, values) in rows.iter().enumerate() {
                for (col, value) in values.iter().enumerate() {
                    set_cell(sheet, starting_row + offset, col + 1, value);
                }
            }
        })?;
        lock(&self.inner)?.writes += 1;
        Ok(())
    }
}

fn set_cell(sheet: &mut Vec<Vec<String>>, row: usize, column: usize, value: &str) {
    if sheet.len() < row {
        sheet.resize_with(row, Vec::new);
    }
    let cells = &mut sheet[row - 1];
    if cells.len() < column {
        cells.resize(column, String::new());
    }
    cells[column - 1] = value.to_string();
}

fn lock(inner: &Mutex<Inner>) -> Result<MutexGuard<'_, Inner>> {
    inner
        .lock()
        .map_err(|e| LeadflowError::Store(format!("Memory store poisoned: {e}")))
}
