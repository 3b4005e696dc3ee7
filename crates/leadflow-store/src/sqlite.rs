//! SQLite-backed record store.
//! Each table is stored cell-by-cell so header-addressed, spreadsheet-style
//! reads and writes map directly onto rows of one `cells` table.

use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

use leadflow_core::error::{LeadflowError, Result};
use leadflow_core::table::Row;
use leadflow_core::traits::{RecordStore, RecordTable};
use rusqlite::{Connection, params};

#[derive(Clone)]
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Open or create the store database.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path).map_err(|e| store_err("DB open", e))?;
        Self::from_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(|e| store_err("DB open", e))?;
        Self::from_connection(conn)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        store.migrate()?;
        Ok(store)
    }

    /// Run migrations to create tables.
    fn migrate(&self) -> Result<()> {
        lock(&self.conn)?
            .execute_batch(
                "
            PRAGMA synchronous = FULL;

            -- One row per written cell; row 1 of every sheet is its header
            CREATE TABLE IF NOT EXISTS cells (
                sheet TEXT NOT NULL,
                row_num INTEGER NOT NULL,
                col_num INTEGER NOT NULL,
                value TEXT NOT NULL DEFAULT '',
                PRIMARY KEY (sheet, row_num, col_num)
            );
         ",
            )
            .map_err(|e| store_err("Migration", e))
    }

    fn has_header(conn: &Connection, sheet: &str) -> Result<bool> {
        conn.query_row(
            "SELECT COUNT(*) FROM cells WHERE sheet = ?1 AND row_num = 1",
            [sheet],
            |r| r.get::<_, i64>(0),
        )
        .map(|n| n > 0)
        .map_err(|e| store_err("Header lookup", e))
    }
}

impl RecordStore for SqliteStore {
    fn open(&self, table: &str) -> Result<Box<dyn RecordTable>> {
        let conn = lock(&self.conn)?;
        if !Self::has_header(&conn, table)? {
            return Err(LeadflowError::Store(format!("Table '{table}' not found")));
        }
        drop(conn);
        Ok(Box::new(SqliteTable {
            name: table.to_string(),
            conn: Arc::clone(&self.conn),
        }))
    }

    fn ensure_table(&self, table: &str, headers: &[String]) -> Result<()> {
        let mut conn = lock(&self.conn)?;
        if Self::has_header(&conn, table)? {
            return Ok(());
        }
        let tx = conn.transaction().map_err(|e| store_err("Begin", e))?;
        for (i, header) in headers.iter().enumerate() {
            tx.execute(
                "INSERT OR REPLACE INTO cells (sheet, row_num, col_num, value) VALUES (?1, 1, ?2, ?3)",
                params![table, (i + 1) as i64, header],
            )
            .map_err(|e| store_err("Write header", e))?;
        }
        tx.commit().map_err(|e| store_err("Commit", e))?;
        tracing::info!("🗂️ Created table '{}' with {} columns", table, headers.len());
        Ok(())
    }
}

struct SqliteTable {
    name: String,
    conn: Arc<Mutex<Connection>>,
}

impl SqliteTable {
    /// `(row, col, value)` for every stored cell of this sheet in row-major order.
    fn cells(&self, header_only: bool) -> Result<Vec<(usize, usize, String)>> {
        let conn = lock(&self.conn)?;
        let sql = if header_only {
            "SELECT row_num, col_num, value FROM cells WHERE sheet = ?1 AND row_num = 1 ORDER BY col_num"
        } else {
            "SELECT row_num, col_num, value FROM cells WHERE sheet = ?1 AND row_num > 1 ORDER BY row_num, col_num"
        };
        let mut stmt = conn.prepare(sql).map_err(|e| store_err("Prepare", e))?;
        let rows = stmt
            .query_map([self.name.as_str()], |row| {
                Ok((
                    row.get::<_, i64>(0)? as usize,
                    row.get::<_, i64>(1)? as usize,
                    row.get::<_, String>(2)?,
                ))
            })
            .map_err(|e| store_err("Read cells", e))?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .map_err(|e| store_err("Read cells", e))
    }
}

impl RecordTable for SqliteTable {
    fn name(&self) -> &str {
        &self.name
    }

    fn headers(&self) -> Result<Vec<String>> {
        let mut headers = Vec::new();
        for (_, col, value) in self.cells(true)? {
            if headers.len() < col {
                headers.resize(col, String::new());
            }
            headers[col - 1] = value;
        }
        Ok(headers)
    }

    fn read_all_rows(&self) -> Result<Vec<Row>> {
        let headers = self.headers()?;
        let mut grid: Vec<Vec<String>> = Vec::new();
        for (row, col, value) in self.cells(false)? {
            let index = row - 2;
            if grid.len() <= index {
                grid.resize_with(index + 1, Vec::new);
            }
            let cells = &mut grid[index];
            if cells.len() < col {
                cells.resize(col, String::new());
            }
            cells[col - 1] = value;
        }
        Ok(grid
            .iter()
            .enumerate()
            .map(|(i, values)| Row::from_values(i + 2, &headers, values))
            .collect())
    }

    fn write_cell(&mut self, row: usize, column: usize, value: &str) -> Result<()> {
        if row == 0 || column == 0 {
            return Err(LeadflowError::Store(format!(
                "Cell ({row}, {column}) is out of range; rows and columns are 1-based"
            )));
        }
        // Autocommit: durable as soon as execute returns.
        lock(&self.conn)?
            .execute(
                "INSERT OR REPLACE INTO cells (sheet, row_num, col_num, value) VALUES (?1, ?2, ?3, ?4)",
                params![self.name, row as i64, column as i64, value],
            )
            .map_err(|e| store_err("Write cell", e))?;
        Ok(())
    }

    fn bulk_write(&mut self, rows: &[Vec<String>], starting_row: usize) -> Result<()> {
        if starting_row == 0 {
            return Err(LeadflowError::Store("Rows are 1-based".into()));
        }
        let mut conn = lock(&self.conn)?;
        let tx = conn.transaction().map_err(|e| store_err("Begin", e))?;
        {
            let mut stmt = tx
                .prepare(
                    "INSERT OR REPLACE INTO cells (sheet, row_num, col_num, value) VALUES (?1, ?2, ?3, ?4)",
                )
                .map_err(|e| store_err("Prepare", e))?;
            for (offset, values) in rows.iter().enumerate() {
                let row = (starting_row + offset) as i64;
                for (col, value) in values.iter().enumerate() {
                    stmt.execute(params![self.name, row, (col + 1) as i64, value])
                        .map_err(|e| store_err("Bulk write", e))?;
                }
            }
        }
        tx.commit().map_err(|e| store_err("Commit", e))?;
        tracing::debug!(
            "💾 Wrote {} rows to '{}' from row {}",
            rows.len(),
            self.name,
            starting_row
        );
        Ok(())
    }
}

fn lock(conn: &Mutex<Connection>) -> Result<MutexGuard<'_, Connection>> {
    conn.lock()
        .map_err(|e| LeadflowError::Store(format!("Connection poisoned: {e}")))
}

fn store_err(context: &str, e: rusqlite::Error) -> LeadflowError {
    LeadflowError::Store(format!("{context}: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers() -> Vec<String> {
        vec!["Message".into(), "Recipient".into(), "DateTimeSent".into()]
    }

    #[test]
    fn test_open_requires_header() {
        let store = SqliteStore::open_in_memory().unwrap();
        assert!(store.open("Message Queue").is_err());
        store.ensure_table("Message Queue", &headers()).unwrap();
        let table = store.open("Message Queue").unwrap();
        assert_eq!(table.headers().unwrap(), headers());
        assert!(table.read_all_rows().unwrap().is_empty());
        assert_eq!(table.next_row().unwrap(), 2);
    }

    #[test]
    fn test_bulk_write_then_cell_update() {
        let store = SqliteStore::open_in_memory().unwrap();
        store.ensure_table("Q", &headers()).unwrap();
        let mut table = store.open("Q").unwrap();
        table
            .bulk_write(
                &[
                    vec!["Hi".into(), "5551".into()],
                    vec!["Yo".into(), "5552".into()],
                ],
                2,
            )
            .unwrap();
        let col = table.column_index("DateTimeSent").unwrap();
        assert_eq!(col, 3);
        table.write_cell(3, col, "01/01/2024 10:00:00").unwrap();

        let rows = table.read_all_rows().unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].number, 2);
        assert_eq!(rows[0].get("DateTimeSent"), "");
        assert_eq!(rows[1].get("Recipient"), "5552");
        assert_eq!(rows[1].get("DateTimeSent"), "01/01/2024 10:00:00");
    }

    #[test]
    fn test_survives_reopen() {
        let dir = std::env::temp_dir().join("leadflow-store-reopen-test");
        std::fs::remove_dir_all(&dir).ok();
        let path = dir.join("store.db");
        {
            let store = SqliteStore::open(&path).unwrap();
            store.ensure_table("Q", &headers()).unwrap();
            let mut table = store.open("Q").unwrap();
            table.write_named(2, "Message", "persisted").unwrap();
        }
        let store = SqliteStore::open(&path).unwrap();
        let rows = store.open("Q").unwrap().read_all_rows().unwrap();
        assert_eq!(rows[0].get("Message"), "persisted");
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_rejects_zero_index() {
        let store = SqliteStore::open_in_memory().unwrap();
        store.ensure_table("Q", &headers()).unwrap();
        let mut table = store.open("Q").unwrap();
        assert!(table.write_cell(0, 1, "x").is_err());
        assert!(table.bulk_write(&[], 0).is_err());
    }
}
