//! rusqlite-backed [`Executor`].

use std::sync::{Mutex, PoisonError};

use quarry_core::{BackendError, CompiledStatement, Executor, Row, RowStream};
use rusqlite::Connection;

use crate::convert::{SqliteParam, value_from_ref};

/// Runs compiled statements on one SQLite connection.
///
/// The connection is guarded by a mutex so the executor can be shared
/// between threads; statements run one at a time.
#[derive(Debug)]
pub struct SqliteExecutor {
    conn: Mutex<Connection>,
}

impl SqliteExecutor {
    pub fn new(conn: Connection) -> Self {
        Self {
            conn: Mutex::new(conn),
        }
    }

    /// Opens a fresh in-memory database.
    pub fn open_in_memory() -> Result<Self, BackendError> {
        Ok(Self::new(Connection::open_in_memory().map_err(BackendError::new)?))
    }

    /// Runs `f` with exclusive access to the connection, e.g. to create tables.
    pub fn with_connection<T>(&self, f: impl FnOnce(&Connection) -> T) -> T {
        let conn = self.conn.lock().unwrap_or_else(PoisonError::into_inner);
        f(&conn)
    }

    pub fn into_inner(self) -> Connection {
        self.conn.into_inner().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Executor for SqliteExecutor {
    fn execute(&self, statement: &CompiledStatement) -> Result<Vec<Row>, BackendError> {
        let conn = self.conn.lock().unwrap_or_else(PoisonError::into_inner);
        let mut stmt = conn.prepare_cached(&statement.sql).map_err(BackendError::new)?;
        let width = stmt.column_count();
        let params = rusqlite::params_from_iter(statement.params.iter().map(SqliteParam));

        let mut rows = stmt.query(params).map_err(BackendError::new)?;
        let mut out = Vec::new();
        while let Some(row) = rows.next().map_err(BackendError::new)? {
            let mut cells = Vec::with_capacity(width);
            for i in 0..width {
                cells.push(value_from_ref(row.get_ref(i).map_err(BackendError::new)?));
            }
            out.push(cells);
        }
        Ok(out)
    }

    /// Reads every row before yielding the first.
    ///
    /// A live rusqlite cursor borrows the connection for as long as it is open,
    /// and streamed queries with batch relations run their follow-up statements
    /// on this same connection between chunks. The base rows are therefore read
    /// up front; records are still materialized and relation-loaded per chunk.
    fn stream(&self, statement: &CompiledStatement) -> Result<RowStream, BackendError> {
        let rows = self.execute(statement)?;
        Ok(Box::new(rows.into_iter().map(Ok)))
    }
}
