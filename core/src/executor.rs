//! Execution interface consumed by the engine.
//!
//! Drivers implement [`Executor`]; the engine hands them fully rendered
//! statements and receives rows of [`Value`]s in select-list order.

use std::sync::{Arc, Mutex, PoisonError};

use quarry_types::Value;

use crate::error::{BackendError, Result};
use crate::sql::CompiledStatement;

/// One result row, cells in select-list order.
pub type Row = Vec<Value>;

/// Single-pass row iterator returned by [`Executor::stream`].
pub type RowStream = Box<dyn Iterator<Item = std::result::Result<Row, BackendError>> + Send>;

/// Runs compiled statements against a backend.
///
/// Failures are opaque to the engine and are never retried.
pub trait Executor: Send + Sync {
    fn execute(&self, statement: &CompiledStatement) -> std::result::Result<Vec<Row>, BackendError>;

    /// Rows of `statement` as an iterator. Defaults to buffering [`execute`](Self::execute).
    fn stream(&self, statement: &CompiledStatement) -> std::result::Result<RowStream, BackendError> {
        let rows = self.execute(statement)?;
        Ok(Box::new(rows.into_iter().map(Ok)))
    }
}

impl<E: Executor + ?Sized> Executor for Arc<E> {
    fn execute(&self, statement: &CompiledStatement) -> std::result::Result<Vec<Row>, BackendError> {
        (**self).execute(statement)
    }

    fn stream(&self, statement: &CompiledStatement) -> std::result::Result<RowStream, BackendError> {
        (**self).stream(statement)
    }
}

impl<E: Executor + ?Sized> Executor for &E {
    fn execute(&self, statement: &CompiledStatement) -> std::result::Result<Vec<Row>, BackendError> {
        (**self).execute(statement)
    }

    fn stream(&self, statement: &CompiledStatement) -> std::result::Result<RowStream, BackendError> {
        (**self).stream(statement)
    }
}

/// Executes `statement`, tracing it first.
pub(crate) fn run(executor: &dyn Executor, statement: &CompiledStatement) -> Result<Vec<Row>> {
    crate::quarry_trace_query!(statement);
    Ok(executor.execute(statement)?)
}

/// Streams `statement`, tracing it first.
pub(crate) fn run_stream(executor: &dyn Executor, statement: &CompiledStatement) -> Result<RowStream> {
    crate::quarry_trace_query!(statement);
    Ok(executor.stream(statement)?)
}

// =============================================================================
// Recording wrapper
// =============================================================================

/// Wraps an executor and keeps every statement it is asked to run.
///
/// ```ignore
/// let recorder = Arc::new(RecordingExecutor::new(conn));
/// let session = Session::new(schema, Arc::clone(&recorder));
/// // ...
/// assert_eq!(recorder.count(), 2);
/// ```
#[derive(Debug, Default)]
pub struct RecordingExecutor<E> {
    inner: E,
    statements: Mutex<Vec<CompiledStatement>>,
}

impl<E> RecordingExecutor<E> {
    pub fn new(inner: E) -> Self {
        Self {
            inner,
            statements: Mutex::new(Vec::new()),
        }
    }

    pub fn inner(&self) -> &E {
        &self.inner
    }

    /// Statements seen so far, in execution order.
    pub fn statements(&self) -> Vec<CompiledStatement> {
        self.statements
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn count(&self) -> usize {
        self.statements
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn clear(&self) {
        self.statements
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    fn record(&self, statement: &CompiledStatement) {
        self.statements
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(statement.clone());
    }
}

impl<E: Executor> Executor for RecordingExecutor<E> {
    fn execute(&self, statement: &CompiledStatement) -> std::result::Result<Vec<Row>, BackendError> {
        self.record(statement);
        self.inner.execute(statement)
    }

    fn stream(&self, statement: &CompiledStatement) -> std::result::Result<RowStream, BackendError> {
        self.record(statement);
        self.inner.stream(statement)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quarry_types::Dialect;

    struct Fixed(Vec<Row>);

    impl Executor for Fixed {
        fn execute(&self, _: &CompiledStatement) -> std::result::Result<Vec<Row>, BackendError> {
            Ok(self.0.clone())
        }
    }

    fn statement(sql: &str) -> CompiledStatement {
        CompiledStatement {
            dialect: Dialect::SQLite,
            sql: sql.into(),
            params: Vec::new(),
        }
    }

    #[test]
    fn test_recording_executor_counts_statements() {
        let recorder = Arc::new(RecordingExecutor::new(Fixed(vec![vec![Value::Integer(1)]])));
        let shared: Arc<dyn Executor> = Arc::clone(&recorder) as Arc<dyn Executor>;

        shared.execute(&statement("SELECT 1")).unwrap();
        let streamed: Vec<_> = shared.stream(&statement("SELECT 2")).unwrap().collect();

        assert_eq!(streamed.len(), 1);
        assert_eq!(recorder.count(), 2);
        assert_eq!(recorder.statements()[1].sql, "SELECT 2");
        recorder.clear();
        assert_eq!(recorder.count(), 0);
    }
}
