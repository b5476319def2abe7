//! Entry point tying a schema, an executor and runtime options together.

use std::sync::Arc;

use quarry_types::Dialect;

use crate::compiler::Compiler;
use crate::error::Result;
use crate::executor::Executor;
use crate::query::QuerySet;
use crate::schema::{SchemaDescriptor, require};

/// Runtime options of a [`Session`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionOptions {
    /// Dialect every statement is rendered for.
    pub dialect: Dialect,
    /// Base rows read per chunk when streaming with batch relations.
    pub stream_chunk_size: usize,
    /// Row cap of an unsliced `get()`; the observed count is reported up to this bound.
    pub max_get_results: u64,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            dialect: Dialect::SQLite,
            stream_chunk_size: 2000,
            max_get_results: 21,
        }
    }
}

/// Shared handle used to start queries.
///
/// Cloning is cheap; clones share the schema and the executor.
///
/// ```ignore
/// let session = Session::new(schema, executor).with_dialect(Dialect::PostgreSQL);
/// let big = session.query("order")?.filter(lookup("total__gte", 100))?;
/// ```
#[derive(Clone)]
pub struct Session {
    schema: Arc<dyn SchemaDescriptor>,
    executor: Arc<dyn Executor>,
    options: SessionOptions,
}

impl Session {
    pub fn new<S, E>(schema: S, executor: E) -> Self
    where
        S: SchemaDescriptor + 'static,
        E: Executor + 'static,
    {
        Self::from_shared(Arc::new(schema), Arc::new(executor))
    }

    pub fn from_shared(schema: Arc<dyn SchemaDescriptor>, executor: Arc<dyn Executor>) -> Self {
        Self {
            schema,
            executor,
            options: SessionOptions::default(),
        }
    }

    // ==================== options ====================

    pub fn with_options(mut self, options: SessionOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_dialect(mut self, dialect: Dialect) -> Self {
        self.options.dialect = dialect;
        self
    }

    pub fn with_stream_chunk_size(mut self, size: usize) -> Self {
        self.options.stream_chunk_size = size.max(1);
        self
    }

    pub fn with_max_get_results(mut self, max: u64) -> Self {
        self.options.max_get_results = max.max(2);
        self
    }

    pub fn options(&self) -> &SessionOptions {
        &self.options
    }

    pub fn dialect(&self) -> Dialect {
        self.options.dialect
    }

    pub fn schema(&self) -> &dyn SchemaDescriptor {
        &*self.schema
    }

    pub fn executor(&self) -> &dyn Executor {
        &*self.executor
    }

    // ==================== queries ====================

    /// Starts an unfiltered query over `record_type`.
    pub fn query(&self, record_type: &str) -> Result<QuerySet> {
        let record = require(&*self.schema, record_type)?;
        Ok(QuerySet::new(self.clone(), record.name().into()))
    }

    pub(crate) fn compiler(&self, record_type: &str) -> Result<Compiler<'_>> {
        Compiler::new(&*self.schema, record_type, self.options.dialect)
    }
}

impl core::fmt::Debug for Session {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Session")
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}
