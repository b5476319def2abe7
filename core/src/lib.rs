//! Query construction, compilation and materialization engine for quarry.
//!
//! Layers, leaves first:
//!
//! - [`schema`]: the read-only schema descriptor
//! - [`expr`]: expression trees and lookup strings
//! - [`clause`]: the persistent clause set carried by a query
//! - [`sql`] and [`dialect`]: chunked SQL fragments and per-dialect rendering
//! - [`compiler`]: clause set to compiled statement
//! - [`relation`]: join folding and the batch relation loader
//! - [`materialize`] and [`record`]: typed records from raw rows
//! - [`query`] and [`session`]: the lazy query object and its entry point

pub mod clause;
pub mod compiler;
pub mod dialect;
pub mod error;
pub mod executor;
pub mod expr;
pub mod materialize;
pub mod query;
pub mod record;
pub mod relation;
pub mod schema;
pub mod session;
pub mod sql;
#[macro_use]
mod tracing;

pub use clause::{Annotation, ClauseSet, LoadMode, OrderKey, RelationHint, Window};
pub use compiler::{Compiler, SelectPlan};
pub use dialect::{DialectPolicy, policy};
pub use error::{BackendError, QueryError, Result};
pub use executor::{Executor, RecordingExecutor, Row, RowStream};
pub use expr::{ColumnRef, Expr, FieldPath, IntoExpr, LookupArg, col, lit, lookup};
pub use materialize::{Projection, coerce};
pub use query::{QuerySet, RecordStream};
pub use record::{Record, Related, Shape};
pub use schema::{
    FieldDef, Multiplicity, PK_ALIAS, RecordType, RelationInfo, Schema, SchemaBuilder,
    SchemaDescriptor, Through,
};
pub use session::{Session, SessionOptions};
pub use sql::{CompiledStatement, Sql, SqlChunk, Token};

pub use quarry_types::{Dialect, FieldType, Value};

/// Everything needed to declare a schema and build queries.
pub mod prelude {
    pub use crate::expr::{
        avg, coalesce, col, count, count_all, count_distinct, lit, lookup, lower, max, min, sum,
        upper,
    };
    pub use crate::{
        CompiledStatement, Dialect, Expr, FieldType, LoadMode, QueryError, QuerySet, Record,
        RecordType, Related, RelationInfo, Result, Schema, SchemaDescriptor, Session,
        SessionOptions, Value,
    };
}
