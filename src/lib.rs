//! # quarry
//!
//! A lazy query construction and compilation engine: chained, immutable query
//! objects are compiled into one parameterized statement per dialect, executed
//! at most once, and materialized into typed records.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use quarry::prelude::*;
//! use quarry::sqlite::SqliteExecutor;
//!
//! let schema = Schema::builder()
//!     .record(
//!         RecordType::new("customer")
//!             .table("customers")
//!             .field("id", FieldType::Integer)
//!             .field("name", FieldType::Text)
//!             .primary_key("id"),
//!     )
//!     .record(
//!         RecordType::new("order")
//!             .table("orders")
//!             .field("id", FieldType::Integer)
//!             .field("total", FieldType::Integer)
//!             .field("customer_id", FieldType::Integer)
//!             .primary_key("id")
//!             .relation("customer", RelationInfo::many_to_one("customer", "customer_id")),
//!     )
//!     .build()?;
//!
//! let session = Session::new(schema, SqliteExecutor::open_in_memory()?);
//! let orders = session
//!     .query("order")?
//!     .filter(lookup("total__gte", 100))?
//!     .follow_relation("customer", LoadMode::Batch)?
//!     .order_by(["-total"])?;
//!
//! for order in orders.iterate()?.iter() {
//!     let customer = order.one("customer");
//! }
//! ```
//!
//! ## Dialects
//!
//! | Dialect    | Placeholder | Quote | Boolean |
//! |------------|-------------|-------|---------|
//! | SQLite     | `?`         | `"x"` | `1`/`0` |
//! | PostgreSQL | `$n`        | `"x"` | `TRUE`  |
//! | MySQL      | `?`         | `` `x` `` | `TRUE` |

pub use quarry_core::*;

/// Shared value vocabulary.
pub use quarry_types as types;

/// SQLite execution through rusqlite.
#[cfg(feature = "rusqlite")]
pub mod sqlite {
    pub use quarry_sqlite::*;
}

pub mod prelude {
    pub use quarry_core::prelude::*;

    #[cfg(feature = "rusqlite")]
    pub use quarry_sqlite::SqliteExecutor;
}
