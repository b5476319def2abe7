//! SQLite execution for quarry.
//!
//! Provides [`SqliteExecutor`], an [`Executor`](quarry_core::Executor) backed
//! by a `rusqlite` connection, and the value conversions it relies on.
//!
//! ```ignore
//! let conn = rusqlite::Connection::open_in_memory()?;
//! let session = Session::new(schema, SqliteExecutor::new(conn));
//! ```

#[cfg(feature = "rusqlite")]
mod convert;
#[cfg(feature = "rusqlite")]
mod executor;

#[cfg(feature = "rusqlite")]
pub use convert::{SqliteParam, value_from_ref};
#[cfg(feature = "rusqlite")]
pub use executor::SqliteExecutor;
