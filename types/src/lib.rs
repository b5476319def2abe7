//! Shared type definitions for quarry
//!
//! This crate provides the value-level vocabulary shared by the query engine
//! and its drivers:
//!
//! - [`Dialect`] - Database dialect enum (SQLite, PostgreSQL, MySQL)
//! - [`Value`] - A dynamically typed backend value, used for parameters and row cells
//! - [`FieldType`] - The declared storage type of a record field
//!
//! # Features
//!
//! - `std` - Standard library support (enabled by default)
//! - `serde` - Enable serde serialization/deserialization

mod dialect;
mod field_type;
mod value;

pub use dialect::{Dialect, DialectParseError};
pub use field_type::FieldType;
pub use value::Value;

/// Prelude module for commonly used types
pub mod prelude {
    pub use crate::{Dialect, FieldType, Value};
}
