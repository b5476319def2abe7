//! Tracing utilities for statement and cache observability.
//!
//! Enable the `tracing` feature to emit events via the `tracing` crate.
//! These macros no-op when the feature is disabled, avoiding `#[cfg]` boilerplate
//! at every call site.

/// Emit a debug-level tracing event with the dialect, SQL text and parameter count.
///
/// ```ignore
/// quarry_trace_query!(&statement);
/// ```
#[macro_export]
macro_rules! quarry_trace_query {
    ($stmt:expr) => {
        #[cfg(feature = "tracing")]
        ::tracing::debug!(
            dialect = %$stmt.dialect,
            sql = %$stmt.sql,
            params = $stmt.params.len(),
            "quarry.query"
        );
    };
}

/// Emit a trace-level event for eager cache lookups.
///
/// ```ignore
/// quarry_trace_cache!("hit", "order");
/// ```
#[macro_export]
macro_rules! quarry_trace_cache {
    ($event:literal, $record_type:expr) => {
        #[cfg(feature = "tracing")]
        ::tracing::trace!(event = $event, record_type = %$record_type, "quarry.cache");
    };
}

/// Emit a debug-level event when a batch relation path is resolved.
///
/// ```ignore
/// quarry_trace_batch!("customer", keys.len());
/// ```
#[macro_export]
macro_rules! quarry_trace_batch {
    ($path:expr, $keys:expr) => {
        #[cfg(feature = "tracing")]
        ::tracing::debug!(path = %$path, keys = $keys, "quarry.batch");
    };
}
