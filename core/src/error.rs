use compact_str::CompactString;
use quarry_types::Value;
use thiserror::Error;

/// Opaque failure reported by an execution interface.
///
/// The engine never inspects or retries these; it only carries them back to the
/// call that triggered execution. The original error stays reachable through
/// [`std::error::Error::source`].
#[derive(Debug)]
pub struct BackendError(Box<dyn std::error::Error + Send + Sync + 'static>);

impl BackendError {
    /// Wraps any driver error.
    pub fn new<E>(error: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self(Box::new(error))
    }

    /// Builds a backend error from a plain message.
    pub fn message(message: impl Into<String>) -> Self {
        Self(message.into().into())
    }

    /// Returns the wrapped driver error.
    pub fn inner(&self) -> &(dyn std::error::Error + Send + Sync + 'static) {
        &*self.0
    }

    /// Attempts to downcast to the driver's concrete error type.
    pub fn downcast_ref<E: std::error::Error + 'static>(&self) -> Option<&E> {
        self.0.downcast_ref::<E>()
    }
}

impl core::fmt::Display for BackendError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

impl std::error::Error for BackendError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.0.source()
    }
}

#[derive(Debug, Error)]
pub enum QueryError {
    /// A column or annotation path could not be resolved
    #[error("cannot resolve `{path}` on record type `{record_type}`")]
    FieldReference {
        path: CompactString,
        record_type: CompactString,
    },

    /// An annotation name clashes with a field or an earlier annotation
    #[error("annotation `{name}` conflicts with a field or annotation of `{record_type}`")]
    AnnotationCollision {
        name: CompactString,
        record_type: CompactString,
    },

    /// `get()` matched no rows
    #[error("no `{record_type}` matches {predicate}")]
    NotFound {
        record_type: CompactString,
        predicate: String,
    },

    /// `get()` matched more than one row
    #[error("{count} `{record_type}` rows match {predicate}, expected exactly one")]
    MultipleResults {
        record_type: CompactString,
        predicate: String,
        /// Number of rows observed (bounded by the fetch window).
        count: usize,
    },

    /// A raw cell could not be coerced to the declared field type
    #[error("cannot materialize `{record_type}.{field}` from {} value {raw}", .raw.kind())]
    Materialization {
        record_type: CompactString,
        field: CompactString,
        raw: Value,
    },

    /// The execution interface failed; passed through unchanged
    #[error("backend execution failed: {0}")]
    Backend(#[from] BackendError),

    /// The requested record type is not registered
    #[error("unknown record type `{name}`")]
    UnknownRecordType { name: CompactString },

    /// The schema descriptor failed validation while being built
    #[error("invalid schema: {0}")]
    InvalidSchema(String),

    /// The clause combination cannot be expressed
    #[error("invalid query on `{record_type}`: {reason}")]
    InvalidQuery {
        record_type: CompactString,
        reason: String,
    },
}

impl QueryError {
    pub(crate) fn field_reference(path: impl AsRef<str>, record_type: impl AsRef<str>) -> Self {
        QueryError::FieldReference {
            path: CompactString::from(path.as_ref()),
            record_type: CompactString::from(record_type.as_ref()),
        }
    }

    pub(crate) fn invalid_query(record_type: impl AsRef<str>, reason: impl Into<String>) -> Self {
        QueryError::InvalidQuery {
            record_type: CompactString::from(record_type.as_ref()),
            reason: reason.into(),
        }
    }
}

/// Result type for query operations
pub type Result<T> = std::result::Result<T, QueryError>;
