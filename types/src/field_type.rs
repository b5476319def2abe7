/// Declared storage type of a record field.
///
/// The materializer uses this to coerce raw backend cells into the value shape
/// callers expect, e.g. SQLite's `0`/`1` into [`Value::Bool`](crate::Value::Bool)
/// or ISO-8601 text into [`Value::Timestamp`](crate::Value::Timestamp).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum FieldType {
    Integer,
    Real,
    Text,
    Boolean,
    Blob,
    Date,
    Timestamp,
}

impl FieldType {
    /// Lowercase name used in diagnostics.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            FieldType::Integer => "integer",
            FieldType::Real => "real",
            FieldType::Text => "text",
            FieldType::Boolean => "boolean",
            FieldType::Blob => "blob",
            FieldType::Date => "date",
            FieldType::Timestamp => "timestamp",
        }
    }

    /// Whether values of this type can be summed or averaged.
    #[must_use]
    pub const fn is_numeric(&self) -> bool {
        matches!(self, FieldType::Integer | FieldType::Real)
    }
}

impl core::fmt::Display for FieldType {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}
