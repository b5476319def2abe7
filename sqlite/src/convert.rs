//! Conversions between [`Value`] and rusqlite's value types.

use rusqlite::ToSql;
use rusqlite::types::{ToSqlOutput, ValueRef};

use quarry_types::Value;

const DATE_FORMAT: &str = "%Y-%m-%d";
const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f";

/// Binds a [`Value`] as a statement parameter.
///
/// SQLite has no boolean, date or timestamp storage class: booleans bind as
/// `0`/`1` and temporal values as ISO-8601 text.
#[derive(Debug, Clone, Copy)]
pub struct SqliteParam<'a>(pub &'a Value);

impl ToSql for SqliteParam<'_> {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self.0 {
            Value::Null => ToSqlOutput::Owned(rusqlite::types::Value::Null),
            Value::Bool(b) => ToSqlOutput::Owned(rusqlite::types::Value::Integer(i64::from(*b))),
            Value::Integer(i) => ToSqlOutput::Owned(rusqlite::types::Value::Integer(*i)),
            Value::Real(r) => ToSqlOutput::Owned(rusqlite::types::Value::Real(*r)),
            Value::Text(s) => ToSqlOutput::Borrowed(ValueRef::Text(s.as_bytes())),
            Value::Blob(b) => ToSqlOutput::Borrowed(ValueRef::Blob(b)),
            Value::Date(d) => ToSqlOutput::Owned(rusqlite::types::Value::Text(
                d.format(DATE_FORMAT).to_string(),
            )),
            Value::Timestamp(ts) => ToSqlOutput::Owned(rusqlite::types::Value::Text(
                ts.format(TIMESTAMP_FORMAT).to_string(),
            )),
        })
    }
}

/// Reads one result cell. Invalid UTF-8 text is replaced lossily.
pub fn value_from_ref(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::Integer(i),
        ValueRef::Real(r) => Value::Real(r),
        ValueRef::Text(items) => match core::str::from_utf8(items) {
            Ok(s) => Value::Text(s.into()),
            Err(_) => Value::Text(String::from_utf8_lossy(items).as_ref().into()),
        },
        ValueRef::Blob(items) => Value::Blob(items.to_vec()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn test_temporal_params_bind_as_text() {
        let date = Value::Date(NaiveDate::from_ymd_opt(2024, 2, 29).unwrap());
        let param = SqliteParam(&date);
        assert_eq!(
            param.to_sql().unwrap(),
            ToSqlOutput::Owned(rusqlite::types::Value::Text("2024-02-29".into()))
        );

        let flag = Value::Bool(true);
        let param = SqliteParam(&flag);
        assert_eq!(
            param.to_sql().unwrap(),
            ToSqlOutput::Owned(rusqlite::types::Value::Integer(1))
        );
    }

    #[test]
    fn test_value_from_ref() {
        assert_eq!(value_from_ref(ValueRef::Null), Value::Null);
        assert_eq!(value_from_ref(ValueRef::Text(b"Bob")), Value::Text("Bob".into()));
        assert_eq!(value_from_ref(ValueRef::Blob(&[1, 2])), Value::Blob(vec![1, 2]));
    }
}
