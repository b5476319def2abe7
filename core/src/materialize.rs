//! Row to record conversion.

use std::sync::Arc;

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime};
use compact_str::{CompactString, ToCompactString};
use quarry_types::{FieldType, Value};

use crate::error::{QueryError, Result};
use crate::record::{Record, Related, Shape};

/// One output column of a record.
#[derive(Debug, Clone)]
pub(crate) struct Slot {
    /// Declared or inferred type; `None` passes the raw value through.
    pub ty: Option<FieldType>,
    pub nullable: bool,
}

/// Column layout of one record within a row.
#[derive(Debug, Clone)]
pub(crate) struct Layout {
    pub shape: Arc<Shape>,
    pub slots: Vec<Slot>,
}

impl Layout {
    fn read(&self, cells: &mut impl Iterator<Item = Value>) -> Result<Record> {
        let mut values = Vec::with_capacity(self.slots.len());
        for (i, slot) in self.slots.iter().enumerate() {
            // A row narrower than the layout has no cell for this field.
            let raw = cells.next().ok_or_else(|| self.fail(i, Value::Null))?;
            values.push(coerce_slot(slot, raw).map_err(|raw| self.fail(i, raw))?);
        }
        Ok(Record::new(Arc::clone(&self.shape), values))
    }

    fn fail(&self, index: usize, raw: Value) -> QueryError {
        materialization_error(self.shape.record_type(), &self.shape.names()[index], raw)
    }
}

/// Trailing relation key of a many-to-many batch row, named by its junction column.
#[derive(Debug, Clone)]
pub(crate) struct KeySlot {
    pub column: CompactString,
    pub slot: Slot,
}

fn coerce_slot(slot: &Slot, raw: Value) -> std::result::Result<Value, Value> {
    if raw.is_null() {
        return if slot.nullable { Ok(raw) } else { Err(raw) };
    }
    match slot.ty {
        Some(ty) => coerce(ty, raw),
        None => Ok(raw),
    }
}

fn materialization_error(record_type: &str, field: &str, raw: Value) -> QueryError {
    QueryError::Materialization {
        record_type: record_type.into(),
        field: field.into(),
        raw,
    }
}

/// A record reached through a join in the same statement.
#[derive(Debug, Clone)]
pub(crate) struct JoinedLayout {
    /// Relation field name on the parent record.
    pub name: CompactString,
    /// Index of the parent in `Projection::joined`; `None` for the root record.
    pub parent: Option<usize>,
    pub layout: Layout,
}

/// How to read every row of one compiled statement.
#[derive(Debug, Clone)]
pub struct Projection {
    pub(crate) root: Layout,
    pub(crate) joined: Vec<JoinedLayout>,
    /// Trailing relation key column of a many-to-many batch statement.
    pub(crate) key: Option<KeySlot>,
}

impl Projection {
    pub(crate) fn new(root: Layout) -> Self {
        Self {
            root,
            joined: Vec::new(),
            key: None,
        }
    }

    pub fn shape(&self) -> &Shape {
        &self.root.shape
    }

    /// Builds the root record and its joined relations from one row.
    pub(crate) fn read(&self, row: Vec<Value>) -> Result<(Record, Option<Value>)> {
        let mut cells = row.into_iter();
        let mut root = self.root.read(&mut cells)?;

        let mut joined: Vec<Option<Record>> = Vec::with_capacity(self.joined.len());
        for join in &self.joined {
            let width = join.layout.slots.len();
            let cells_here: Vec<Value> = cells.by_ref().take(width).collect();
            if cells_here.len() < width {
                return Err(join.layout.fail(cells_here.len(), Value::Null));
            }
            // A LEFT JOIN miss leaves the target key NULL.
            let missed = join
                .layout
                .shape
                .pk_index()
                .is_some_and(|pk| cells_here.get(pk).is_none_or(Value::is_null));
            if missed {
                joined.push(None);
            } else {
                joined.push(Some(join.layout.read(&mut cells_here.into_iter())?));
            }
        }

        let key = match &self.key {
            Some(key) => {
                let record_type = self.root.shape.record_type();
                let raw = cells
                    .next()
                    .ok_or_else(|| materialization_error(record_type, &key.column, Value::Null))?;
                let value = coerce_slot(&key.slot, raw)
                    .map_err(|raw| materialization_error(record_type, &key.column, raw))?;
                Some(value)
            }
            None => None,
        };

        // Children follow their parents, so attach from the back.
        for (i, join) in self.joined.iter().enumerate().rev() {
            let related = Related::One(joined[i].take().map(Box::new));
            match join.parent {
                Some(parent) => {
                    if let Some(parent) = joined[parent].as_mut() {
                        parent.set_related(&join.name, related);
                    }
                }
                None => root.set_related(&join.name, related),
            }
        }

        Ok((root, key))
    }
}

// =============================================================================
// Coercion
// =============================================================================

const TIMESTAMP_FORMATS: [&str; 2] = ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"];
const DATE_FORMAT: &str = "%Y-%m-%d";

/// Converts a non-NULL raw value to `ty`, handing the value back on failure.
pub fn coerce(ty: FieldType, raw: Value) -> std::result::Result<Value, Value> {
    match (ty, raw) {
        (FieldType::Integer, v @ Value::Integer(_)) => Ok(v),
        (FieldType::Integer, Value::Bool(b)) => Ok(Value::Integer(i64::from(b))),
        (FieldType::Integer, Value::Real(r))
            if r.fract() == 0.0 && r >= i64::MIN as f64 && r <= i64::MAX as f64 =>
        {
            Ok(Value::Integer(r as i64))
        }
        (FieldType::Integer, Value::Text(s)) => match s.trim().parse::<i64>() {
            Ok(i) => Ok(Value::Integer(i)),
            Err(_) => Err(Value::Text(s)),
        },

        (FieldType::Real, v @ Value::Real(_)) => Ok(v),
        (FieldType::Real, Value::Integer(i)) => Ok(Value::Real(i as f64)),
        (FieldType::Real, Value::Text(s)) => match s.trim().parse::<f64>() {
            Ok(r) => Ok(Value::Real(r)),
            Err(_) => Err(Value::Text(s)),
        },

        (FieldType::Text, v @ Value::Text(_)) => Ok(v),
        (FieldType::Text, Value::Integer(i)) => Ok(Value::Text(i.to_compact_string())),
        (FieldType::Text, Value::Real(r)) => Ok(Value::Text(r.to_compact_string())),

        (FieldType::Boolean, v @ Value::Bool(_)) => Ok(v),
        (FieldType::Boolean, Value::Integer(0)) => Ok(Value::Bool(false)),
        (FieldType::Boolean, Value::Integer(1)) => Ok(Value::Bool(true)),
        (FieldType::Boolean, Value::Text(s)) => match s.to_ascii_lowercase().as_str() {
            "true" | "t" | "1" => Ok(Value::Bool(true)),
            "false" | "f" | "0" => Ok(Value::Bool(false)),
            _ => Err(Value::Text(s)),
        },

        (FieldType::Blob, v @ Value::Blob(_)) => Ok(v),
        (FieldType::Blob, Value::Text(s)) => Ok(Value::Blob(s.as_bytes().to_vec())),

        (FieldType::Date, v @ Value::Date(_)) => Ok(v),
        (FieldType::Date, Value::Timestamp(ts)) => Ok(Value::Date(ts.date())),
        (FieldType::Date, Value::Text(s)) => match parse_date(&s) {
            Some(d) => Ok(Value::Date(d)),
            None => Err(Value::Text(s)),
        },

        (FieldType::Timestamp, v @ Value::Timestamp(_)) => Ok(v),
        (FieldType::Timestamp, Value::Date(d)) => Ok(Value::Timestamp(d.and_time(NaiveTime::MIN))),
        (FieldType::Timestamp, Value::Integer(secs)) => DateTime::from_timestamp(secs, 0)
            .map(|dt| Value::Timestamp(dt.naive_utc()))
            .ok_or(Value::Integer(secs)),
        (FieldType::Timestamp, Value::Text(s)) => match parse_timestamp(&s) {
            Some(ts) => Ok(Value::Timestamp(ts)),
            None => Err(Value::Text(s)),
        },

        (_, raw) => Err(raw),
    }
}

fn parse_timestamp(s: &str) -> Option<NaiveDateTime> {
    let s = s.trim();
    TIMESTAMP_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
        .or_else(|| DateTime::parse_from_rfc3339(s).ok().map(|dt| dt.naive_utc()))
        .or_else(|| {
            NaiveDate::parse_from_str(s, DATE_FORMAT)
                .ok()
                .map(|d| d.and_time(NaiveTime::MIN))
        })
}

fn parse_date(s: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(s.trim(), DATE_FORMAT)
        .ok()
        .or_else(|| parse_timestamp(s).map(|ts| ts.date()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ts(s: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").unwrap()
    }

    #[test]
    fn test_text_timestamps() {
        let expected = Value::Timestamp(ts("2024-03-01 12:30:00"));
        for raw in [
            "2024-03-01 12:30:00",
            "2024-03-01T12:30:00",
            "2024-03-01T12:30:00+00:00",
            "2024-03-01 12:30:00.000",
        ] {
            assert_eq!(coerce(FieldType::Timestamp, Value::from(raw)), Ok(expected.clone()));
        }
        assert_eq!(
            coerce(FieldType::Timestamp, Value::from("2024-03-01")),
            Ok(Value::Timestamp(ts("2024-03-01 00:00:00")))
        );
        assert!(coerce(FieldType::Timestamp, Value::from("yesterday")).is_err());
    }

    #[test]
    fn test_numeric_and_boolean_coercions() {
        assert_eq!(coerce(FieldType::Boolean, Value::Integer(1)), Ok(Value::Bool(true)));
        assert_eq!(coerce(FieldType::Boolean, Value::Integer(0)), Ok(Value::Bool(false)));
        assert_eq!(
            coerce(FieldType::Boolean, Value::Integer(2)),
            Err(Value::Integer(2))
        );
        assert_eq!(coerce(FieldType::Real, Value::Integer(3)), Ok(Value::Real(3.0)));
        assert_eq!(coerce(FieldType::Integer, Value::Real(4.0)), Ok(Value::Integer(4)));
        assert!(coerce(FieldType::Integer, Value::Real(4.5)).is_err());
        assert_eq!(
            coerce(FieldType::Date, Value::from("2024-03-01")),
            Ok(Value::Date(NaiveDate::from_ymd_opt(2024, 3, 1).unwrap()))
        );
    }

    #[test]
    fn test_layout_reports_field_and_raw_value() {
        let layout = Layout {
            shape: Arc::new(Shape::new(
                "event",
                vec!["id".into(), "at".into()],
                2,
                Some(0),
            )),
            slots: vec![
                Slot {
                    ty: Some(FieldType::Integer),
                    nullable: false,
                },
                Slot {
                    ty: Some(FieldType::Timestamp),
                    nullable: false,
                },
            ],
        };
        let projection = Projection::new(layout);

        let err = projection
            .read(vec![Value::Integer(1), Value::from("not a date")])
            .unwrap_err();
        assert!(matches!(
            err,
            QueryError::Materialization { ref field, ref raw, .. }
                if field == "at" && *raw == Value::from("not a date")
        ));

        let err = projection
            .read(vec![Value::Integer(1), Value::Null])
            .unwrap_err();
        assert!(matches!(err, QueryError::Materialization { ref field, .. } if field == "at"));
    }

    #[test]
    fn test_short_rows_and_bad_keys_fail() {
        let layout = Layout {
            shape: Arc::new(Shape::new("tag", vec!["id".into(), "label".into()], 2, Some(0))),
            slots: vec![
                Slot {
                    ty: Some(FieldType::Integer),
                    nullable: false,
                },
                Slot {
                    ty: Some(FieldType::Text),
                    nullable: true,
                },
            ],
        };
        let mut projection = Projection::new(layout);

        let err = projection.read(vec![Value::Integer(1)]).unwrap_err();
        assert!(matches!(
            err,
            QueryError::Materialization { ref field, raw: Value::Null, .. } if field == "label"
        ));

        projection.key = Some(KeySlot {
            column: "order_id".into(),
            slot: Slot {
                ty: Some(FieldType::Integer),
                nullable: true,
            },
        });
        let (_, key) = projection
            .read(vec![Value::Integer(1), Value::Null, Value::Integer(7)])
            .unwrap();
        assert_eq!(key, Some(Value::Integer(7)));

        let err = projection
            .read(vec![Value::Integer(1), Value::Null, Value::from("seven")])
            .unwrap_err();
        assert!(matches!(
            err,
            QueryError::Materialization { ref field, ref raw, .. }
                if field == "order_id" && *raw == Value::from("seven")
        ));
        assert!(projection.read(vec![Value::Integer(1), Value::Null]).is_err());
    }
}
