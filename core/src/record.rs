//! Materialized records.

use std::sync::Arc;

use compact_str::CompactString;
use quarry_types::Value;

use crate::schema::PK_ALIAS;

/// Column names shared by every record produced from one statement.
#[derive(Debug, PartialEq, Eq)]
pub struct Shape {
    record_type: CompactString,
    names: Vec<CompactString>,
    /// Leading names are record fields; the rest are annotations.
    field_count: usize,
    pk: Option<usize>,
}

impl Shape {
    pub(crate) fn new(
        record_type: impl Into<CompactString>,
        names: Vec<CompactString>,
        field_count: usize,
        pk: Option<usize>,
    ) -> Self {
        Self {
            record_type: record_type.into(),
            names,
            field_count,
            pk,
        }
    }

    pub fn record_type(&self) -> &str {
        &self.record_type
    }

    pub fn names(&self) -> &[CompactString] {
        &self.names
    }

    pub(crate) fn pk_index(&self) -> Option<usize> {
        self.pk
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        if name == PK_ALIAS {
            return self.pk;
        }
        self.names.iter().position(|n| n == name)
    }
}

/// Records attached through a followed relation.
#[derive(Debug, Clone, PartialEq)]
pub enum Related {
    /// Single-valued relation; `None` when no target row matched.
    One(Option<Box<Record>>),
    Many(Vec<Record>),
}

impl Related {
    pub fn as_one(&self) -> Option<&Record> {
        match self {
            Related::One(record) => record.as_deref(),
            Related::Many(_) => None,
        }
    }

    pub fn as_many(&self) -> &[Record] {
        match self {
            Related::Many(records) => records,
            Related::One(_) => &[],
        }
    }
}

/// A typed row: declared fields, then annotations, then followed relations.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    shape: Arc<Shape>,
    values: Vec<Value>,
    relations: Vec<(CompactString, Related)>,
}

impl Record {
    pub(crate) fn new(shape: Arc<Shape>, values: Vec<Value>) -> Self {
        Self {
            shape,
            values,
            relations: Vec::new(),
        }
    }

    pub fn record_type(&self) -> &str {
        self.shape.record_type()
    }

    pub fn shape(&self) -> &Shape {
        &self.shape
    }

    /// Value of a field or annotation; `pk` names the primary key.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.shape.index_of(name).and_then(|i| self.values.get(i))
    }

    pub fn pk(&self) -> Option<&Value> {
        self.shape.pk.and_then(|i| self.values.get(i))
    }

    /// All values in shape order.
    pub fn values(&self) -> &[Value] {
        &self.values
    }

    /// Declared fields in order.
    pub fn fields(&self) -> impl Iterator<Item = (&str, &Value)> + '_ {
        self.shape.names[..self.shape.field_count]
            .iter()
            .map(CompactString::as_str)
            .zip(&self.values)
    }

    /// Annotations in definition order.
    pub fn annotations(&self) -> impl Iterator<Item = (&str, &Value)> + '_ {
        let start = self.shape.field_count;
        self.shape.names[start..]
            .iter()
            .map(CompactString::as_str)
            .zip(self.values.iter().skip(start))
    }

    pub fn related(&self, name: &str) -> Option<&Related> {
        self.relations
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, related)| related)
    }

    /// Followed single-valued relation, if it matched.
    pub fn one(&self, name: &str) -> Option<&Record> {
        self.related(name).and_then(Related::as_one)
    }

    /// Followed multi-valued relation; empty when not followed.
    pub fn many(&self, name: &str) -> &[Record] {
        self.related(name).map_or(&[], Related::as_many)
    }

    pub fn relations(&self) -> impl Iterator<Item = (&str, &Related)> + '_ {
        self.relations.iter().map(|(n, r)| (n.as_str(), r))
    }

    pub(crate) fn related_mut(&mut self, name: &str) -> Option<&mut Related> {
        self.relations
            .iter_mut()
            .find(|(n, _)| n == name)
            .map(|(_, related)| related)
    }

    pub(crate) fn set_related(&mut self, name: &str, related: Related) {
        match self.related_mut(name) {
            Some(slot) => *slot = related,
            None => self.relations.push((name.into(), related)),
        }
    }
}

#[cfg(feature = "serde")]
mod serialize {
    use serde::ser::{Serialize, SerializeMap, Serializer};

    use super::{Record, Related};

    impl Serialize for Record {
        fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
            let mut map = serializer.serialize_map(Some(self.values.len() + self.relations.len()))?;
            for (name, value) in self.shape.names.iter().zip(&self.values) {
                map.serialize_entry(name.as_str(), value)?;
            }
            for (name, related) in &self.relations {
                map.serialize_entry(name.as_str(), related)?;
            }
            map.end()
        }
    }

    impl Serialize for Related {
        fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
            match self {
                Related::One(record) => record.serialize(serializer),
                Related::Many(records) => records.serialize(serializer),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn customer(id: i64, name: &str) -> Record {
        let shape = Arc::new(Shape::new(
            "customer",
            vec!["id".into(), "name".into(), "order_count".into()],
            2,
            Some(0),
        ));
        Record::new(shape, vec![Value::from(id), Value::from(name), Value::from(3)])
    }

    #[test]
    fn test_field_access() {
        let record = customer(7, "Alice");
        assert_eq!(record.pk(), Some(&Value::Integer(7)));
        assert_eq!(record.get("pk"), record.get("id"));
        assert_eq!(record.get("name"), Some(&Value::from("Alice")));
        assert_eq!(record.fields().count(), 2);
        let annotations: Vec<_> = record.annotations().collect();
        assert_eq!(annotations, [("order_count", &Value::Integer(3))]);
        assert!(record.get("missing").is_none());
    }

    #[test]
    fn test_relations_replace_by_name() {
        let mut record = customer(7, "Alice");
        record.set_related("orders", Related::Many(Vec::new()));
        record.set_related("orders", Related::Many(vec![customer(1, "x")]));
        assert_eq!(record.many("orders").len(), 1);
        assert_eq!(record.relations().count(), 1);
        assert!(record.one("orders").is_none());
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_serializes_as_map() {
        let mut record = customer(7, "Alice");
        record.set_related("orders", Related::Many(vec![customer(1, "x")]));
        record.set_related("referrer", Related::One(None));

        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "id": 7,
                "name": "Alice",
                "order_count": 3,
                "orders": [{ "id": 1, "name": "x", "order_count": 3 }],
                "referrer": null,
            })
        );
    }
}
