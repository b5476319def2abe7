//! Read-only schema descriptor.
//!
//! Record types are registered once, validated by [`SchemaBuilder::build`], and
//! never change afterwards. The engine reaches them only through the
//! [`SchemaDescriptor`] trait so callers can plug in their own registry.

use compact_str::CompactString;
use hashbrown::HashMap;
use quarry_types::FieldType;

use crate::error::{QueryError, Result};

/// Name of the lookup segment that always means "the primary key".
pub const PK_ALIAS: &str = "pk";

// =============================================================================
// Relations
// =============================================================================

/// How many target records a relation field yields per source record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Multiplicity {
    OneToOne,
    ManyToOne,
    OneToMany,
    ManyToMany,
}

impl Multiplicity {
    /// `true` when the relation yields at most one target record.
    #[inline]
    pub const fn is_single(&self) -> bool {
        matches!(self, Multiplicity::OneToOne | Multiplicity::ManyToOne)
    }
}

/// Junction table backing a many-to-many relation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Through {
    pub table: CompactString,
    /// Junction column holding the source record's key.
    pub source_column: CompactString,
    /// Junction column holding the target record's key.
    pub target_column: CompactString,
}

/// Relationship metadata attached to a relation field.
///
/// Source and target records match when `source.local_field` equals
/// `target.remote_field` (through the junction table for many-to-many).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelationInfo {
    target: CompactString,
    multiplicity: Multiplicity,
    local_field: Option<CompactString>,
    remote_field: Option<CompactString>,
    through: Option<Through>,
}

impl RelationInfo {
    fn new(target: &str, multiplicity: Multiplicity) -> Self {
        Self {
            target: target.into(),
            multiplicity,
            local_field: None,
            remote_field: None,
            through: None,
        }
    }

    /// Forward foreign key: `local_field` on this record points at the target's primary key.
    pub fn many_to_one(target: &str, local_field: &str) -> Self {
        Self::new(target, Multiplicity::ManyToOne).with_local(local_field)
    }

    /// Forward one-to-one: like [`many_to_one`](Self::many_to_one) with a unique key.
    pub fn one_to_one(target: &str, local_field: &str) -> Self {
        Self::new(target, Multiplicity::OneToOne).with_local(local_field)
    }

    /// Reverse one-to-one: the target holds `remote_field` pointing back at this record.
    pub fn reverse_one_to_one(target: &str, remote_field: &str) -> Self {
        Self::new(target, Multiplicity::OneToOne).with_remote(remote_field)
    }

    /// Reverse foreign key: many target records hold `remote_field` pointing at this record.
    pub fn one_to_many(target: &str, remote_field: &str) -> Self {
        Self::new(target, Multiplicity::OneToMany).with_remote(remote_field)
    }

    /// Many-to-many through a junction table.
    pub fn many_to_many(
        target: &str,
        through_table: &str,
        source_column: &str,
        target_column: &str,
    ) -> Self {
        let mut info = Self::new(target, Multiplicity::ManyToMany);
        info.through = Some(Through {
            table: through_table.into(),
            source_column: source_column.into(),
            target_column: target_column.into(),
        });
        info
    }

    /// Overrides the field on this record used for matching (defaults to the primary key).
    pub fn with_local(mut self, field: &str) -> Self {
        self.local_field = Some(field.into());
        self
    }

    /// Overrides the field on the target used for matching (defaults to its primary key).
    pub fn with_remote(mut self, field: &str) -> Self {
        self.remote_field = Some(field.into());
        self
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn multiplicity(&self) -> Multiplicity {
        self.multiplicity
    }

    /// Matching field on the source record. Always set once the schema is built.
    pub fn local_field(&self) -> &str {
        self.local_field.as_deref().unwrap_or(PK_ALIAS)
    }

    /// Matching field on the target record. Always set once the schema is built.
    pub fn remote_field(&self) -> &str {
        self.remote_field.as_deref().unwrap_or(PK_ALIAS)
    }

    pub fn through(&self) -> Option<&Through> {
        self.through.as_ref()
    }
}

// =============================================================================
// Fields
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
enum FieldKind {
    Column {
        ty: FieldType,
        nullable: bool,
        column: CompactString,
    },
    Relation(RelationInfo),
}

/// One entry of a record type's ordered field list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDef {
    name: CompactString,
    kind: FieldKind,
}

impl FieldDef {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Declared storage type; `None` for relation fields.
    pub fn field_type(&self) -> Option<FieldType> {
        match &self.kind {
            FieldKind::Column { ty, .. } => Some(*ty),
            FieldKind::Relation(_) => None,
        }
    }

    /// Relationship metadata; `None` for plain columns.
    pub fn relation(&self) -> Option<&RelationInfo> {
        match &self.kind {
            FieldKind::Relation(info) => Some(info),
            FieldKind::Column { .. } => None,
        }
    }

    /// Backend column name; `None` for relation fields.
    pub fn column(&self) -> Option<&str> {
        match &self.kind {
            FieldKind::Column { column, .. } => Some(column),
            FieldKind::Relation(_) => None,
        }
    }

    pub fn is_nullable(&self) -> bool {
        matches!(self.kind, FieldKind::Column { nullable: true, .. })
    }

    pub fn is_column(&self) -> bool {
        matches!(self.kind, FieldKind::Column { .. })
    }
}

// =============================================================================
// Record types
// =============================================================================

/// A registered table: name, ordered fields, primary key and relations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordType {
    name: CompactString,
    table: CompactString,
    primary_key: CompactString,
    fields: Vec<FieldDef>,
}

impl RecordType {
    /// Starts a record type whose table name equals its record name.
    pub fn new(name: &str) -> Self {
        Self {
            name: name.into(),
            table: name.into(),
            primary_key: CompactString::default(),
            fields: Vec::new(),
        }
    }

    pub fn table(mut self, table: &str) -> Self {
        self.table = table.into();
        self
    }

    /// Appends a non-nullable column field.
    pub fn field(self, name: &str, ty: FieldType) -> Self {
        self.push_column(name, ty, false, name)
    }

    /// Appends a nullable column field.
    pub fn nullable_field(self, name: &str, ty: FieldType) -> Self {
        self.push_column(name, ty, true, name)
    }

    /// Appends a column field stored under a different backend column name.
    pub fn field_with_column(self, name: &str, ty: FieldType, column: &str) -> Self {
        self.push_column(name, ty, false, column)
    }

    pub fn relation(mut self, name: &str, info: RelationInfo) -> Self {
        self.fields.push(FieldDef {
            name: name.into(),
            kind: FieldKind::Relation(info),
        });
        self
    }

    pub fn primary_key(mut self, field: &str) -> Self {
        self.primary_key = field.into();
        self
    }

    fn push_column(mut self, name: &str, ty: FieldType, nullable: bool, column: &str) -> Self {
        self.fields.push(FieldDef {
            name: name.into(),
            kind: FieldKind::Column {
                ty,
                nullable,
                column: column.into(),
            },
        });
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn table_name(&self) -> &str {
        &self.table
    }

    pub fn primary_key_name(&self) -> &str {
        &self.primary_key
    }

    /// All fields, columns and relations, in declared order.
    pub fn fields(&self) -> &[FieldDef] {
        &self.fields
    }

    /// Column fields in declared order; this is the materialization projection.
    pub fn columns(&self) -> impl Iterator<Item = &FieldDef> + '_ {
        self.fields.iter().filter(|f| f.is_column())
    }

    /// Looks a field up by name, treating `pk` as the primary key.
    pub fn field_named(&self, name: &str) -> Option<&FieldDef> {
        let name = if name == PK_ALIAS {
            self.primary_key.as_str()
        } else {
            name
        };
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn primary_key_field(&self) -> Option<&FieldDef> {
        self.field_named(&self.primary_key)
    }

    /// Whether `name` is taken by a field of this record type.
    pub fn has_field(&self, name: &str) -> bool {
        name == PK_ALIAS || self.fields.iter().any(|f| f.name == name)
    }
}

// =============================================================================
// Descriptor
// =============================================================================

/// Read-only access to registered record types.
pub trait SchemaDescriptor: Send + Sync {
    /// Looks up a record type by name.
    fn record_type(&self, name: &str) -> Option<&RecordType>;

    /// Ordered field list of a record type.
    fn fields_of(&self, record_type: &str) -> Option<&[FieldDef]> {
        self.record_type(record_type).map(RecordType::fields)
    }

    /// Primary-key field name of a record type.
    fn primary_key_of(&self, record_type: &str) -> Option<&str> {
        self.record_type(record_type)
            .map(RecordType::primary_key_name)
    }
}

/// Looks up `name`, reporting an unknown record type as an error.
pub(crate) fn require<'s>(
    schema: &'s (impl SchemaDescriptor + ?Sized),
    name: &str,
) -> Result<&'s RecordType> {
    schema
        .record_type(name)
        .ok_or_else(|| QueryError::UnknownRecordType { name: name.into() })
}

/// Validated, immutable collection of record types.
#[derive(Debug, Clone, Default)]
pub struct Schema {
    records: Vec<RecordType>,
    index: HashMap<CompactString, usize>,
}

impl Schema {
    pub fn builder() -> SchemaBuilder {
        SchemaBuilder::default()
    }

    pub fn record_types(&self) -> impl Iterator<Item = &RecordType> + '_ {
        self.records.iter()
    }
}

impl SchemaDescriptor for Schema {
    fn record_type(&self, name: &str) -> Option<&RecordType> {
        self.index.get(name).map(|&i| &self.records[i])
    }
}

/// Registration step producing a [`Schema`].
#[derive(Debug, Default)]
pub struct SchemaBuilder {
    records: Vec<RecordType>,
}

impl SchemaBuilder {
    pub fn record(mut self, record: RecordType) -> Self {
        self.records.push(record);
        self
    }

    /// Validates every record type and fills relation defaults.
    pub fn build(self) -> Result<Schema> {
        let mut index = HashMap::with_capacity(self.records.len());
        for (i, record) in self.records.iter().enumerate() {
            if index.insert(record.name.clone(), i).is_some() {
                return Err(invalid(format!(
                    "record type `{}` registered twice",
                    record.name
                )));
            }
            validate_fields(record)?;
        }

        let mut records = self.records;
        for i in 0..records.len() {
            for f in 0..records[i].fields.len() {
                let FieldKind::Relation(info) = &records[i].fields[f].kind else {
                    continue;
                };
                let info = resolve_relation(&records, &index, &records[i], info)?;
                records[i].fields[f].kind = FieldKind::Relation(info);
            }
        }

        Ok(Schema { records, index })
    }
}

fn invalid(message: String) -> QueryError {
    QueryError::InvalidSchema(message)
}

fn validate_fields(record: &RecordType) -> Result<()> {
    for (i, field) in record.fields.iter().enumerate() {
        if field.name == PK_ALIAS || field.name.contains("__") || field.name.is_empty() {
            return Err(invalid(format!(
                "`{}.{}` is not a usable field name",
                record.name, field.name
            )));
        }
        if record.fields[..i].iter().any(|f| f.name == field.name) {
            return Err(invalid(format!(
                "field `{}.{}` declared twice",
                record.name, field.name
            )));
        }
    }
    match record.primary_key_field() {
        Some(pk) if pk.is_column() => Ok(()),
        _ => Err(invalid(format!(
            "record type `{}` has no primary-key column `{}`",
            record.name, record.primary_key
        ))),
    }
}

fn resolve_relation(
    records: &[RecordType],
    index: &HashMap<CompactString, usize>,
    source: &RecordType,
    info: &RelationInfo,
) -> Result<RelationInfo> {
    let Some(&target_idx) = index.get(info.target.as_str()) else {
        return Err(invalid(format!(
            "relation on `{}` targets unknown record type `{}`",
            source.name, info.target
        )));
    };
    let target = &records[target_idx];

    let mut resolved = info.clone();
    let local = info
        .local_field
        .clone()
        .unwrap_or_else(|| source.primary_key.clone());
    let remote = info
        .remote_field
        .clone()
        .unwrap_or_else(|| target.primary_key.clone());

    for (record, field) in [(source, &local), (target, &remote)] {
        if !record.field_named(field).is_some_and(FieldDef::is_column) {
            return Err(invalid(format!(
                "relation key `{}.{}` is not a column",
                record.name, field
            )));
        }
    }

    resolved.local_field = Some(local);
    resolved.remote_field = Some(remote);
    Ok(resolved)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shop() -> Result<Schema> {
        Schema::builder()
            .record(
                RecordType::new("customer")
                    .table("customers")
                    .field("id", FieldType::Integer)
                    .field("name", FieldType::Text)
                    .primary_key("id")
                    .relation("orders", RelationInfo::one_to_many("order", "customer_id")),
            )
            .record(
                RecordType::new("order")
                    .table("orders")
                    .field("id", FieldType::Integer)
                    .field("total", FieldType::Integer)
                    .field("customer_id", FieldType::Integer)
                    .primary_key("id")
                    .relation("customer", RelationInfo::many_to_one("customer", "customer_id")),
            )
            .build()
    }

    #[test]
    fn test_descriptor_interface() {
        let schema = shop().unwrap();
        let fields = schema.fields_of("order").unwrap();
        let names: Vec<_> = fields.iter().map(FieldDef::name).collect();
        assert_eq!(names, ["id", "total", "customer_id", "customer"]);
        assert_eq!(schema.primary_key_of("customer"), Some("id"));
        assert!(fields[3].relation().is_some());
        assert_eq!(fields[1].field_type(), Some(FieldType::Integer));
        assert!(schema.record_type("missing").is_none());
    }

    #[test]
    fn test_relation_defaults_are_filled() {
        let schema = shop().unwrap();
        let order = schema.record_type("order").unwrap();
        let rel = order.field_named("customer").unwrap().relation().unwrap();
        assert_eq!(rel.local_field(), "customer_id");
        assert_eq!(rel.remote_field(), "id");

        let customer = schema.record_type("customer").unwrap();
        let rel = customer.field_named("orders").unwrap().relation().unwrap();
        assert_eq!(rel.local_field(), "id");
        assert_eq!(rel.remote_field(), "customer_id");
        assert!(!rel.multiplicity().is_single());
    }

    #[test]
    fn test_unknown_relation_target_is_rejected() {
        let err = Schema::builder()
            .record(
                RecordType::new("a")
                    .field("id", FieldType::Integer)
                    .primary_key("id")
                    .relation("b", RelationInfo::many_to_one("b", "id")),
            )
            .build()
            .unwrap_err();
        assert!(matches!(err, QueryError::InvalidSchema(msg) if msg.contains("unknown record type `b`")));
    }

    #[test]
    fn test_missing_primary_key_is_rejected() {
        let err = Schema::builder()
            .record(RecordType::new("a").field("id", FieldType::Integer))
            .build()
            .unwrap_err();
        assert!(matches!(err, QueryError::InvalidSchema(_)));
    }

    #[test]
    fn test_pk_alias_lookup() {
        let schema = shop().unwrap();
        let order = schema.record_type("order").unwrap();
        assert_eq!(order.field_named("pk").unwrap().name(), "id");
        assert!(order.has_field("pk"));
    }
}
