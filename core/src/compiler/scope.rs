//! Table aliases and join planning for one statement.
//!
//! The root table is always `t0`; every planned join gets the next `tN`.
//! A relation path is joined at most once per statement and reused by every
//! clause that references it.

use compact_str::{CompactString, format_compact};
use quarry_types::FieldType;

use crate::error::{QueryError, Result};
use crate::expr::FieldPath;
use crate::schema::{FieldDef, RecordType, SchemaDescriptor, require};
use crate::sql::{Sql, Token};

pub(crate) const ROOT_ALIAS: &str = "t0";

struct PlannedJoin<'a> {
    /// Relation path from the root; `None` for helper joins such as junctions.
    path: Option<FieldPath>,
    alias: CompactString,
    record: Option<&'a RecordType>,
    clause: Sql,
}

/// A column reference resolved against the planned joins.
#[derive(Debug, Clone)]
pub(crate) struct ResolvedColumn {
    pub sql: Sql,
    pub ty: FieldType,
    pub nullable: bool,
}

pub(crate) struct Scope<'a> {
    schema: &'a dyn SchemaDescriptor,
    root: &'a RecordType,
    /// Record type named in error messages.
    subject: &'a str,
    joins: Vec<PlannedJoin<'a>>,
    next_alias: usize,
}

impl<'a> Scope<'a> {
    pub fn new(schema: &'a dyn SchemaDescriptor, root: &'a RecordType, subject: &'a str) -> Self {
        Self {
            schema,
            root,
            subject,
            joins: Vec::new(),
            next_alias: 0,
        }
    }

    pub fn root(&self) -> &'a RecordType {
        self.root
    }

    pub fn alloc_alias(&mut self) -> CompactString {
        self.next_alias += 1;
        format_compact!("t{}", self.next_alias)
    }

    /// Adds a join that no relation path names.
    pub fn push_join(&mut self, alias: CompactString, clause: Sql) {
        self.joins.push(PlannedJoin {
            path: None,
            alias,
            record: None,
            clause,
        });
    }

    /// Joins every hop of `path`, reusing joins planned earlier.
    ///
    /// Each segment must be a relation field.
    pub fn join_path(&mut self, path: &FieldPath) -> Result<(CompactString, &'a RecordType)> {
        let mut alias = CompactString::from(ROOT_ALIAS);
        let mut record = self.root;
        for depth in 1..=path.len() {
            let segment = path.segments()[depth - 1].as_str();
            let field = record
                .field_named(segment)
                .filter(|f| f.relation().is_some())
                .ok_or_else(|| self.unresolved(path))?;
            (alias, record) = self.join_hop(&path.prefix(depth), &alias, record, field)?;
        }
        Ok((alias, record))
    }

    fn join_hop(
        &mut self,
        prefix: &FieldPath,
        parent_alias: &str,
        parent: &'a RecordType,
        field: &FieldDef,
    ) -> Result<(CompactString, &'a RecordType)> {
        if let Some(join) = self
            .joins
            .iter()
            .find(|j| j.path.as_ref() == Some(prefix))
            && let Some(record) = join.record
        {
            return Ok((join.alias.clone(), record));
        }

        let Some(info) = field.relation() else {
            return Err(self.unresolved(prefix));
        };
        let target = require(self.schema, info.target())?;
        let local = column_of(parent, info.local_field())?;
        let remote = column_of(target, info.remote_field())?;

        let (on_alias, on_column) = match info.through() {
            Some(through) => {
                let junction = self.alloc_alias();
                let clause = left_join(
                    &through.table,
                    &junction,
                    Sql::column(junction.clone(), through.source_column.clone()),
                    Sql::column(parent_alias, local),
                );
                self.push_join(junction.clone(), clause);
                (junction, through.target_column.clone())
            }
            None => (CompactString::from(parent_alias), CompactString::from(local)),
        };

        let alias = self.alloc_alias();
        let clause = left_join(
            target.table_name(),
            &alias,
            Sql::column(alias.clone(), remote),
            Sql::column(on_alias, on_column),
        );
        self.joins.push(PlannedJoin {
            path: Some(prefix.clone()),
            alias: alias.clone(),
            record: Some(target),
            clause,
        });
        Ok((alias, target))
    }

    /// Resolves a field path to a column, planning the joins it needs.
    ///
    /// A path ending at a forward single-valued relation compares the local
    /// key column; any other relation endpoint compares the target's primary key.
    pub fn resolve(&mut self, path: &FieldPath) -> Result<ResolvedColumn> {
        let mut alias = CompactString::from(ROOT_ALIAS);
        let mut record = self.root;
        let mut joined = false;

        for depth in 1..=path.len() {
            let segment = path.segments()[depth - 1].as_str();
            let field = record
                .field_named(segment)
                .ok_or_else(|| self.unresolved(path))?;
            let last = depth == path.len();

            if let (Some(column), Some(ty)) = (field.column(), field.field_type()) {
                if !last {
                    return Err(self.unresolved(path));
                }
                return Ok(ResolvedColumn {
                    sql: Sql::column(alias, column),
                    ty,
                    nullable: joined || field.is_nullable(),
                });
            }

            let Some(info) = field.relation() else {
                return Err(self.unresolved(path));
            };
            if last && info.multiplicity().is_single() && info.through().is_none() {
                let local = record
                    .field_named(info.local_field())
                    .filter(|f| f.is_column())
                    .ok_or_else(|| self.unresolved(path))?;
                if local.name() != record.primary_key_name() {
                    return self.column(&alias, record, local, joined);
                }
            }

            (alias, record) = self.join_hop(&path.prefix(depth), &alias, record, field)?;
            joined = true;

            if last {
                let pk = record.primary_key_field().ok_or_else(|| self.unresolved(path))?;
                return self.column(&alias, record, pk, joined);
            }
        }
        Err(self.unresolved(path))
    }

    fn column(
        &self,
        alias: &str,
        record: &RecordType,
        field: &FieldDef,
        joined: bool,
    ) -> Result<ResolvedColumn> {
        match (field.column(), field.field_type()) {
            (Some(column), Some(ty)) => Ok(ResolvedColumn {
                sql: Sql::column(alias, column),
                ty,
                nullable: joined || field.is_nullable(),
            }),
            _ => Err(QueryError::field_reference(
                format_compact!("{}.{}", record.name(), field.name()),
                self.subject,
            )),
        }
    }

    /// `"table" AS "t0"` followed by every planned join, in planning order.
    pub fn from_clause(&self) -> Sql {
        let mut sql = Sql::ident(self.root.table_name()).alias(ROOT_ALIAS);
        for join in &self.joins {
            sql.append_mut(join.clause.clone());
        }
        sql
    }

    fn unresolved(&self, path: &FieldPath) -> QueryError {
        QueryError::field_reference(path.to_compact(), self.subject)
    }
}

/// Backend column of `field` on `record`.
pub(crate) fn column_of<'r>(record: &'r RecordType, field: &str) -> Result<&'r str> {
    record
        .field_named(field)
        .and_then(FieldDef::column)
        .ok_or_else(|| {
            QueryError::InvalidSchema(format!("`{}.{}` is not a column", record.name(), field))
        })
}

/// `LEFT JOIN "table" AS "alias" ON lhs = rhs`
fn left_join(table: &str, alias: &str, lhs: Sql, rhs: Sql) -> Sql {
    Sql::from_iter([Token::LEFT, Token::JOIN])
        .append(Sql::ident(table).alias(alias))
        .push(Token::ON)
        .append(lhs)
        .push(Token::EQ)
        .append(rhs)
}

/// `INNER JOIN "table" AS "alias" ON lhs = rhs`
pub(crate) fn inner_join(table: &str, alias: &str, lhs: Sql, rhs: Sql) -> Sql {
    Sql::from_iter([Token::INNER, Token::JOIN])
        .append(Sql::ident(table).alias(alias))
        .push(Token::ON)
        .append(lhs)
        .push(Token::EQ)
        .append(rhs)
}
