//! Clause set to statement compilation.
//!
//! The compiler walks a [`ClauseSet`] against the schema and produces a
//! dialect-independent [`Sql`] fragment, rendered once at the end with the
//! selected [`Dialect`]. Rendering order is fixed:
//!
//! ```text
//! SELECT [DISTINCT] columns, annotations, joined columns
//! FROM root AS t0 [LEFT JOIN ...]
//! [WHERE filters AND NOT (excludes)]
//! [GROUP BY keys] [HAVING aggregate predicates]
//! [ORDER BY keys, tie-break] [LIMIT/OFFSET]
//! ```

mod expr;
mod scope;
mod select;

use std::sync::Arc;

use compact_str::{CompactString, format_compact};
use quarry_types::{Dialect, Value};

use crate::clause::{Annotation, ClauseSet, OrderKey, Window};
use crate::error::{QueryError, Result};
use crate::expr::{Expr, FieldPath};
use crate::materialize::{JoinedLayout, KeySlot, Layout, Projection, Slot};
use crate::record::Shape;
use crate::relation::RelationTree;
use crate::schema::{FieldDef, PK_ALIAS, RecordType, SchemaDescriptor, require};
use crate::sql::{CompiledStatement, Sql, Token};

use expr::Frame;
use scope::{ROOT_ALIAS, Scope, column_of, inner_join};
use select::{Select, from_subquery};

/// A compiled statement together with what is needed to read its rows.
#[derive(Debug, Clone)]
pub struct SelectPlan {
    pub statement: CompiledStatement,
    pub(crate) projection: Projection,
    pub(crate) relations: RelationTree,
}

impl SelectPlan {
    pub fn projection(&self) -> &Projection {
        &self.projection
    }
}

/// Compiles clause sets for one record type and dialect.
///
/// Compilation is a pure function of the schema, the clause set and the
/// dialect; the same input always yields the same statement.
pub struct Compiler<'a> {
    schema: &'a dyn SchemaDescriptor,
    record: &'a RecordType,
    dialect: Dialect,
}

/// Joined relation planned in a statement: node index, alias, target.
type PlannedRelation<'a> = (usize, CompactString, &'a RecordType);

impl<'a> Compiler<'a> {
    pub fn new(schema: &'a dyn SchemaDescriptor, record_type: &str, dialect: Dialect) -> Result<Self> {
        Ok(Self {
            schema,
            record: require(schema, record_type)?,
            dialect,
        })
    }

    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    pub fn record_type(&self) -> &'a RecordType {
        self.record
    }

    // =========================================================================
    // Entry points
    // =========================================================================

    /// Statement text and parameters of the row-fetching SELECT.
    pub fn compile(&self, clauses: &ClauseSet) -> Result<CompiledStatement> {
        Ok(self.plan(clauses)?.statement)
    }

    pub fn plan(&self, clauses: &ClauseSet) -> Result<SelectPlan> {
        let (sql, projection, relations) = self.build_select(clauses)?;
        Ok(SelectPlan {
            statement: sql.render(self.dialect),
            projection,
            relations,
        })
    }

    /// `SELECT COUNT(*)` over the rows `compile` would return.
    pub fn compile_count(&self, clauses: &ClauseSet) -> Result<CompiledStatement> {
        let count = Sql::func("COUNT", Sql::token(Token::STAR));
        let mut frame = self.frame(clauses);
        if self.needs_subquery(&frame, clauses) {
            let (inner, _, _) = self.build_select(clauses)?;
            return Ok(from_subquery(count, inner, None).render(self.dialect));
        }

        let mut select = Select {
            columns: vec![count],
            ..Select::default()
        };
        select.filter = self.render_filter(&mut frame, clauses)?.0;
        select.from = frame.scope.from_clause();
        Ok(select.into_sql().render(self.dialect))
    }

    /// `SELECT 1 ... LIMIT 1` over the rows `compile` would return.
    pub fn compile_exists(&self, clauses: &ClauseSet) -> Result<CompiledStatement> {
        let one = Window::new(Some(1), 0);
        let mut frame = self.frame(clauses);
        if self.needs_subquery(&frame, clauses) {
            let (inner, _, _) = self.build_select(clauses)?;
            return Ok(from_subquery(Sql::raw("1"), inner, Some(one)).render(self.dialect));
        }

        let mut select = Select {
            columns: vec![Sql::raw("1")],
            window: one,
            ..Select::default()
        };
        select.filter = self.render_filter(&mut frame, clauses)?.0;
        select.from = frame.scope.from_clause();
        Ok(select.into_sql().render(self.dialect))
    }

    /// One row of named aggregates over the filtered rows.
    pub fn plan_aggregate(&self, clauses: &ClauseSet, aggregates: &[Annotation]) -> Result<SelectPlan> {
        if clauses.is_grouped() || clauses.window.is_bounded() {
            return Err(self.invalid("aggregate() cannot be applied to a sliced or grouped query"));
        }
        let mut frame = self.frame(clauses);
        if self.needs_subquery(&frame, clauses) {
            return Err(self.invalid(
                "aggregate() cannot be applied after distinct() or aggregate annotations",
            ));
        }

        let mut select = Select::default();
        let mut names = Vec::with_capacity(aggregates.len());
        let mut slots = Vec::with_capacity(aggregates.len());
        for aggregate in aggregates {
            if !frame.is_aggregate(&aggregate.expr) {
                return Err(self.invalid(format!(
                    "`{}` is not an aggregate expression",
                    aggregate.name
                )));
            }
            let sql = frame.render(&aggregate.expr)?;
            slots.push(Slot {
                ty: frame.infer(&aggregate.expr)?,
                nullable: true,
            });
            names.push(aggregate.name.clone());
            select.columns.push(sql.alias(aggregate.name.clone()));
        }
        select.filter = self.render_filter(&mut frame, clauses)?.0;
        select.from = frame.scope.from_clause();

        let layout = Layout {
            shape: Arc::new(Shape::new(self.record.name(), names, 0, None)),
            slots,
        };
        Ok(SelectPlan {
            statement: select.into_sql().render(self.dialect),
            projection: Projection::new(layout),
            relations: RelationTree::default(),
        })
    }

    /// Follow-up statement resolving batch node `index` for `keys`.
    ///
    /// `keys` must not be empty.
    pub(crate) fn plan_batch(
        &self,
        tree: &RelationTree,
        index: usize,
        keys: &[Value],
    ) -> Result<SelectPlan> {
        let node = tree.node(index);
        let target = require(self.schema, node.info.target())?;
        let source = require(self.schema, &node.source)?;
        let remote = column_of(target, node.info.remote_field())?;
        let mut frame = Frame::new(
            Scope::new(self.schema, target, self.record.name()),
            Vec::new(),
        );

        let (key_sql, key_slot) = match node.info.through() {
            Some(through) => {
                let junction = frame.scope.alloc_alias();
                let clause = inner_join(
                    &through.table,
                    &junction,
                    Sql::column(junction.clone(), through.target_column.clone()),
                    Sql::column(ROOT_ALIAS, remote),
                );
                frame.scope.push_join(junction.clone(), clause);
                let slot = KeySlot {
                    column: through.source_column.clone(),
                    slot: Slot {
                        ty: source
                            .field_named(node.info.local_field())
                            .and_then(FieldDef::field_type),
                        nullable: true,
                    },
                };
                (
                    Sql::column(junction, through.source_column.clone()),
                    Some(slot),
                )
            }
            None => (Sql::column(ROOT_ALIAS, remote), None),
        };

        let joined = self.plan_joins(&mut frame, tree, Some(index))?;
        let mut select = Select::default();
        let mut projection = Projection::new(record_layout(target, Vec::new()));
        let mut plain = Vec::new();
        select_columns(target, &mut select, &mut plain);
        select_joined(tree, Some(index), &joined, &mut select, &mut projection, &mut plain);
        if key_slot.is_some() {
            select.columns.push(key_sql.clone());
            projection.key = key_slot;
        }

        let list = Sql::join(keys.iter().cloned().map(Sql::param), Token::COMMA);
        select.filter = Some(key_sql.push(Token::IN).append(list.parens()));
        let pk = column_of(target, target.primary_key_name())?;
        select.order_by = vec![Sql::column(ROOT_ALIAS, pk).push(Token::ASC)];
        select.from = frame.scope.from_clause();

        Ok(SelectPlan {
            statement: select.into_sql().render(self.dialect),
            projection,
            relations: RelationTree::default(),
        })
    }

    // =========================================================================
    // SELECT assembly
    // =========================================================================

    fn build_select(&self, clauses: &ClauseSet) -> Result<(Sql, Projection, RelationTree)> {
        let tree = RelationTree::build(self.schema, self.record, &clauses.relation_hints())?;
        if clauses.is_grouped() && !tree.is_empty() {
            return Err(self.invalid("relations cannot be followed on a grouped query"));
        }

        let mut frame = self.frame(clauses);
        let mut select = Select {
            distinct: clauses.distinct,
            window: clauses.window,
            ..Select::default()
        };

        let projection = if clauses.is_grouped() {
            self.select_grouped(&mut frame, clauses, &mut select)?
        } else {
            // Hinted joins are planned first so their aliases follow hint order.
            let joined = self.plan_joins(&mut frame, &tree, None)?;
            let mut plain = Vec::new();
            select_columns(self.record, &mut select, &mut plain);
            let extra = self.select_annotations(&mut frame, &mut select)?;
            let mut projection = Projection::new(record_layout(self.record, extra));
            select_joined(&tree, None, &joined, &mut select, &mut projection, &mut plain);

            let aggregated = frame
                .annotations
                .iter()
                .any(|annotation| frame.is_aggregate(&annotation.expr));
            let (filter, having) = self.render_filter(&mut frame, clauses)?;
            select.filter = filter;
            select.having = having;
            if aggregated || select.having.is_some() {
                select.group_by = plain;
            }
            projection
        };

        select.order_by = self.order_terms(&mut frame, clauses)?;
        select.from = frame.scope.from_clause();
        Ok((select.into_sql(), projection, tree))
    }

    fn select_grouped(
        &self,
        frame: &mut Frame<'a>,
        clauses: &ClauseSet,
        select: &mut Select,
    ) -> Result<Projection> {
        let mut names = Vec::new();
        let mut slots = Vec::new();
        for key in clauses.group_by.iter() {
            let column = frame.scope.resolve(key)?;
            let name = key.to_compact();
            let sql = if key.is_simple() {
                column.sql.clone()
            } else {
                column.sql.clone().alias(name.clone())
            };
            select.columns.push(sql);
            select.group_by.push(column.sql);
            names.push(name);
            slots.push(Slot {
                ty: Some(column.ty),
                nullable: column.nullable,
            });
        }
        let keys = names.len();
        for (name, slot) in self.select_annotations(frame, select)? {
            names.push(name);
            slots.push(slot);
        }

        let (filter, having) = self.render_filter(frame, clauses)?;
        select.filter = filter;
        select.having = having;

        Ok(Projection::new(Layout {
            shape: Arc::new(Shape::new(self.record.name(), names, keys, None)),
            slots,
        }))
    }

    fn select_annotations(
        &self,
        frame: &mut Frame<'a>,
        select: &mut Select,
    ) -> Result<Vec<(CompactString, Slot)>> {
        let annotations = frame.annotations.clone();
        let mut extra = Vec::with_capacity(annotations.len());
        for annotation in &annotations {
            let sql = frame.render(&annotation.expr)?;
            let ty = frame.infer(&annotation.expr)?;
            select.columns.push(sql.alias(annotation.name.clone()));
            extra.push((annotation.name.clone(), Slot { ty, nullable: true }));
        }
        Ok(extra)
    }

    fn plan_joins(
        &self,
        frame: &mut Frame<'a>,
        tree: &RelationTree,
        statement: Option<usize>,
    ) -> Result<Vec<PlannedRelation<'a>>> {
        tree.joined_in(statement)
            .map(|index| {
                let path = tree.relative_path(index, statement);
                let (alias, target) = frame.scope.join_path(&path)?;
                Ok((index, alias, target))
            })
            .collect()
    }

    /// Renders the combined predicate, split into WHERE and HAVING parts.
    fn render_filter(
        &self,
        frame: &mut Frame<'a>,
        clauses: &ClauseSet,
    ) -> Result<(Option<Sql>, Option<Sql>)> {
        let predicate = clauses.predicate();
        let (having, filter): (Vec<Expr>, Vec<Expr>) = predicate
            .conjuncts()
            .iter()
            .cloned()
            .partition(|conjunct| frame.is_aggregate(conjunct));

        let filter = match filter.is_empty() {
            true => None,
            false => Some(frame.render(&Expr::all(filter))?),
        };
        let having = match having.is_empty() {
            true => None,
            false => Some(frame.render(&Expr::all(having))?),
        };
        Ok((filter, having))
    }

    /// ORDER BY terms with the stable tie-break appended.
    fn order_terms(&self, frame: &mut Frame<'a>, clauses: &ClauseSet) -> Result<Vec<Sql>> {
        let mut terms = Vec::with_capacity(clauses.ordering.len() + 1);
        for key in clauses.ordering.iter() {
            terms.push(self.order_term(frame, key)?);
        }
        if terms.is_empty() {
            return Ok(terms);
        }

        if clauses.is_grouped() {
            for key in clauses.group_by.iter() {
                if !clauses.ordering.iter().any(|o| o.path == *key) {
                    terms.push(self.order_term(frame, &OrderKey::asc(key.clone()))?);
                }
            }
        } else if !clauses.ordering.iter().any(|o| self.is_primary_key(&o.path)) {
            let pk = column_of(self.record, self.record.primary_key_name())?;
            terms.push(Sql::column(ROOT_ALIAS, pk).push(Token::ASC));
        }
        Ok(terms)
    }

    fn order_term(&self, frame: &mut Frame<'a>, key: &OrderKey) -> Result<Sql> {
        let sql = match frame.annotation(&key.path) {
            Some(annotation) => Sql::ident(annotation.name.clone()),
            None => frame.scope.resolve(&key.path)?.sql,
        };
        Ok(sql.push(if key.descending { Token::DESC } else { Token::ASC }))
    }

    fn is_primary_key(&self, path: &FieldPath) -> bool {
        path.is_simple()
            && (path.first() == PK_ALIAS || path.first() == self.record.primary_key_name())
    }

    // =========================================================================
    // Helpers
    // =========================================================================

    fn frame(&self, clauses: &ClauseSet) -> Frame<'a> {
        Frame::new(
            Scope::new(self.schema, self.record, self.record.name()),
            clauses.annotations.to_vec().into_iter().cloned().collect(),
        )
    }

    /// Whether the row set must be materialized in a subquery before counting.
    fn needs_subquery(&self, frame: &Frame<'a>, clauses: &ClauseSet) -> bool {
        clauses.distinct
            || clauses.window.is_bounded()
            || clauses.is_grouped()
            || frame
                .annotations
                .iter()
                .any(|annotation| frame.is_aggregate(&annotation.expr))
            || clauses
                .predicate()
                .conjuncts()
                .iter()
                .any(|conjunct| frame.is_aggregate(conjunct))
    }

    fn invalid(&self, reason: impl Into<String>) -> QueryError {
        QueryError::invalid_query(self.record.name(), reason)
    }
}

/// Shape and slots of `record`'s columns followed by `extra` annotation slots.
fn record_layout(record: &RecordType, extra: Vec<(CompactString, Slot)>) -> Layout {
    let mut names: Vec<CompactString> = Vec::new();
    let mut slots = Vec::new();
    for field in record.columns() {
        names.push(field.name().into());
        slots.push(Slot {
            ty: field.field_type(),
            nullable: field.is_nullable(),
        });
    }
    let pk = names.iter().position(|n| n == record.primary_key_name());
    let fields = names.len();
    for (name, slot) in extra {
        names.push(name);
        slots.push(slot);
    }
    Layout {
        shape: Arc::new(Shape::new(record.name(), names, fields, pk)),
        slots,
    }
}

/// Adds `record`'s columns, qualified by the root alias.
fn select_columns(record: &RecordType, select: &mut Select, plain: &mut Vec<Sql>) {
    for column in record.columns().filter_map(FieldDef::column) {
        let sql = Sql::column(ROOT_ALIAS, column);
        plain.push(sql.clone());
        select.columns.push(sql);
    }
}

/// Adds the columns of joined relations as `path__field` and their layouts.
fn select_joined(
    tree: &RelationTree,
    statement: Option<usize>,
    joined: &[PlannedRelation<'_>],
    select: &mut Select,
    projection: &mut Projection,
    plain: &mut Vec<Sql>,
) {
    for (index, alias, target) in joined {
        let node = tree.node(*index);
        let prefix = tree.relative_path(*index, statement);
        for field in target.columns() {
            let Some(column) = field.column() else {
                continue;
            };
            let sql = Sql::column(alias.clone(), column);
            plain.push(sql.clone());
            select
                .columns
                .push(sql.alias(format_compact!("{}__{}", prefix, field.name())));
        }
        let parent = node
            .parent
            .and_then(|p| joined.iter().position(|(other, _, _)| *other == p));
        projection.joined.push(JoinedLayout {
            name: node.name.clone(),
            parent,
            layout: record_layout(target, Vec::new()),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clause::{LoadMode, RelationHint};
    use crate::expr::{col, count, lookup, sum};
    use crate::schema::{RelationInfo, Schema};
    use quarry_types::FieldType;

    fn shop() -> Schema {
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
                    .relation("customer", RelationInfo::many_to_one("customer", "customer_id"))
                    .relation(
                        "tags",
                        RelationInfo::many_to_many("tag", "order_tags", "order_id", "tag_id"),
                    ),
            )
            .record(
                RecordType::new("tag")
                    .table("tags")
                    .field("id", FieldType::Integer)
                    .field("label", FieldType::Text)
                    .primary_key("id"),
            )
            .build()
            .unwrap()
    }

    fn filtered(exprs: impl IntoIterator<Item = Expr>) -> ClauseSet {
        let mut clauses = ClauseSet::default();
        for expr in exprs {
            clauses.filters = clauses.filters.push(expr);
        }
        clauses
    }

    #[test]
    fn test_scenario_base_statement() {
        let schema = shop();
        let compiler = Compiler::new(&schema, "order", Dialect::SQLite).unwrap();
        let mut clauses = filtered([lookup("total__gte", 100)]);
        clauses.ordering = Arc::from([OrderKey::parse("-total")]);
        clauses.relations = clauses.relations.push(RelationHint {
            path: FieldPath::parse("customer"),
            mode: LoadMode::Batch,
        });

        let stmt = compiler.compile(&clauses).unwrap();
        assert_eq!(
            stmt.sql,
            r#"SELECT "t0"."id", "t0"."total", "t0"."customer_id" FROM "orders" AS "t0" WHERE "t0"."total" >= ? ORDER BY "t0"."total" DESC, "t0"."id" ASC"#
        );
        assert_eq!(stmt.params, [Value::Integer(100)]);
    }

    #[test]
    fn test_successive_filters_compile_like_conjunction() {
        let schema = shop();
        let compiler = Compiler::new(&schema, "order", Dialect::PostgreSQL).unwrap();
        let p1 = col("total").gte(100);
        let p2 = col("customer__name").like("A%");

        let chained = compiler.compile(&filtered([p1.clone(), p2.clone()])).unwrap();
        let combined = compiler.compile(&filtered([p1 & p2])).unwrap();
        assert_eq!(chained, combined);
        assert_eq!(
            chained.sql,
            r#"SELECT "t0"."id", "t0"."total", "t0"."customer_id" FROM "orders" AS "t0" LEFT JOIN "customers" AS "t1" ON "t1"."id" = "t0"."customer_id" WHERE "t0"."total" >= $1 AND "t1"."name" LIKE $2"#
        );
    }

    #[test]
    fn test_join_mode_selects_namespaced_columns() {
        let schema = shop();
        let compiler = Compiler::new(&schema, "order", Dialect::MySQL).unwrap();
        let mut clauses = ClauseSet::default();
        clauses.relations = clauses.relations.push(RelationHint {
            path: FieldPath::parse("customer"),
            mode: LoadMode::Join,
        });
        clauses.window = Window::new(Some(10), 20);

        let stmt = compiler.compile(&clauses).unwrap();
        assert_eq!(
            stmt.sql,
            "SELECT `t0`.`id`, `t0`.`total`, `t0`.`customer_id`, `t1`.`id` AS `customer__id`, `t1`.`name` AS `customer__name` FROM `orders` AS `t0` LEFT JOIN `customers` AS `t1` ON `t1`.`id` = `t0`.`customer_id` LIMIT ? OFFSET ?"
        );
        assert_eq!(stmt.params, [Value::Integer(10), Value::Integer(20)]);
    }

    #[test]
    fn test_excludes_and_empty_membership() {
        let schema = shop();
        let compiler = Compiler::new(&schema, "order", Dialect::SQLite).unwrap();
        let mut clauses = filtered([col("id").is_in(Vec::<i64>::new())]);
        clauses.excludes = clauses.excludes.push(col("total").lt(5) | col("total").gt(500));

        let stmt = compiler.compile(&clauses).unwrap();
        assert!(stmt.sql.ends_with(
            r#"WHERE 0 AND NOT ("t0"."total" < ? OR "t0"."total" > ?)"#
        ));
        assert_eq!(stmt.params, [Value::Integer(5), Value::Integer(500)]);
    }

    #[test]
    fn test_negation_guards_nullable_operands() {
        let schema = shop();
        let compiler = Compiler::new(&schema, "order", Dialect::SQLite).unwrap();

        let mut clauses = ClauseSet::default();
        clauses.excludes = clauses.excludes.push(lookup("customer__name", "Alice"));
        let stmt = compiler.compile(&clauses).unwrap();
        assert!(stmt.sql.ends_with(
            r#"WHERE NOT ("t1"."name" = ? AND "t1"."name" IS NOT NULL)"#
        ));

        let clauses = filtered([!(col("total").gt(5) & !col("customer__name").eq("Bob"))]);
        let stmt = compiler.compile(&clauses).unwrap();
        assert!(stmt.sql.ends_with(
            r#"WHERE NOT ("t0"."total" > ? AND (NOT ("t1"."name" = ?) AND "t1"."name" IS NOT NULL))"#
        ));

        // non-nullable operands render unguarded
        let clauses = filtered([!col("total").gt(5)]);
        let stmt = compiler.compile(&clauses).unwrap();
        assert!(stmt.sql.ends_with(r#"WHERE NOT ("t0"."total" > ?)"#));
    }

    #[test]
    fn test_aggregate_annotation_groups_and_uses_having() {
        let schema = shop();
        let compiler = Compiler::new(&schema, "customer", Dialect::PostgreSQL).unwrap();
        let mut clauses = filtered([col("n").gt(1)]);
        clauses.annotations = clauses.annotations.push(Annotation {
            name: "n".into(),
            expr: count(col("orders")),
        });
        clauses.ordering = Arc::from([OrderKey::parse("-n")]);

        let stmt = compiler.compile(&clauses).unwrap();
        assert_eq!(
            stmt.sql,
            r#"SELECT "t0"."id", "t0"."name", COUNT("t1"."id") AS "n" FROM "customers" AS "t0" LEFT JOIN "orders" AS "t1" ON "t1"."customer_id" = "t0"."id" GROUP BY "t0"."id", "t0"."name" HAVING COUNT("t1"."id") > $1 ORDER BY "n" DESC, "t0"."id" ASC"#
        );
    }

    #[test]
    fn test_group_by_projects_keys_and_annotations() {
        let schema = shop();
        let compiler = Compiler::new(&schema, "order", Dialect::SQLite).unwrap();
        let mut clauses = ClauseSet::default();
        clauses.group_by = Arc::from([FieldPath::parse("customer__name")]);
        clauses.annotations = clauses.annotations.push(Annotation {
            name: "spent".into(),
            expr: sum(col("total")),
        });

        let plan = compiler.plan(&clauses).unwrap();
        assert_eq!(
            plan.statement.sql,
            r#"SELECT "t1"."name" AS "customer__name", SUM("t0"."total") AS "spent" FROM "orders" AS "t0" LEFT JOIN "customers" AS "t1" ON "t1"."id" = "t0"."customer_id" GROUP BY "t1"."name""#
        );
        assert_eq!(plan.projection.shape().names(), ["customer__name", "spent"]);
    }

    #[test]
    fn test_grouped_query_rejects_relation_hints() {
        let schema = shop();
        let compiler = Compiler::new(&schema, "order", Dialect::SQLite).unwrap();
        let mut clauses = ClauseSet::default();
        clauses.group_by = Arc::from([FieldPath::parse("customer_id")]);
        clauses.relations = clauses.relations.push(RelationHint {
            path: FieldPath::parse("customer"),
            mode: LoadMode::Batch,
        });
        assert!(matches!(
            compiler.compile(&clauses),
            Err(QueryError::InvalidQuery { .. })
        ));
    }

    #[test]
    fn test_count_wraps_windowed_query() {
        let schema = shop();
        let compiler = Compiler::new(&schema, "order", Dialect::PostgreSQL).unwrap();
        let mut clauses = filtered([col("total").gt(0)]);
        assert_eq!(
            compiler.compile_count(&clauses).unwrap().sql,
            r#"SELECT COUNT(*) FROM "orders" AS "t0" WHERE "t0"."total" > $1"#
        );

        clauses.window = Window::new(Some(5), 0);
        assert_eq!(
            compiler.compile_count(&clauses).unwrap().sql,
            r#"SELECT COUNT(*) FROM (SELECT "t0"."id", "t0"."total", "t0"."customer_id" FROM "orders" AS "t0" WHERE "t0"."total" > $1 LIMIT $2) AS "sub""#
        );
    }

    #[test]
    fn test_exists_limits_to_one_row() {
        let schema = shop();
        let compiler = Compiler::new(&schema, "order", Dialect::SQLite).unwrap();
        let stmt = compiler.compile_exists(&filtered([col("total").gt(0)])).unwrap();
        assert_eq!(
            stmt.sql,
            r#"SELECT 1 FROM "orders" AS "t0" WHERE "t0"."total" > ? LIMIT ?"#
        );
        assert_eq!(stmt.params, [Value::Integer(0), Value::Integer(1)]);
    }

    #[test]
    fn test_many_to_many_batch_statement() {
        let schema = shop();
        let order = schema.record_type("order").unwrap();
        let compiler = Compiler::new(&schema, "order", Dialect::SQLite).unwrap();
        let tree = RelationTree::build(
            &schema,
            order,
            &[RelationHint {
                path: FieldPath::parse("tags"),
                mode: LoadMode::Batch,
            }],
        )
        .unwrap();

        let plan = compiler
            .plan_batch(&tree, 0, &[Value::Integer(1), Value::Integer(3)])
            .unwrap();
        assert_eq!(
            plan.statement.sql,
            r#"SELECT "t0"."id", "t0"."label", "t1"."order_id" FROM "tags" AS "t0" INNER JOIN "order_tags" AS "t1" ON "t1"."tag_id" = "t0"."id" WHERE "t1"."order_id" IN (?, ?) ORDER BY "t0"."id" ASC"#
        );
        assert!(plan.projection.key.is_some());
    }

    #[test]
    fn test_unknown_relation_segment_fails_at_compile() {
        let schema = shop();
        let compiler = Compiler::new(&schema, "order", Dialect::SQLite).unwrap();
        let err = compiler
            .compile(&filtered([col("customer__nme").eq("x")]))
            .unwrap_err();
        assert!(matches!(
            err,
            QueryError::FieldReference { ref path, ref record_type }
                if path == "customer__nme" && record_type == "order"
        ));
    }
}
