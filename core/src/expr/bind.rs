//! Binding expressions to a record type at the chaining call.

use std::sync::Arc;

use crate::error::{QueryError, Result};
use crate::schema::RecordType;

use super::{Binding, ColumnRef, Comparison, Expr, Operand, Operator};

/// What a column reference may name when an expression is attached to a query.
pub(crate) struct BindContext<'a> {
    pub record: &'a RecordType,
    /// Annotation names defined so far, in definition order.
    pub annotations: Vec<&'a str>,
}

impl BindContext<'_> {
    fn bind_column(&self, col: &ColumnRef) -> Result<ColumnRef> {
        let path = col.path();
        let first = path.first();

        if path.is_simple() {
            if self.annotations.contains(&first) {
                return Ok(col.clone().bound(Binding::Annotation));
            }
            return match self.record.field_named(first) {
                Some(field) => match field.field_type() {
                    Some(ty) => Ok(col.clone().bound(Binding::Field(ty))),
                    // A bare relation compares its key; resolved once joins are planned.
                    None => Ok(col.clone()),
                },
                None => Err(self.unresolved(col)),
            };
        }

        // Later segments are checked by the compiler against the joined record types.
        match self.record.field_named(first) {
            Some(field) if field.relation().is_some() => Ok(col.clone()),
            _ => Err(self.unresolved(col)),
        }
    }

    fn unresolved(&self, col: &ColumnRef) -> QueryError {
        QueryError::field_reference(col.path().to_compact(), self.record.name())
    }
}

/// Returns a copy of `expr` with its column references bound.
///
/// Fails with [`QueryError::FieldReference`] when a path names nothing on the
/// record type, and with [`QueryError::InvalidQuery`] when a comparison's
/// argument does not fit its operator.
pub(crate) fn bind_expr(ctx: &BindContext<'_>, expr: &Expr) -> Result<Expr> {
    Ok(match expr {
        Expr::Column(col) => Expr::Column(ctx.bind_column(col)?),
        Expr::Literal(_) => expr.clone(),
        Expr::Combinator { op, children } => Expr::Combinator {
            op: *op,
            children: bind_all(ctx, children)?,
        },
        Expr::Comparison(cmp) => {
            check_operand(ctx, cmp)?;
            let rhs = match &cmp.rhs {
                Operand::Expr(rhs) => Operand::Expr(bind_expr(ctx, rhs)?),
                other => other.clone(),
            };
            Expr::Comparison(Arc::new(Comparison {
                lhs: bind_expr(ctx, &cmp.lhs)?,
                op: cmp.op,
                rhs,
            }))
        }
        Expr::Computed { func, args } => Expr::Computed {
            func: *func,
            args: bind_all(ctx, args)?,
        },
    })
}

fn bind_all(ctx: &BindContext<'_>, exprs: &[Expr]) -> Result<Arc<[Expr]>> {
    exprs.iter().map(|e| bind_expr(ctx, e)).collect()
}

fn check_operand(ctx: &BindContext<'_>, cmp: &Comparison) -> Result<()> {
    let fits = match cmp.op {
        Operator::In => matches!(cmp.rhs, Operand::List(_)),
        Operator::IsNull => matches!(cmp.rhs, Operand::Flag(_)),
        Operator::Range => matches!(cmp.rhs, Operand::Range(..)),
        _ => matches!(cmp.rhs, Operand::Expr(_)),
    };
    if fits {
        return Ok(());
    }
    Err(QueryError::invalid_query(
        ctx.record.name(),
        format!(
            "`{}` lookup on `{}` cannot take this argument",
            cmp.op.lookup_name(),
            cmp.lhs
        ),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::{col, lookup};
    use crate::schema::{RelationInfo, Schema, SchemaDescriptor};
    use quarry_types::FieldType;

    fn schema() -> Schema {
        Schema::builder()
            .record(
                RecordType::new("customer")
                    .field("id", FieldType::Integer)
                    .field("name", FieldType::Text)
                    .primary_key("id"),
            )
            .record(
                RecordType::new("order")
                    .field("id", FieldType::Integer)
                    .field("total", FieldType::Integer)
                    .field("customer_id", FieldType::Integer)
                    .primary_key("id")
                    .relation("customer", RelationInfo::many_to_one("customer", "customer_id")),
            )
            .build()
            .unwrap()
    }

    #[test]
    fn test_binds_fields_and_annotations() {
        let schema = schema();
        let ctx = BindContext {
            record: schema.record_type("order").unwrap(),
            annotations: vec!["n"],
        };

        let bound = bind_expr(&ctx, &(col("total").gte(1) & col("n").gt(0))).unwrap();
        assert!(bound.is_resolved());

        let deferred = bind_expr(&ctx, &col("customer__name").eq("Bob")).unwrap();
        assert!(!deferred.is_resolved());
    }

    #[test]
    fn test_unknown_fields_fail_at_bind() {
        let schema = schema();
        let ctx = BindContext {
            record: schema.record_type("order").unwrap(),
            annotations: Vec::new(),
        };

        let err = bind_expr(&ctx, &col("totl").eq(1)).unwrap_err();
        assert!(matches!(
            err,
            QueryError::FieldReference { ref path, ref record_type }
                if path == "totl" && record_type == "order"
        ));

        // `total` is a column, not a relation
        let err = bind_expr(&ctx, &col("total__name").eq(1)).unwrap_err();
        assert!(matches!(err, QueryError::FieldReference { .. }));
    }

    #[test]
    fn test_misshapen_lookup_argument() {
        let schema = schema();
        let ctx = BindContext {
            record: schema.record_type("order").unwrap(),
            annotations: Vec::new(),
        };
        let err = bind_expr(&ctx, &lookup("total__range", 5)).unwrap_err();
        assert!(matches!(err, QueryError::InvalidQuery { .. }));
    }
}
