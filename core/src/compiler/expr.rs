//! Expression rendering and result-type inference.

use quarry_types::{FieldType, Value};

use crate::clause::Annotation;
use crate::error::{QueryError, Result};
use crate::expr::{BoolOp, ColumnRef, Comparison, Expr, FieldPath, Func, Operand, Operator};
use crate::sql::{Sql, Token};

use super::scope::Scope;

/// Per-statement rendering state: the join scope and the visible annotations.
pub(crate) struct Frame<'a> {
    pub scope: Scope<'a>,
    pub annotations: Vec<Annotation>,
}

impl<'a> Frame<'a> {
    pub fn new(scope: Scope<'a>, annotations: Vec<Annotation>) -> Self {
        Self { scope, annotations }
    }

    /// Annotation named by a single-segment `path`.
    pub fn annotation(&self, path: &FieldPath) -> Option<&Annotation> {
        if !path.is_simple() {
            return None;
        }
        let name = path.first();
        self.annotations.iter().find(|a| a.name == name)
    }

    /// Whether `expr` aggregates, directly or through an annotation it references.
    pub fn is_aggregate(&self, expr: &Expr) -> bool {
        if expr.contains_aggregate() {
            return true;
        }
        let mut aggregate = false;
        expr.walk_columns(&mut |col| {
            if let Some(annotation) = self.annotation(col.path()) {
                aggregate |= self.is_aggregate(&annotation.expr);
            }
        });
        aggregate
    }

    // ==================== rendering ====================

    pub fn render(&mut self, expr: &Expr) -> Result<Sql> {
        match expr {
            Expr::Column(col) => self.render_column(col),
            Expr::Literal(value) => Ok(render_literal(value)),
            Expr::Combinator { op, children } => self.render_combinator(*op, children),
            Expr::Comparison(cmp) => self.render_comparison(cmp),
            Expr::Computed { func, args } => self.render_computed(*func, args),
        }
    }

    /// Renders `expr` as an operand of a larger expression.
    fn render_operand(&mut self, expr: &Expr) -> Result<Sql> {
        let sql = self.render(expr)?;
        Ok(match expr {
            Expr::Combinator {
                op: BoolOp::And | BoolOp::Or,
                children,
            } if children.len() > 1 => sql.parens(),
            Expr::Comparison(_) => sql.parens(),
            _ => sql,
        })
    }

    fn render_column(&mut self, col: &ColumnRef) -> Result<Sql> {
        if let Some(annotation) = self.annotation(col.path()) {
            let expr = annotation.expr.clone();
            return self.render_operand(&expr);
        }
        Ok(self.scope.resolve(col.path())?.sql)
    }

    fn render_combinator(&mut self, op: BoolOp, children: &[Expr]) -> Result<Sql> {
        match (op, children) {
            (BoolOp::Not, _) => {
                let (inner, _) = match children {
                    [only] => self.render_holds(only, true)?,
                    _ => self.render_connective(BoolOp::And, children, true)?,
                };
                Ok(Sql::token(Token::NOT).append(inner.parens()))
            }
            (BoolOp::And, []) => Ok(Sql::bool(true)),
            (BoolOp::Or, []) => Ok(Sql::bool(false)),
            (_, [only]) => self.render(only),
            (BoolOp::And | BoolOp::Or, _) => {
                let sep = if op == BoolOp::And { Token::AND } else { Token::OR };
                let parts = children
                    .iter()
                    .map(|child| match child {
                        Expr::Combinator { op: inner, children }
                            if *inner != BoolOp::Not && children.len() > 1 =>
                        {
                            self.render(child).map(Sql::parens)
                        }
                        _ => self.render(child),
                    })
                    .collect::<Result<Vec<_>>>()?;
                Ok(Sql::join(parts, sep))
            }
        }
    }

    // ==================== negation ====================

    /// Renders a two-valued predicate that is true exactly where `expr` evaluates to `truth`.
    ///
    /// A comparison with a NULL operand is unknown, and `NOT unknown` is unknown too, so a
    /// plain `NOT (p)` drops rows where `p` is NULL. Negated predicates go through here
    /// instead, guarding nullable operands with `IS NOT NULL`.
    ///
    /// The flag is set when the rendered SQL is a bare `AND`/`OR` chain.
    fn render_holds(&mut self, expr: &Expr, truth: bool) -> Result<(Sql, bool)> {
        match expr {
            Expr::Comparison(cmp) => {
                let mut sql = self.render_comparison(cmp)?;
                if !truth {
                    sql = Sql::token(Token::NOT).append(sql.parens());
                }
                let guards = self.null_guards(cmp)?;
                if guards.is_empty() {
                    return Ok((sql, false));
                }
                Ok((Sql::join(core::iter::once(sql).chain(guards), Token::AND), true))
            }
            Expr::Combinator {
                op: BoolOp::Not,
                children,
            } => match children.as_ref() {
                [only] => self.render_holds(only, !truth),
                _ => self.render_connective(BoolOp::And, children, !truth),
            },
            Expr::Combinator { op, children } => self.render_connective(*op, children, truth),
            other => {
                let sql = self.render_operand(other)?;
                if truth {
                    Ok((sql, false))
                } else {
                    Ok((Sql::token(Token::NOT).append(sql.parens()), false))
                }
            }
        }
    }

    /// `AND`/`OR` over `children`, each rendered to hold with `truth`.
    fn render_connective(&mut self, op: BoolOp, children: &[Expr], truth: bool) -> Result<(Sql, bool)> {
        // De Morgan: a conjunction is false where any child is false.
        let op = match (op, truth) {
            (BoolOp::And, false) => BoolOp::Or,
            (BoolOp::Or, false) => BoolOp::And,
            (op, _) => op,
        };
        match children {
            [] => Ok((Sql::bool(op == BoolOp::And), false)),
            [only] => self.render_holds(only, truth),
            _ => {
                let sep = if op == BoolOp::And { Token::AND } else { Token::OR };
                let parts = children
                    .iter()
                    .map(|child| {
                        let (sql, compound) = self.render_holds(child, truth)?;
                        Ok(if compound { sql.parens() } else { sql })
                    })
                    .collect::<Result<Vec<_>>>()?;
                Ok((Sql::join(parts, sep), true))
            }
        }
    }

    /// `operand IS NOT NULL` for every operand of `cmp` that can be NULL.
    fn null_guards(&mut self, cmp: &Comparison) -> Result<Vec<Sql>> {
        if cmp.op == Operator::IsNull {
            return Ok(Vec::new());
        }
        let mut guards = Vec::new();
        let rhs = match &cmp.rhs {
            Operand::Expr(rhs) => Some(rhs),
            _ => None,
        };
        for operand in core::iter::once(&cmp.lhs).chain(rhs) {
            if self.may_be_null(operand)? {
                let sql = self.render_operand(operand)?;
                guards.push(sql.push(Token::IS).push(Token::NOT).push(Token::NULL));
            }
        }
        Ok(guards)
    }

    /// Whether `expr` can evaluate to NULL on some row.
    fn may_be_null(&mut self, expr: &Expr) -> Result<bool> {
        Ok(match expr {
            Expr::Column(col) => match self.annotation(col.path()) {
                Some(annotation) => {
                    let expr = annotation.expr.clone();
                    self.may_be_null(&expr)?
                }
                None => self.scope.resolve(col.path())?.nullable,
            },
            Expr::Literal(value) => matches!(value, Value::Null),
            Expr::Computed { func, args } => match func {
                Func::Count | Func::CountDistinct => false,
                // empty groups, division by zero
                Func::Sum | Func::Avg | Func::Min | Func::Max | Func::Div => true,
                Func::Coalesce => {
                    let mut all = true;
                    for arg in args.iter() {
                        all &= self.may_be_null(arg)?;
                    }
                    all
                }
                _ => {
                    let mut any = false;
                    for arg in args.iter() {
                        any |= self.may_be_null(arg)?;
                    }
                    any
                }
            },
            Expr::Combinator { .. } | Expr::Comparison(_) => true,
        })
    }

    fn render_comparison(&mut self, cmp: &Comparison) -> Result<Sql> {
        let token = match cmp.op {
            Operator::Eq => Token::EQ,
            Operator::Ne => Token::NE,
            Operator::Lt => Token::LT,
            Operator::Lte => Token::LE,
            Operator::Gt => Token::GT,
            Operator::Gte => Token::GE,
            Operator::Like => Token::LIKE,
            Operator::In => Token::IN,
            Operator::IsNull => Token::IS,
            Operator::Range => Token::BETWEEN,
        };

        match (&cmp.op, &cmp.rhs) {
            (Operator::In, Operand::List(values)) if values.is_empty() => Ok(Sql::bool(false)),
            (Operator::In, Operand::List(values)) => {
                let list = Sql::join(values.iter().cloned().map(Sql::param), Token::COMMA);
                Ok(self.render_operand(&cmp.lhs)?.push(token).append(list.parens()))
            }
            (Operator::IsNull, Operand::Flag(is_null)) => {
                let mut sql = self.render_operand(&cmp.lhs)?.push(Token::IS);
                if !is_null {
                    sql.push_mut(Token::NOT);
                }
                Ok(sql.push(Token::NULL))
            }
            (Operator::Range, Operand::Range(low, high)) => Ok(self
                .render_operand(&cmp.lhs)?
                .push(token)
                .append(Sql::param(low.clone()))
                .push(Token::AND)
                .append(Sql::param(high.clone()))),
            (
                Operator::Eq
                | Operator::Ne
                | Operator::Lt
                | Operator::Lte
                | Operator::Gt
                | Operator::Gte
                | Operator::Like,
                Operand::Expr(rhs),
            ) => {
                let lhs = self.render_operand(&cmp.lhs)?;
                let rhs = self.render_operand(rhs)?;
                Ok(lhs.push(token).append(rhs))
            }
            _ => Err(QueryError::invalid_query(
                self.scope.root().name(),
                format!("`{}` lookup on `{}` cannot take this argument", cmp.op.lookup_name(), cmp.lhs),
            )),
        }
    }

    fn render_computed(&mut self, func: Func, args: &[Expr]) -> Result<Sql> {
        if func.is_arithmetic() {
            let token = match func {
                Func::Add => Token::PLUS,
                Func::Sub => Token::MINUS,
                Func::Mul => Token::STAR,
                _ => Token::SLASH,
            };
            let parts = args
                .iter()
                .map(|arg| self.render_operand(arg))
                .collect::<Result<Vec<_>>>()?;
            return Ok(Sql::join(parts, token).parens());
        }

        let mut inner = match (func, args) {
            (Func::Count, []) => Sql::token(Token::STAR),
            _ => {
                let parts = args
                    .iter()
                    .map(|arg| self.render_operand(arg))
                    .collect::<Result<Vec<_>>>()?;
                Sql::join(parts, Token::COMMA)
            }
        };
        if func == Func::CountDistinct {
            inner = Sql::token(Token::DISTINCT).append(inner);
        }
        Ok(Sql::func(func.sql_name(), inner))
    }

    // ==================== typing ====================

    /// Result type of `expr`, when it can be determined.
    pub fn infer(&mut self, expr: &Expr) -> Result<Option<FieldType>> {
        Ok(match expr {
            Expr::Column(col) => match self.annotation(col.path()) {
                Some(annotation) => {
                    let expr = annotation.expr.clone();
                    self.infer(&expr)?
                }
                None => Some(self.scope.resolve(col.path())?.ty),
            },
            Expr::Literal(value) => literal_type(value),
            Expr::Combinator { .. } | Expr::Comparison(_) => Some(FieldType::Boolean),
            Expr::Computed { func, args } => match func {
                Func::Count | Func::CountDistinct => Some(FieldType::Integer),
                Func::Avg => Some(FieldType::Real),
                Func::Lower | Func::Upper => Some(FieldType::Text),
                Func::Sum | Func::Min | Func::Max | Func::Coalesce => match args.first() {
                    Some(first) => self.infer(first)?,
                    None => None,
                },
                Func::Add | Func::Sub | Func::Mul | Func::Div => {
                    let mut out = Some(FieldType::Integer);
                    for arg in args.iter() {
                        out = match (out, self.infer(arg)?) {
                            (Some(FieldType::Integer), Some(FieldType::Integer)) => {
                                Some(FieldType::Integer)
                            }
                            (Some(a), Some(b)) if a.is_numeric() && b.is_numeric() => {
                                Some(FieldType::Real)
                            }
                            _ => None,
                        };
                    }
                    out
                }
            },
        })
    }
}

fn render_literal(value: &Value) -> Sql {
    match value {
        Value::Null => Sql::token(Token::NULL),
        Value::Bool(b) => Sql::bool(*b),
        other => Sql::param(other.clone()),
    }
}

fn literal_type(value: &Value) -> Option<FieldType> {
    Some(match value {
        Value::Null => return None,
        Value::Bool(_) => FieldType::Boolean,
        Value::Integer(_) => FieldType::Integer,
        Value::Real(_) => FieldType::Real,
        Value::Text(_) => FieldType::Text,
        Value::Blob(_) => FieldType::Blob,
        Value::Date(_) => FieldType::Date,
        Value::Timestamp(_) => FieldType::Timestamp,
    })
}
