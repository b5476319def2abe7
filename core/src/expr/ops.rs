//! Builders and operators for expression trees.
//!
//! Comparison methods live on [`Expr`]; boolean composition uses `&`, `|`
//! and `!`, arithmetic uses `+ - * /`.

use core::ops::{Add, BitAnd, BitOr, Div, Mul, Not, Sub};

use chrono::{NaiveDate, NaiveDateTime};
use compact_str::CompactString;
use quarry_types::Value;

use super::{Expr, Func, Operand, Operator};

// =============================================================================
// Conversion
// =============================================================================

/// Anything usable as an operand: expressions and plain values.
pub trait IntoExpr {
    fn into_expr(self) -> Expr;
}

impl IntoExpr for Expr {
    #[inline]
    fn into_expr(self) -> Expr {
        self
    }
}

impl IntoExpr for &Expr {
    #[inline]
    fn into_expr(self) -> Expr {
        self.clone()
    }
}

impl IntoExpr for Value {
    #[inline]
    fn into_expr(self) -> Expr {
        Expr::Literal(self)
    }
}

impl<T: Into<Value>> IntoExpr for Option<T> {
    #[inline]
    fn into_expr(self) -> Expr {
        Expr::Literal(Value::from(self))
    }
}

macro_rules! into_expr_literal {
    ($($t:ty),+ $(,)?) => {
        $(
            impl IntoExpr for $t {
                #[inline]
                fn into_expr(self) -> Expr {
                    Expr::Literal(Value::from(self))
                }
            }
        )+
    };
}

into_expr_literal!(
    i8,
    i16,
    i32,
    i64,
    u8,
    u16,
    u32,
    u64,
    f32,
    f64,
    bool,
    &str,
    String,
    CompactString,
    Vec<u8>,
    NaiveDate,
    NaiveDateTime,
);

// =============================================================================
// Leaf builders
// =============================================================================

/// Reference to a field, annotation or `__`-separated relation path.
pub fn col(path: &str) -> Expr {
    Expr::column(path)
}

/// A literal value; always bound as a parameter when compiled.
pub fn lit(value: impl Into<Value>) -> Expr {
    Expr::literal(value)
}

// =============================================================================
// Comparisons
// =============================================================================

impl Expr {
    fn compare(self, op: Operator, rhs: impl IntoExpr) -> Expr {
        match (op, rhs.into_expr()) {
            (Operator::Eq, Expr::Literal(Value::Null)) => self.is_null(true),
            (Operator::Ne, Expr::Literal(Value::Null)) => self.is_null(false),
            (op, rhs) => Expr::comparison(self, op, Operand::Expr(rhs)),
        }
    }

    /// `self = rhs`; comparing with NULL yields `IS NULL`.
    pub fn eq(self, rhs: impl IntoExpr) -> Expr {
        self.compare(Operator::Eq, rhs)
    }

    /// `self <> rhs`; comparing with NULL yields `IS NOT NULL`.
    pub fn ne(self, rhs: impl IntoExpr) -> Expr {
        self.compare(Operator::Ne, rhs)
    }

    pub fn lt(self, rhs: impl IntoExpr) -> Expr {
        self.compare(Operator::Lt, rhs)
    }

    pub fn lte(self, rhs: impl IntoExpr) -> Expr {
        self.compare(Operator::Lte, rhs)
    }

    pub fn gt(self, rhs: impl IntoExpr) -> Expr {
        self.compare(Operator::Gt, rhs)
    }

    pub fn gte(self, rhs: impl IntoExpr) -> Expr {
        self.compare(Operator::Gte, rhs)
    }

    pub fn like(self, pattern: impl IntoExpr) -> Expr {
        self.compare(Operator::Like, pattern)
    }

    /// Membership test. An empty list is rendered as a false literal.
    pub fn is_in<I>(self, values: I) -> Expr
    where
        I: IntoIterator,
        I::Item: Into<Value>,
    {
        let values: Vec<Value> = values.into_iter().map(Into::into).collect();
        Expr::comparison(self, Operator::In, Operand::List(values.into()))
    }

    /// `IS NULL` when `flag` is true, `IS NOT NULL` otherwise.
    pub fn is_null(self, flag: bool) -> Expr {
        Expr::comparison(self, Operator::IsNull, Operand::Flag(flag))
    }

    /// Inclusive `BETWEEN low AND high`.
    pub fn range(self, low: impl Into<Value>, high: impl Into<Value>) -> Expr {
        Expr::comparison(self, Operator::Range, Operand::Range(low.into(), high.into()))
    }
}

// =============================================================================
// Computed expressions
// =============================================================================

/// `COUNT(expr)`
pub fn count(expr: impl IntoExpr) -> Expr {
    Expr::computed(Func::Count, [expr.into_expr()])
}

/// `COUNT(DISTINCT expr)`
pub fn count_distinct(expr: impl IntoExpr) -> Expr {
    Expr::computed(Func::CountDistinct, [expr.into_expr()])
}

/// `COUNT(*)`
pub fn count_all() -> Expr {
    Expr::computed(Func::Count, [])
}

pub fn sum(expr: impl IntoExpr) -> Expr {
    Expr::computed(Func::Sum, [expr.into_expr()])
}

pub fn avg(expr: impl IntoExpr) -> Expr {
    Expr::computed(Func::Avg, [expr.into_expr()])
}

pub fn min(expr: impl IntoExpr) -> Expr {
    Expr::computed(Func::Min, [expr.into_expr()])
}

pub fn max(expr: impl IntoExpr) -> Expr {
    Expr::computed(Func::Max, [expr.into_expr()])
}

pub fn lower(expr: impl IntoExpr) -> Expr {
    Expr::computed(Func::Lower, [expr.into_expr()])
}

pub fn upper(expr: impl IntoExpr) -> Expr {
    Expr::computed(Func::Upper, [expr.into_expr()])
}

/// `COALESCE(a, b, ...)`: the first non-NULL argument.
pub fn coalesce<I>(exprs: I) -> Expr
where
    I: IntoIterator,
    I::Item: IntoExpr,
{
    Expr::computed(Func::Coalesce, exprs.into_iter().map(IntoExpr::into_expr))
}

// =============================================================================
// Operators
// =============================================================================

impl BitAnd for Expr {
    type Output = Expr;

    fn bitand(self, rhs: Expr) -> Expr {
        self.and(rhs)
    }
}

impl BitOr for Expr {
    type Output = Expr;

    fn bitor(self, rhs: Expr) -> Expr {
        self.or(rhs)
    }
}

impl Not for Expr {
    type Output = Expr;

    fn not(self) -> Expr {
        self.negate()
    }
}

macro_rules! arithmetic_op {
    ($($trait:ident :: $method:ident => $func:expr),+ $(,)?) => {
        $(
            impl<R: IntoExpr> $trait<R> for Expr {
                type Output = Expr;

                fn $method(self, rhs: R) -> Expr {
                    Expr::computed($func, [self, rhs.into_expr()])
                }
            }
        )+
    };
}

arithmetic_op!(
    Add::add => Func::Add,
    Sub::sub => Func::Sub,
    Mul::mul => Func::Mul,
    Div::div => Func::Div,
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_comparison_shapes() {
        let Expr::Comparison(cmp) = col("total").gte(100) else {
            panic!("expected comparison");
        };
        assert_eq!(cmp.op, Operator::Gte);
        assert_eq!(cmp.rhs, Operand::Expr(lit(100)));

        let Expr::Comparison(cmp) = col("id").is_in(Vec::<i64>::new()) else {
            panic!("expected comparison");
        };
        assert_eq!(cmp.rhs, Operand::List(Vec::new().into()));
    }

    #[test]
    fn test_arithmetic_builds_computed() {
        let expr = col("total") * 2 - col("discount");
        let Expr::Computed { func, args } = &expr else {
            panic!("expected computed");
        };
        assert_eq!(*func, Func::Sub);
        assert_eq!(args[1], col("discount"));
    }

    #[test]
    fn test_coalesce_accepts_mixed_operands() {
        let expr = coalesce([col("nickname"), col("name")]);
        assert_eq!(expr.to_string(), "COALESCE(nickname, name)");
    }
}
