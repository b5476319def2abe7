//! `field__path__op` lookup strings.

use chrono::{NaiveDate, NaiveDateTime};
use compact_str::CompactString;
use quarry_types::Value;

use super::{Expr, FieldPath, Operand, Operator, PATH_SEPARATOR};

/// Argument of a lookup; its shape must match the operator.
#[derive(Debug, Clone, PartialEq)]
pub enum LookupArg {
    Value(Value),
    List(Vec<Value>),
    Pair(Value, Value),
    Expr(Expr),
}

macro_rules! lookup_arg_scalar {
    ($($t:ty),+ $(,)?) => {
        $(
            impl From<$t> for LookupArg {
                #[inline]
                fn from(value: $t) -> Self {
                    LookupArg::Value(Value::from(value))
                }
            }
        )+
    };
}

lookup_arg_scalar!(
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
    NaiveDate,
    NaiveDateTime,
    Value,
);

impl<T: Into<Value>> From<Option<T>> for LookupArg {
    fn from(value: Option<T>) -> Self {
        LookupArg::Value(Value::from(value))
    }
}

impl<T: Into<Value>> From<Vec<T>> for LookupArg {
    fn from(values: Vec<T>) -> Self {
        LookupArg::List(values.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<Value>, const N: usize> From<[T; N]> for LookupArg {
    fn from(values: [T; N]) -> Self {
        LookupArg::List(values.into_iter().map(Into::into).collect())
    }
}

impl<A: Into<Value>, B: Into<Value>> From<(A, B)> for LookupArg {
    fn from((low, high): (A, B)) -> Self {
        LookupArg::Pair(low.into(), high.into())
    }
}

impl From<Expr> for LookupArg {
    fn from(expr: Expr) -> Self {
        LookupArg::Expr(expr)
    }
}

fn parse_operator(suffix: &str) -> Option<Operator> {
    Some(match suffix {
        "exact" | "eq" => Operator::Eq,
        "ne" => Operator::Ne,
        "lt" => Operator::Lt,
        "lte" => Operator::Lte,
        "gt" => Operator::Gt,
        "gte" => Operator::Gte,
        "in" => Operator::In,
        "like" => Operator::Like,
        "isnull" | "is_null" => Operator::IsNull,
        "range" => Operator::Range,
        _ => return None,
    })
}

/// Builds a comparison from a lookup string such as `"total__gte"` or
/// `"customer__name"`.
///
/// The last segment selects the operator when it names one; otherwise the
/// whole string is the field path and the operator is `exact`. An argument
/// whose shape does not fit the operator is reported when the expression is
/// attached to a query.
pub fn lookup(spec: &str, arg: impl Into<LookupArg>) -> Expr {
    let (path, op) = match spec.rsplit_once(PATH_SEPARATOR) {
        Some((path, suffix)) => match parse_operator(suffix) {
            Some(op) => (path, op),
            None => (spec, Operator::Eq),
        },
        None => (spec, Operator::Eq),
    };
    let lhs = Expr::Column(super::ColumnRef::new(FieldPath::parse(path)));
    let arg = arg.into();

    match (op, arg) {
        (Operator::Eq, LookupArg::Value(v)) => lhs.eq(v),
        (Operator::Ne, LookupArg::Value(v)) => lhs.ne(v),
        (Operator::In, LookupArg::List(values)) => lhs.is_in(values),
        (Operator::In, LookupArg::Pair(a, b)) => lhs.is_in([a, b]),
        (Operator::In, LookupArg::Value(v)) => lhs.is_in([v]),
        (Operator::Range, LookupArg::Pair(low, high)) => lhs.range(low, high),
        (Operator::Range, LookupArg::List(values)) if values.len() == 2 => {
            let mut values = values.into_iter();
            let low = values.next().unwrap_or_default();
            let high = values.next().unwrap_or_default();
            lhs.range(low, high)
        }
        (Operator::IsNull, LookupArg::Value(v)) => match v.as_bool() {
            Some(flag) => lhs.is_null(flag),
            None => Expr::comparison(lhs, op, Operand::Expr(Expr::Literal(v))),
        },
        (op, LookupArg::Value(v)) => Expr::comparison(lhs, op, Operand::Expr(Expr::Literal(v))),
        (op, LookupArg::Expr(e)) => Expr::comparison(lhs, op, Operand::Expr(e)),
        (op, LookupArg::List(values)) => Expr::comparison(lhs, op, Operand::List(values.into())),
        (op, LookupArg::Pair(a, b)) => Expr::comparison(lhs, op, Operand::Range(a, b)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::col;

    #[test]
    fn test_suffix_selects_operator() {
        assert_eq!(lookup("total__gte", 100), col("total").gte(100));
        assert_eq!(lookup("total", 100), col("total").eq(100));
        assert_eq!(lookup("customer__name", "Bob"), col("customer__name").eq("Bob"));
        assert_eq!(
            lookup("customer__name__like", "B%"),
            col("customer__name").like("B%")
        );
    }

    #[test]
    fn test_argument_shapes() {
        assert_eq!(lookup("id__in", vec![1, 2]), col("id").is_in([1, 2]));
        assert_eq!(lookup("id__in", [3]), col("id").is_in([3]));
        assert_eq!(lookup("total__range", (10, 20)), col("total").range(10, 20));
        assert_eq!(lookup("note__isnull", true), col("note").is_null(true));
        assert_eq!(lookup("note", None::<&str>), col("note").is_null(true));
    }
}
