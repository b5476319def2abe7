//! Expression tree.
//!
//! Expressions are immutable values. Children are held behind `Arc`, so
//! combining, cloning and storing an expression in several query objects
//! shares the subtrees instead of copying them.
//!
//! ```ignore
//! use quarry_core::expr::{col, count};
//!
//! let big = col("total").gte(100) & !col("customer__name").like("A%");
//! let orders = count(col("orders__id"));
//! ```

mod bind;
mod lookup;
mod ops;

use core::fmt;
use core::hash::{Hash, Hasher};
use std::sync::Arc;

use compact_str::CompactString;
use quarry_types::{FieldType, Value};

pub use lookup::{LookupArg, lookup};
pub use ops::*;

pub(crate) use bind::{BindContext, bind_expr};

// =============================================================================
// Field paths
// =============================================================================

/// Separator between the segments of a lookup path.
pub const PATH_SEPARATOR: &str = "__";

/// A `__`-separated path from a record type to a field, possibly across relations.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FieldPath(Arc<[CompactString]>);

impl FieldPath {
    pub fn parse(path: &str) -> Self {
        Self(path.split(PATH_SEPARATOR).map(CompactString::from).collect())
    }

    pub fn from_segments<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<CompactString>,
    {
        Self(segments.into_iter().map(Into::into).collect())
    }

    pub fn segments(&self) -> &[CompactString] {
        &self.0
    }

    pub fn first(&self) -> &str {
        self.0.first().map_or("", CompactString::as_str)
    }

    pub fn last(&self) -> &str {
        self.0.last().map_or("", CompactString::as_str)
    }

    /// `true` for a path naming a field on the record type itself.
    pub fn is_simple(&self) -> bool {
        self.0.len() == 1
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The first `n` segments.
    pub fn prefix(&self, n: usize) -> FieldPath {
        Self(self.0[..n.min(self.0.len())].iter().cloned().collect())
    }

    /// Path joined back with `__`.
    pub fn to_compact(&self) -> CompactString {
        let mut out = CompactString::default();
        for (i, seg) in self.0.iter().enumerate() {
            if i > 0 {
                out.push_str(PATH_SEPARATOR);
            }
            out.push_str(seg);
        }
        out
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_compact())
    }
}

impl From<&str> for FieldPath {
    fn from(value: &str) -> Self {
        Self::parse(value)
    }
}

// =============================================================================
// Column references
// =============================================================================

/// What a column reference was resolved to when it was bound to a query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Binding {
    /// A column of the queried record type.
    Field(FieldType),
    /// A previously defined annotation.
    Annotation,
}

/// Reference to a field or annotation by path.
///
/// Equality and hashing only consider the path; the binding slot is filled
/// in when the expression is attached to a query object.
#[derive(Debug, Clone)]
pub struct ColumnRef {
    path: FieldPath,
    binding: Option<Binding>,
}

impl ColumnRef {
    pub fn new(path: FieldPath) -> Self {
        Self {
            path,
            binding: None,
        }
    }

    pub fn path(&self) -> &FieldPath {
        &self.path
    }

    pub fn binding(&self) -> Option<Binding> {
        self.binding
    }

    pub(crate) fn bound(mut self, binding: Binding) -> Self {
        self.binding = Some(binding);
        self
    }
}

impl PartialEq for ColumnRef {
    fn eq(&self, other: &Self) -> bool {
        self.path == other.path
    }
}

impl Eq for ColumnRef {}

impl Hash for ColumnRef {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.path.hash(state);
    }
}

// =============================================================================
// Nodes
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BoolOp {
    And,
    Or,
    Not,
}

impl BoolOp {
    pub const fn as_str(&self) -> &'static str {
        match self {
            BoolOp::And => "AND",
            BoolOp::Or => "OR",
            BoolOp::Not => "NOT",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operator {
    Eq,
    Ne,
    Lt,
    Lte,
    Gt,
    Gte,
    In,
    Like,
    IsNull,
    Range,
}

impl Operator {
    /// Lookup suffix naming this operator.
    pub const fn lookup_name(&self) -> &'static str {
        match self {
            Operator::Eq => "exact",
            Operator::Ne => "ne",
            Operator::Lt => "lt",
            Operator::Lte => "lte",
            Operator::Gt => "gt",
            Operator::Gte => "gte",
            Operator::In => "in",
            Operator::Like => "like",
            Operator::IsNull => "isnull",
            Operator::Range => "range",
        }
    }
}

/// Right-hand side of a comparison.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Operand {
    Expr(Expr),
    List(Arc<[Value]>),
    Range(Value, Value),
    Flag(bool),
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Comparison {
    pub lhs: Expr,
    pub op: Operator,
    pub rhs: Operand,
}

/// Function applied by a [`Expr::Computed`] node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Func {
    /// `COUNT(x)`; with no arguments `COUNT(*)`
    Count,
    CountDistinct,
    Sum,
    Avg,
    Min,
    Max,
    Add,
    Sub,
    Mul,
    Div,
    Lower,
    Upper,
    Coalesce,
}

impl Func {
    pub const fn is_aggregate(&self) -> bool {
        matches!(
            self,
            Func::Count | Func::CountDistinct | Func::Sum | Func::Avg | Func::Min | Func::Max
        )
    }

    pub const fn is_arithmetic(&self) -> bool {
        matches!(self, Func::Add | Func::Sub | Func::Mul | Func::Div)
    }

    /// SQL function name, or the operator symbol for arithmetic.
    pub const fn sql_name(&self) -> &'static str {
        match self {
            Func::Count | Func::CountDistinct => "COUNT",
            Func::Sum => "SUM",
            Func::Avg => "AVG",
            Func::Min => "MIN",
            Func::Max => "MAX",
            Func::Lower => "LOWER",
            Func::Upper => "UPPER",
            Func::Coalesce => "COALESCE",
            Func::Add => "+",
            Func::Sub => "-",
            Func::Mul => "*",
            Func::Div => "/",
        }
    }
}

/// A node of the expression tree.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Expr {
    Column(ColumnRef),
    Literal(Value),
    Combinator { op: BoolOp, children: Arc<[Expr]> },
    Comparison(Arc<Comparison>),
    Computed { func: Func, args: Arc<[Expr]> },
}

impl Expr {
    pub fn column(path: impl Into<FieldPath>) -> Self {
        Expr::Column(ColumnRef::new(path.into()))
    }

    pub fn literal(value: impl Into<Value>) -> Self {
        Expr::Literal(value.into())
    }

    pub fn comparison(lhs: Expr, op: Operator, rhs: Operand) -> Self {
        Expr::Comparison(Arc::new(Comparison { lhs, op, rhs }))
    }

    pub fn computed(func: Func, args: impl IntoIterator<Item = Expr>) -> Self {
        Expr::Computed {
            func,
            args: args.into_iter().collect(),
        }
    }

    // ==================== combinators ====================

    /// Conjunction of `exprs`, flattening nested ANDs. Empty input is the
    /// always-true conjunction.
    pub fn all(exprs: impl IntoIterator<Item = Expr>) -> Self {
        Self::combine(BoolOp::And, exprs)
    }

    /// Disjunction of `exprs`, flattening nested ORs.
    pub fn any(exprs: impl IntoIterator<Item = Expr>) -> Self {
        Self::combine(BoolOp::Or, exprs)
    }

    fn combine(op: BoolOp, exprs: impl IntoIterator<Item = Expr>) -> Self {
        let mut children = Vec::new();
        for expr in exprs {
            match expr {
                Expr::Combinator { op: inner, children: nested } if inner == op => {
                    children.extend(nested.iter().cloned());
                }
                other => children.push(other),
            }
        }
        Expr::Combinator {
            op,
            children: children.into(),
        }
    }

    pub fn and(self, other: Expr) -> Self {
        Self::all([self, other])
    }

    pub fn or(self, other: Expr) -> Self {
        Self::any([self, other])
    }

    pub fn negate(self) -> Self {
        Expr::Combinator {
            op: BoolOp::Not,
            children: Arc::from([self]),
        }
    }

    // ==================== inspection ====================

    /// `true` once every column reference in the tree carries a binding.
    ///
    /// Paths that cross a relation stay unbound until compilation.
    pub fn is_resolved(&self) -> bool {
        let mut resolved = true;
        self.walk_columns(&mut |col| resolved &= col.binding.is_some());
        resolved
    }

    /// Whether the tree contains an aggregate function call.
    pub fn contains_aggregate(&self) -> bool {
        match self {
            Expr::Column(_) | Expr::Literal(_) => false,
            Expr::Combinator { children, .. } => children.iter().any(Expr::contains_aggregate),
            Expr::Comparison(cmp) => {
                cmp.lhs.contains_aggregate()
                    || matches!(&cmp.rhs, Operand::Expr(e) if e.contains_aggregate())
            }
            Expr::Computed { func, args } => {
                func.is_aggregate() || args.iter().any(Expr::contains_aggregate)
            }
        }
    }

    /// Visits every column reference, left to right.
    pub fn walk_columns<'a>(&'a self, f: &mut impl FnMut(&'a ColumnRef)) {
        match self {
            Expr::Column(col) => f(col),
            Expr::Literal(_) => {}
            Expr::Combinator { children, .. } | Expr::Computed { args: children, .. } => {
                for child in children.iter() {
                    child.walk_columns(f);
                }
            }
            Expr::Comparison(cmp) => {
                cmp.lhs.walk_columns(f);
                if let Operand::Expr(rhs) = &cmp.rhs {
                    rhs.walk_columns(f);
                }
            }
        }
    }

    /// Top-level conjuncts; a non-AND expression is its own single conjunct.
    pub fn conjuncts(&self) -> &[Expr] {
        match self {
            Expr::Combinator {
                op: BoolOp::And,
                children,
            } => children,
            other => core::slice::from_ref(other),
        }
    }
}

// =============================================================================
// Display
// =============================================================================

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Column(col) => write!(f, "{}", col.path),
            Expr::Literal(value) => write!(f, "{value}"),
            Expr::Combinator { op: BoolOp::Not, children } => {
                f.write_str("NOT ")?;
                write_group(f, children, " AND ")
            }
            Expr::Combinator { op, children } if children.is_empty() => {
                f.write_str(if *op == BoolOp::And { "TRUE" } else { "FALSE" })
            }
            Expr::Combinator { children, .. } if children.len() == 1 => {
                write!(f, "{}", children[0])
            }
            Expr::Combinator { op, children } => {
                write_group(f, children, if *op == BoolOp::And { " AND " } else { " OR " })
            }
            Expr::Comparison(cmp) => write!(f, "{cmp}"),
            Expr::Computed { func, args } if func.is_arithmetic() => {
                write_group(f, args, &format!(" {} ", func.sql_name()))
            }
            Expr::Computed { func, args } => {
                f.write_str(func.sql_name())?;
                f.write_str("(")?;
                if *func == Func::CountDistinct {
                    f.write_str("DISTINCT ")?;
                }
                if args.is_empty() && *func == Func::Count {
                    f.write_str("*")?;
                }
                write_list(f, args.iter())?;
                f.write_str(")")
            }
        }
    }
}

impl fmt::Display for Comparison {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let op = match self.op {
            Operator::Eq => "=",
            Operator::Ne => "<>",
            Operator::Lt => "<",
            Operator::Lte => "<=",
            Operator::Gt => ">",
            Operator::Gte => ">=",
            Operator::In => "IN",
            Operator::Like => "LIKE",
            Operator::IsNull | Operator::Range => "",
        };
        match (&self.op, &self.rhs) {
            (Operator::IsNull, Operand::Flag(true)) => write!(f, "{} IS NULL", self.lhs),
            (Operator::IsNull, Operand::Flag(false)) => write!(f, "{} IS NOT NULL", self.lhs),
            (Operator::Range, Operand::Range(lo, hi)) => {
                write!(f, "{} BETWEEN {lo} AND {hi}", self.lhs)
            }
            (_, Operand::List(values)) => {
                write!(f, "{} {op} (", self.lhs)?;
                write_list(f, values.iter())?;
                f.write_str(")")
            }
            (_, Operand::Expr(rhs)) => write!(f, "{} {op} {rhs}", self.lhs),
            (_, Operand::Range(lo, hi)) => write!(f, "{} {op} ({lo}, {hi})", self.lhs),
            (_, Operand::Flag(flag)) => write!(f, "{} {op} {flag}", self.lhs),
        }
    }
}

fn write_group(f: &mut fmt::Formatter<'_>, items: &[Expr], sep: &str) -> fmt::Result {
    f.write_str("(")?;
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            f.write_str(sep)?;
        }
        write!(f, "{item}")?;
    }
    f.write_str(")")
}

fn write_list<T: fmt::Display>(
    f: &mut fmt::Formatter<'_>,
    items: impl Iterator<Item = T>,
) -> fmt::Result {
    for (i, item) in items.enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        write!(f, "{item}")?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nested_combinators_flatten() {
        let a = col("a").eq(1);
        let b = col("b").eq(2);
        let c = col("c").eq(3);

        let nested = (a.clone() & b.clone()) & c.clone();
        let flat = Expr::all([a.clone(), b.clone(), c.clone()]);
        assert_eq!(nested, flat);

        let Expr::Combinator { children, .. } = &nested else {
            panic!("expected combinator");
        };
        assert_eq!(children.len(), 3);

        // OR inside AND stays a child
        let mixed = a.clone() & (b | c);
        assert_eq!(mixed.conjuncts().len(), 2);
    }

    #[test]
    fn test_null_equality_becomes_null_check() {
        assert_eq!(col("x").eq(Value::Null), col("x").is_null(true));
        assert_eq!(col("x").ne(Value::Null), col("x").is_null(false));
        assert_eq!(col("x").eq(None::<i64>).to_string(), "x IS NULL");
    }

    #[test]
    fn test_structural_equality_ignores_binding() {
        let unbound = ColumnRef::new(FieldPath::parse("total"));
        let bound = unbound.clone().bound(Binding::Field(FieldType::Integer));
        assert_eq!(Expr::Column(unbound.clone()), Expr::Column(bound.clone()));
        assert!(!Expr::Column(unbound).is_resolved());
        assert!(Expr::Column(bound).is_resolved());
    }

    #[test]
    fn test_display() {
        let expr = col("total").gte(100) & !col("customer__name").like("A%");
        assert_eq!(
            expr.to_string(),
            r#"(total >= 100 AND NOT (customer__name LIKE "A%"))"#
        );
        assert_eq!(count_all().to_string(), "COUNT(*)");
        assert_eq!(col("id").is_in([1, 2]).to_string(), "id IN (1, 2)");
        assert_eq!((col("a") + 1).to_string(), "(a + 1)");
    }

    #[test]
    fn test_aggregate_detection() {
        assert!(sum(col("total")).contains_aggregate());
        assert!(sum(col("total")).gt(10).contains_aggregate());
        assert!(!(col("total") * 2).contains_aggregate());
    }
}
