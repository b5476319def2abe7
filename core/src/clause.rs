//! Clause sets: the persistent state behind a query object.
//!
//! Every chaining call produces a new [`ClauseSet`] from the previous one.
//! Appended clauses live in [`Chain`]s, a reference-counted cons list, so a
//! derived clause set shares everything it did not change with its parent.

use std::sync::Arc;

use compact_str::CompactString;

use crate::expr::{Expr, FieldPath};

// =============================================================================
// Chain
// =============================================================================

struct Link<T> {
    value: T,
    prev: Chain<T>,
    len: usize,
}

/// Append-only persistent list. Cloning is a reference-count bump.
pub struct Chain<T>(Option<Arc<Link<T>>>);

impl<T> Chain<T> {
    pub const fn new() -> Self {
        Self(None)
    }

    /// Returns a new chain with `value` appended; `self` is unchanged.
    pub fn push(&self, value: T) -> Self {
        Self(Some(Arc::new(Link {
            value,
            prev: self.clone(),
            len: self.len() + 1,
        })))
    }

    pub fn len(&self) -> usize {
        self.0.as_ref().map_or(0, |link| link.len)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_none()
    }

    /// Most recently appended element.
    pub fn last(&self) -> Option<&T> {
        self.0.as_ref().map(|link| &link.value)
    }

    /// Elements in insertion order.
    pub fn to_vec(&self) -> Vec<&T> {
        let mut out = Vec::with_capacity(self.len());
        let mut cursor = self;
        while let Some(link) = &cursor.0 {
            out.push(&link.value);
            cursor = &link.prev;
        }
        out.reverse();
        out
    }

    /// Whether both chains are the same allocation.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        match (&self.0, &other.0) {
            (Some(a), Some(b)) => Arc::ptr_eq(a, b),
            (None, None) => true,
            _ => false,
        }
    }
}

impl<T> Clone for Chain<T> {
    fn clone(&self) -> Self {
        Self(self.0.clone())
    }
}

impl<T> Default for Chain<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: core::fmt::Debug> core::fmt::Debug for Chain<T> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_list().entries(self.to_vec()).finish()
    }
}

// =============================================================================
// Clause elements
// =============================================================================

/// One ordering key: `"total"` ascending, `"-total"` descending.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct OrderKey {
    pub path: FieldPath,
    pub descending: bool,
}

impl OrderKey {
    pub fn parse(key: &str) -> Self {
        match key.strip_prefix('-') {
            Some(rest) => Self {
                path: FieldPath::parse(rest),
                descending: true,
            },
            None => Self {
                path: FieldPath::parse(key.strip_prefix('+').unwrap_or(key)),
                descending: false,
            },
        }
    }

    pub fn asc(path: FieldPath) -> Self {
        Self {
            path,
            descending: false,
        }
    }
}

impl From<&str> for OrderKey {
    fn from(value: &str) -> Self {
        Self::parse(value)
    }
}

/// Result window. `limit: None` means unbounded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Window {
    pub limit: Option<u64>,
    pub offset: u64,
}

impl Window {
    pub const fn new(limit: Option<u64>, offset: u64) -> Self {
        Self { limit, offset }
    }

    /// A window that can never yield a row.
    pub const fn is_empty(&self) -> bool {
        matches!(self.limit, Some(0))
    }

    pub const fn is_bounded(&self) -> bool {
        self.limit.is_some() || self.offset > 0
    }

    /// Narrows this window to `[start, end)` relative to its own first row.
    pub fn slice(&self, start: u64, end: Option<u64>) -> Self {
        let offset = self.offset.saturating_add(start);
        let mut limit = end.map(|end| end.saturating_sub(start));
        if let Some(current) = self.limit {
            let remaining = current.saturating_sub(start);
            limit = Some(limit.map_or(remaining, |l| l.min(remaining)));
        }
        Self { limit, offset }
    }
}

/// How a followed relation is resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LoadMode {
    /// LEFT JOIN in the base statement.
    Join,
    /// One follow-up statement per relation path, keyed by the collected keys.
    Batch,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RelationHint {
    pub path: FieldPath,
    pub mode: LoadMode,
}

/// Named computed value added to every record.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Annotation {
    pub name: CompactString,
    pub expr: Expr,
}

// =============================================================================
// Clause set
// =============================================================================

#[derive(Debug, Clone, Default)]
pub struct ClauseSet {
    pub filters: Chain<Expr>,
    pub excludes: Chain<Expr>,
    pub ordering: Arc<[OrderKey]>,
    pub group_by: Arc<[FieldPath]>,
    pub window: Window,
    pub annotations: Chain<Annotation>,
    pub relations: Chain<RelationHint>,
    pub distinct: bool,
    /// Set by `none()`: the query matches nothing and never executes.
    pub empty: bool,
}

impl ClauseSet {
    /// `true` when evaluation can be answered without a statement.
    pub fn is_trivially_empty(&self) -> bool {
        self.empty || self.window.is_empty()
    }

    pub fn annotation(&self, name: &str) -> Option<&Annotation> {
        self.annotations
            .to_vec()
            .into_iter()
            .find(|annotation| annotation.name == name)
    }

    pub fn annotation_names(&self) -> Vec<&str> {
        self.annotations
            .to_vec()
            .into_iter()
            .map(|annotation| annotation.name.as_str())
            .collect()
    }

    pub fn is_grouped(&self) -> bool {
        !self.group_by.is_empty()
    }

    /// The combined WHERE/HAVING predicate: filters ANDed with negated excludes.
    pub fn predicate(&self) -> Expr {
        let filters = self.filters.to_vec().into_iter().cloned();
        let excludes = self
            .excludes
            .to_vec()
            .into_iter()
            .map(|e| e.clone().negate());
        Expr::all(filters.chain(excludes))
    }

    /// Relation hints with later hints for the same path overriding the mode.
    ///
    /// Paths keep the position of their first appearance.
    pub fn relation_hints(&self) -> Vec<RelationHint> {
        let mut hints: Vec<RelationHint> = Vec::new();
        for hint in self.relations.to_vec() {
            match hints.iter_mut().find(|h| h.path == hint.path) {
                Some(existing) => existing.mode = hint.mode,
                None => hints.push(hint.clone()),
            }
        }
        hints
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::col;

    #[test]
    fn test_chain_shares_prefix() {
        let base: Chain<i32> = Chain::new().push(1).push(2);
        let left = base.push(3);
        let right = base.push(4);

        assert_eq!(base.to_vec(), [&1, &2]);
        assert_eq!(left.to_vec(), [&1, &2, &3]);
        assert_eq!(right.to_vec(), [&1, &2, &4]);
        assert_eq!(left.len(), 3);
        assert!(base.ptr_eq(&base.clone()));
    }

    #[test]
    fn test_order_key_parsing() {
        let key = OrderKey::parse("-total");
        assert!(key.descending);
        assert_eq!(key.path, FieldPath::parse("total"));
        assert!(!OrderKey::parse("customer__name").descending);
    }

    #[test]
    fn test_window_slicing() {
        let w = Window::default().slice(5, Some(15));
        assert_eq!(w, Window::new(Some(10), 5));
        let w = w.slice(2, None);
        assert_eq!(w, Window::new(Some(8), 7));
        assert!(Window::new(Some(0), 3).is_empty());
        assert!(!Window::default().is_bounded());
    }

    #[test]
    fn test_predicate_flattens_filters() {
        let a = col("a").eq(1);
        let b = col("b").eq(2);
        let mut one = ClauseSet::default();
        one.filters = one.filters.push(a.clone()).push(b.clone());
        let mut two = ClauseSet::default();
        two.filters = two.filters.push(a & b);
        assert_eq!(one.predicate(), two.predicate());
    }

    #[test]
    fn test_relation_hint_override_keeps_position() {
        let mut clauses = ClauseSet::default();
        for (path, mode) in [
            ("customer", LoadMode::Join),
            ("items", LoadMode::Batch),
            ("customer", LoadMode::Batch),
        ] {
            clauses.relations = clauses.relations.push(RelationHint {
                path: FieldPath::parse(path),
                mode,
            });
        }
        let hints = clauses.relation_hints();
        assert_eq!(hints.len(), 2);
        assert_eq!(hints[0].path, FieldPath::parse("customer"));
        assert_eq!(hints[0].mode, LoadMode::Batch);
    }
}
