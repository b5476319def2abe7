//! Per-dialect rendering policies.
//!
//! The compiler builds a dialect-independent [`Sql`](crate::sql::Sql) fragment;
//! everything that differs between backends is decided here, once per render.

use std::fmt::Write as _;

use quarry_types::{Dialect, Value};

use crate::sql::CompiledStatement;

/// Rendering decisions that vary between backends.
pub trait DialectPolicy: Send + Sync {
    fn dialect(&self) -> Dialect;

    /// Character used to quote identifiers; doubled when it appears inside one.
    fn quote_char(&self) -> char {
        '"'
    }

    /// Writes the placeholder for the parameter at `index` (1-based).
    fn write_placeholder(&self, index: usize, buf: &mut String);

    fn bool_literal(&self, value: bool) -> &'static str {
        if value { "TRUE" } else { "FALSE" }
    }

    /// Text used as the limit when only an offset is requested, if the
    /// dialect requires a LIMIT before OFFSET.
    fn unbounded_limit(&self) -> Option<&'static str> {
        None
    }

    /// Writes `LIMIT .. OFFSET ..` with bound values.
    fn write_window(&self, limit: Option<u64>, offset: u64, out: &mut Renderer<'_>) {
        match limit {
            Some(limit) => {
                out.push_str("LIMIT ");
                out.push_param(window_value(limit));
            }
            None => match self.unbounded_limit() {
                Some(text) => {
                    out.push_str("LIMIT ");
                    out.push_str(text);
                }
                None if offset == 0 => return,
                None => {
                    out.push_str("OFFSET ");
                    out.push_param(window_value(offset));
                    return;
                }
            },
        }
        if offset > 0 {
            out.push_str(" OFFSET ");
            out.push_param(window_value(offset));
        }
    }
}

fn window_value(n: u64) -> Value {
    Value::Integer(i64::try_from(n).unwrap_or(i64::MAX))
}

// =============================================================================
// Concrete policies
// =============================================================================

#[derive(Debug, Clone, Copy, Default)]
pub struct SqlitePolicy;

impl DialectPolicy for SqlitePolicy {
    fn dialect(&self) -> Dialect {
        Dialect::SQLite
    }

    fn write_placeholder(&self, _index: usize, buf: &mut String) {
        buf.push('?');
    }

    fn bool_literal(&self, value: bool) -> &'static str {
        if value { "1" } else { "0" }
    }

    fn unbounded_limit(&self) -> Option<&'static str> {
        Some("-1")
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct PostgresPolicy;

impl DialectPolicy for PostgresPolicy {
    fn dialect(&self) -> Dialect {
        Dialect::PostgreSQL
    }

    fn write_placeholder(&self, index: usize, buf: &mut String) {
        let _ = write!(buf, "${index}");
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct MySqlPolicy;

impl DialectPolicy for MySqlPolicy {
    fn dialect(&self) -> Dialect {
        Dialect::MySQL
    }

    fn quote_char(&self) -> char {
        '`'
    }

    fn write_placeholder(&self, _index: usize, buf: &mut String) {
        buf.push('?');
    }

    fn unbounded_limit(&self) -> Option<&'static str> {
        Some("18446744073709551615")
    }
}

static SQLITE: SqlitePolicy = SqlitePolicy;
static POSTGRES: PostgresPolicy = PostgresPolicy;
static MYSQL: MySqlPolicy = MySqlPolicy;

/// Selects the rendering policy for `dialect`.
pub fn policy(dialect: Dialect) -> &'static dyn DialectPolicy {
    match dialect {
        Dialect::SQLite => &SQLITE,
        Dialect::PostgreSQL => &POSTGRES,
        Dialect::MySQL => &MYSQL,
    }
}

// =============================================================================
// Renderer
// =============================================================================

/// Output buffer for a single render pass.
pub struct Renderer<'p> {
    policy: &'p dyn DialectPolicy,
    buf: String,
    params: Vec<Value>,
}

impl<'p> Renderer<'p> {
    pub(crate) fn new(policy: &'p dyn DialectPolicy, capacity: usize) -> Self {
        Self {
            policy,
            buf: String::with_capacity(capacity),
            params: Vec::new(),
        }
    }

    #[inline]
    pub fn push_str(&mut self, s: &str) {
        self.buf.push_str(s);
    }

    #[inline]
    pub fn push_char(&mut self, c: char) {
        self.buf.push(c);
    }

    /// Writes a quoted identifier, escaping embedded quote characters.
    pub fn push_ident(&mut self, name: &str) {
        let quote = self.policy.quote_char();
        self.buf.push(quote);
        for c in name.chars() {
            if c == quote {
                self.buf.push(quote);
            }
            self.buf.push(c);
        }
        self.buf.push(quote);
    }

    /// Binds `value` and writes its placeholder.
    pub fn push_param(&mut self, value: Value) {
        self.params.push(value);
        self.policy.write_placeholder(self.params.len(), &mut self.buf);
    }

    pub(crate) fn finish(self) -> CompiledStatement {
        CompiledStatement {
            dialect: self.policy.dialect(),
            sql: self.buf,
            params: self.params,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sql::{Sql, SqlChunk};

    fn window(dialect: Dialect, limit: Option<u64>, offset: u64) -> CompiledStatement {
        Sql::from_iter([SqlChunk::Window { limit, offset }]).render(dialect)
    }

    #[test]
    fn test_window_forms() {
        let stmt = window(Dialect::SQLite, Some(10), 20);
        assert_eq!(stmt.sql, "LIMIT ? OFFSET ?");
        assert_eq!(stmt.params, [Value::Integer(10), Value::Integer(20)]);

        assert_eq!(window(Dialect::PostgreSQL, Some(10), 20).sql, "LIMIT $1 OFFSET $2");
        assert_eq!(window(Dialect::PostgreSQL, Some(5), 0).sql, "LIMIT $1");
    }

    #[test]
    fn test_offset_only_windows() {
        assert_eq!(window(Dialect::SQLite, None, 3).sql, "LIMIT -1 OFFSET ?");
        assert_eq!(window(Dialect::PostgreSQL, None, 3).sql, "OFFSET $1");
        assert_eq!(
            window(Dialect::MySQL, None, 3).sql,
            "LIMIT 18446744073709551615 OFFSET ?"
        );
        assert_eq!(window(Dialect::MySQL, None, 3).params, [Value::Integer(3)]);
    }

    #[test]
    fn test_identifier_escaping() {
        assert_eq!(Sql::ident(r#"we"ird"#).render(Dialect::SQLite).sql, r#""we""ird""#);
        assert_eq!(Sql::ident("we`ird").render(Dialect::MySQL).sql, "`we``ird`");
    }
}
