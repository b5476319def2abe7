mod chunk;
mod tokens;

use compact_str::CompactString;
use quarry_types::{Dialect, Value};
use smallvec::SmallVec;

use crate::dialect::{DialectPolicy, Renderer, policy};
pub use chunk::*;
pub use tokens::*;

/// SQL fragment builder with flat chunk storage.
///
/// Uses `SmallVec<[SqlChunk; 8]>` for inline storage of typical fragments
/// without heap allocation. Fragments are dialect independent until
/// [`render`](Sql::render) is called.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Sql {
    pub chunks: SmallVec<[SqlChunk; 8]>,
}

impl Sql {
    // ==================== constructors ====================

    /// Creates an empty SQL fragment
    #[inline]
    pub const fn empty() -> Self {
        Self {
            chunks: SmallVec::new_const(),
        }
    }

    /// Creates SQL with a single token
    #[inline]
    pub fn token(t: Token) -> Self {
        Self {
            chunks: smallvec::smallvec![SqlChunk::Token(t)],
        }
    }

    /// Creates SQL with a quoted identifier
    #[inline]
    pub fn ident(name: impl Into<CompactString>) -> Self {
        Self {
            chunks: smallvec::smallvec![SqlChunk::Ident(name.into())],
        }
    }

    /// Creates SQL referencing `"alias"."column"`
    #[inline]
    pub fn column(alias: impl Into<CompactString>, column: impl Into<CompactString>) -> Self {
        Self {
            chunks: smallvec::smallvec![SqlChunk::Column {
                alias: alias.into(),
                column: column.into(),
            }],
        }
    }

    /// Creates SQL with raw text (unquoted)
    #[inline]
    pub fn raw(text: &'static str) -> Self {
        Self {
            chunks: smallvec::smallvec![SqlChunk::Raw(text)],
        }
    }

    /// Creates SQL with a single parameter value
    #[inline]
    pub fn param(value: impl Into<Value>) -> Self {
        Self {
            chunks: smallvec::smallvec![SqlChunk::Param(value.into())],
        }
    }

    /// Creates SQL with a dialect-spelled boolean literal
    #[inline]
    pub fn bool(value: bool) -> Self {
        Self {
            chunks: smallvec::smallvec![SqlChunk::Bool(value)],
        }
    }

    /// Creates SQL for a function call: NAME(args)
    #[inline]
    pub fn func(name: &'static str, args: Sql) -> Self {
        Sql::from_iter([SqlChunk::Func(name), SqlChunk::Token(Token::LPAREN)])
            .append(args)
            .push(Token::RPAREN)
    }

    // ==================== builder methods ====================

    /// Append another SQL fragment (flat extend)
    #[inline]
    pub fn append(mut self, other: impl Into<Sql>) -> Self {
        self.append_mut(other);
        self
    }

    #[inline]
    pub fn append_mut(&mut self, other: impl Into<Sql>) {
        let other = other.into();
        if self.chunks.is_empty() {
            self.chunks = other.chunks;
            return;
        }
        self.chunks.extend(other.chunks);
    }

    /// Push a single chunk
    #[inline]
    pub fn push(mut self, chunk: impl Into<SqlChunk>) -> Self {
        self.chunks.push(chunk.into());
        self
    }

    #[inline]
    pub fn push_mut(&mut self, chunk: impl Into<SqlChunk>) {
        self.chunks.push(chunk.into());
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    // ==================== combinators ====================

    /// Joins multiple SQL fragments with a separator
    pub fn join<I>(sqls: I, separator: Token) -> Sql
    where
        I: IntoIterator<Item = Sql>,
    {
        let mut iter = sqls.into_iter();
        let Some(mut result) = iter.next() else {
            return Sql::empty();
        };
        for item in iter {
            result.chunks.push(SqlChunk::Token(separator));
            result.chunks.extend(item.chunks);
        }
        result
    }

    /// Wrap in parentheses: (self)
    #[inline]
    pub fn parens(self) -> Self {
        Sql::token(Token::LPAREN).append(self).push(Token::RPAREN)
    }

    /// Creates an aliased version: self AS "name"
    pub fn alias(self, name: impl Into<CompactString>) -> Sql {
        self.push(Token::AS).push(SqlChunk::Ident(name.into()))
    }

    // ==================== output methods ====================

    /// Renders the fragment for `dialect`, collecting parameters in placeholder order.
    pub fn render(&self, dialect: Dialect) -> CompiledStatement {
        let policy = policy(dialect);
        let mut out = Renderer::new(policy, self.chunks.len().saturating_mul(8).max(128));
        for (i, chunk) in self.chunks.iter().enumerate() {
            write_chunk(policy, chunk, &mut out);
            if self.needs_space(i) {
                out.push_char(' ');
            }
        }
        out.finish()
    }

    fn needs_space(&self, index: usize) -> bool {
        let Some(next) = self.chunks.get(index + 1) else {
            return false;
        };
        chunk_needs_space(&self.chunks[index], next)
    }

    /// Returns an iterator over the parameter values, in placeholder order
    pub fn params(&self) -> impl Iterator<Item = &Value> {
        self.chunks.iter().filter_map(|chunk| match chunk {
            SqlChunk::Param(value) => Some(value),
            _ => None,
        })
    }
}

fn write_chunk(policy: &dyn DialectPolicy, chunk: &SqlChunk, out: &mut Renderer<'_>) {
    match chunk {
        SqlChunk::Token(token) => out.push_str(token.as_str()),
        SqlChunk::Ident(name) => out.push_ident(name),
        SqlChunk::Column { alias, column } => {
            out.push_ident(alias);
            out.push_char('.');
            out.push_ident(column);
        }
        SqlChunk::Func(name) | SqlChunk::Raw(name) => out.push_str(name),
        SqlChunk::Param(value) => out.push_param(value.clone()),
        SqlChunk::Bool(value) => out.push_str(policy.bool_literal(*value)),
        SqlChunk::Window { limit, offset } => policy.write_window(*limit, *offset, out),
    }
}

/// Canonical spacing logic for SQL chunk rendering.
pub(crate) fn chunk_needs_space(current: &SqlChunk, next: &SqlChunk) -> bool {
    match (current, next) {
        // No space before closing/separator punctuation
        (_, SqlChunk::Token(Token::RPAREN | Token::COMMA | Token::DOT)) => false,
        // No space after opening punctuation
        (SqlChunk::Token(Token::LPAREN | Token::DOT), _) => false,
        // Function names hug their argument list
        (SqlChunk::Func(_), SqlChunk::Token(Token::LPAREN)) => false,
        // Space after comma
        (SqlChunk::Token(Token::COMMA), _) => true,
        // Space around comparison/arithmetic operators, including ") >" and "= ("
        (SqlChunk::Token(t), _) if t.is_operator() => true,
        (_, SqlChunk::Token(t)) if t.is_operator() => true,
        // Space after closing paren if next is word-like (e.g., ") FROM")
        (SqlChunk::Token(Token::RPAREN), next) => next.is_word_like(),
        // Space before opening paren if preceded by word-like (e.g., "IN (")
        (current, SqlChunk::Token(Token::LPAREN)) => current.is_word_like(),
        // Space between all word-like chunks
        _ => current.is_word_like() && next.is_word_like(),
    }
}

impl From<Token> for Sql {
    fn from(value: Token) -> Self {
        Sql::token(value)
    }
}

impl<T> FromIterator<T> for Sql
where
    SqlChunk: From<T>,
{
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        Self {
            chunks: SmallVec::from_iter(iter.into_iter().map(SqlChunk::from)),
        }
    }
}

// =============================================================================
// Compiled statements
// =============================================================================

/// Backend-ready statement: dialect tag, text and positional parameters.
///
/// `params[i]` binds to the `i`-th placeholder in `sql`, left to right.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledStatement {
    pub dialect: Dialect,
    pub sql: String,
    pub params: Vec<Value>,
}

impl CompiledStatement {
    pub fn sql(&self) -> &str {
        &self.sql
    }

    pub fn params(&self) -> &[Value] {
        &self.params
    }
}

impl core::fmt::Display for CompiledStatement {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, r#"sql: "{}", params: {:?}"#, self.sql, self.params)
    }
}
