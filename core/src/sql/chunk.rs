use compact_str::CompactString;
use quarry_types::Value;

use super::tokens::Token;

/// A SQL chunk represents a part of an SQL statement.
///
/// Chunks carry no dialect information. Everything a dialect decides
/// (quoting, placeholders, boolean spelling, window syntax) is deferred to
/// [`Sql::render`](super::Sql::render).
#[derive(Debug, Clone, PartialEq)]
pub enum SqlChunk {
    /// SQL keywords and operators: SELECT, FROM, WHERE, =, AND, etc.
    Token(Token),

    /// Quoted identifier: table names, aliases
    Ident(CompactString),

    /// Alias-qualified column: `"t0"."name"`
    Column {
        alias: CompactString,
        column: CompactString,
    },

    /// Function name; never separated from the following `(`
    Func(&'static str),

    /// Unquoted text emitted as-is, e.g. the `1` of `SELECT 1`
    Raw(&'static str),

    /// Bound parameter; always rendered as a placeholder
    Param(Value),

    /// Boolean literal, spelled by the dialect
    Bool(bool),

    /// Result window, rendered by the dialect with bound parameters
    Window { limit: Option<u64>, offset: u64 },
}

impl SqlChunk {
    /// Check if this chunk is "word-like" (needs space separation from other word-like chunks)
    #[inline]
    pub(crate) const fn is_word_like(&self) -> bool {
        match self {
            SqlChunk::Token(t) => !matches!(
                t,
                Token::LPAREN
                    | Token::RPAREN
                    | Token::COMMA
                    | Token::DOT
                    | Token::EQ
                    | Token::NE
                    | Token::LT
                    | Token::GT
                    | Token::LE
                    | Token::GE
            ),
            SqlChunk::Ident(_)
            | SqlChunk::Column { .. }
            | SqlChunk::Func(_)
            | SqlChunk::Raw(_)
            | SqlChunk::Param(_)
            | SqlChunk::Bool(_)
            | SqlChunk::Window { .. } => true,
        }
    }
}

impl From<Token> for SqlChunk {
    #[inline]
    fn from(value: Token) -> Self {
        Self::Token(value)
    }
}

impl From<Value> for SqlChunk {
    #[inline]
    fn from(value: Value) -> Self {
        Self::Param(value)
    }
}
