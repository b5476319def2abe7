/// SQL keywords and punctuation emitted by the compiler.
#[allow(clippy::upper_case_acronyms)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Token {
    // Statement keywords
    SELECT,
    DISTINCT,
    FROM,
    AS,
    LEFT,
    INNER,
    JOIN,
    ON,
    WHERE,
    GROUP,
    HAVING,
    ORDER,
    BY,
    ASC,
    DESC,

    // Predicate keywords
    AND,
    OR,
    NOT,
    IN,
    IS,
    NULL,
    LIKE,
    BETWEEN,

    // Punctuation
    COMMA,
    LPAREN,
    RPAREN,
    DOT,

    // Operators
    EQ,
    NE,
    LT,
    LE,
    GT,
    GE,
    PLUS,
    MINUS,
    STAR,
    SLASH,
}

impl Token {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Token::SELECT => "SELECT",
            Token::DISTINCT => "DISTINCT",
            Token::FROM => "FROM",
            Token::AS => "AS",
            Token::LEFT => "LEFT",
            Token::INNER => "INNER",
            Token::JOIN => "JOIN",
            Token::ON => "ON",
            Token::WHERE => "WHERE",
            Token::GROUP => "GROUP",
            Token::HAVING => "HAVING",
            Token::ORDER => "ORDER",
            Token::BY => "BY",
            Token::ASC => "ASC",
            Token::DESC => "DESC",
            Token::AND => "AND",
            Token::OR => "OR",
            Token::NOT => "NOT",
            Token::IN => "IN",
            Token::IS => "IS",
            Token::NULL => "NULL",
            Token::LIKE => "LIKE",
            Token::BETWEEN => "BETWEEN",
            Token::COMMA => ",",
            Token::LPAREN => "(",
            Token::RPAREN => ")",
            Token::DOT => ".",
            Token::EQ => "=",
            Token::NE => "<>",
            Token::LT => "<",
            Token::LE => "<=",
            Token::GT => ">",
            Token::GE => ">=",
            Token::PLUS => "+",
            Token::MINUS => "-",
            Token::STAR => "*",
            Token::SLASH => "/",
        }
    }

    /// Comparison and arithmetic operators, rendered with surrounding spaces.
    pub const fn is_operator(&self) -> bool {
        matches!(
            self,
            Token::EQ
                | Token::NE
                | Token::LT
                | Token::LE
                | Token::GT
                | Token::GE
                | Token::PLUS
                | Token::MINUS
                | Token::SLASH
        )
    }
}

impl core::fmt::Display for Token {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}
