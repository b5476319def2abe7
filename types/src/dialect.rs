//! Database dialect identification
//!
//! The dialect is chosen once per compilation and drives every backend-specific
//! rendering decision. Everything else in the engine is dialect independent.

/// SQL dialect for database-specific rendering
///
/// Each dialect has its own placeholder syntax, identifier quoting, window
/// clause form and boolean literal spelling.
///
/// # Examples
///
/// ```
/// use quarry_types::Dialect;
///
/// let dialect = Dialect::PostgreSQL;
/// assert!(dialect.uses_numbered_placeholders());
///
/// let sqlite = Dialect::SQLite;
/// assert!(!sqlite.uses_numbered_placeholders());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum Dialect {
    /// SQLite - `?` placeholders, double-quoted identifiers
    #[default]
    SQLite,

    /// PostgreSQL - `$1, $2, ...` numbered placeholders
    PostgreSQL,

    /// MySQL - `?` placeholders, backtick-quoted identifiers
    MySQL,
}

impl Dialect {
    /// Every supported dialect, in declaration order.
    pub const ALL: [Dialect; 3] = [Dialect::SQLite, Dialect::PostgreSQL, Dialect::MySQL];

    /// Returns `true` if this dialect uses numbered placeholders (`$1, $2, ...`)
    #[inline]
    #[must_use]
    pub const fn uses_numbered_placeholders(&self) -> bool {
        matches!(self, Dialect::PostgreSQL)
    }

    /// Returns `true` if this dialect has a native boolean literal (`TRUE`/`FALSE`).
    #[inline]
    #[must_use]
    pub const fn has_boolean_literals(&self) -> bool {
        !matches!(self, Dialect::SQLite)
    }

    /// Parse a dialect from a string (case-insensitive)
    ///
    /// Accepted aliases:
    /// - SQLite: `"sqlite"`, `"sqlite3"`
    /// - PostgreSQL: `"postgresql"`, `"postgres"`, `"pg"`
    /// - MySQL: `"mysql"`, `"mariadb"`
    ///
    /// ```
    /// use quarry_types::Dialect;
    ///
    /// assert_eq!(Dialect::parse("pg"), Some(Dialect::PostgreSQL));
    /// assert_eq!(Dialect::parse("oracle"), None);
    /// ```
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("sqlite") || s.eq_ignore_ascii_case("sqlite3") {
            Some(Dialect::SQLite)
        } else if s.eq_ignore_ascii_case("postgresql")
            || s.eq_ignore_ascii_case("postgres")
            || s.eq_ignore_ascii_case("pg")
        {
            Some(Dialect::PostgreSQL)
        } else if s.eq_ignore_ascii_case("mysql") || s.eq_ignore_ascii_case("mariadb") {
            Some(Dialect::MySQL)
        } else {
            None
        }
    }

    /// Get the dialect name as a lowercase string
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Dialect::SQLite => "sqlite",
            Dialect::PostgreSQL => "postgresql",
            Dialect::MySQL => "mysql",
        }
    }
}

impl core::fmt::Display for Dialect {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl core::str::FromStr for Dialect {
    type Err = DialectParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Dialect::parse(s).ok_or_else(|| DialectParseError(s.to_string()))
    }
}

/// Error returned when parsing an unknown dialect string
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DialectParseError(pub String);

impl core::fmt::Display for DialectParseError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "unknown dialect `{}`", self.0)
    }
}

impl std::error::Error for DialectParseError {}
