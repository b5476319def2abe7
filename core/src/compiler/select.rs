use crate::clause::Window;
use crate::sql::{Sql, SqlChunk, Token};

/// Parts of a SELECT statement, assembled in fixed clause order.
#[derive(Debug, Default)]
pub(crate) struct Select {
    pub distinct: bool,
    pub columns: Vec<Sql>,
    pub from: Sql,
    pub filter: Option<Sql>,
    pub group_by: Vec<Sql>,
    pub having: Option<Sql>,
    pub order_by: Vec<Sql>,
    pub window: Window,
}

impl Select {
    pub fn into_sql(self) -> Sql {
        let mut sql = Sql::token(Token::SELECT);
        if self.distinct {
            sql.push_mut(Token::DISTINCT);
        }
        sql.append_mut(Sql::join(self.columns, Token::COMMA));
        sql.push_mut(Token::FROM);
        sql.append_mut(self.from);

        if let Some(filter) = self.filter {
            sql.push_mut(Token::WHERE);
            sql.append_mut(filter);
        }
        if !self.group_by.is_empty() {
            sql.append_mut(Sql::from_iter([Token::GROUP, Token::BY]));
            sql.append_mut(Sql::join(self.group_by, Token::COMMA));
        }
        if let Some(having) = self.having {
            sql.push_mut(Token::HAVING);
            sql.append_mut(having);
        }
        if !self.order_by.is_empty() {
            sql.append_mut(Sql::from_iter([Token::ORDER, Token::BY]));
            sql.append_mut(Sql::join(self.order_by, Token::COMMA));
        }
        if self.window.is_bounded() {
            sql.push_mut(SqlChunk::Window {
                limit: self.window.limit,
                offset: self.window.offset,
            });
        }
        sql
    }
}

/// `SELECT <columns> FROM (<inner>) AS "sub"`
pub(crate) fn from_subquery(columns: Sql, inner: Sql, window: Option<Window>) -> Sql {
    let mut sql = Sql::token(Token::SELECT)
        .append(columns)
        .push(Token::FROM)
        .append(inner.parens().alias("sub"));
    if let Some(window) = window.filter(Window::is_bounded) {
        sql.push_mut(SqlChunk::Window {
            limit: window.limit,
            offset: window.offset,
        });
    }
    sql
}
