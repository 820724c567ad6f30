//! A small statement builder for the listing and partial-update queries.
//!
//! Handlers never see SQL: they pass typed filters (see `posts::PostFilter`,
//! `comments::CommentFilter`, `tags::TagFilter`) which the entity modules
//! lower into the closed set of [`Predicate`]s below. Column names are always
//! `'static` strings chosen by this crate; every user-supplied value ends up
//! in the bound argument list.

use rusqlite::types::Value;
use rusqlite::{Connection, Row};

use super::DbResult;

#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    /// `column = ?`
    Eq(&'static str, Value),
    /// Case-insensitive substring match against any of the columns.
    Contains(&'static [&'static str], String),
    /// `column IS NULL`
    IsNull(&'static str),
    /// `column >= datetime('now', modifier)`, e.g. modifier `-1 month`.
    Since(&'static str, &'static str),
    /// `column IN (subquery)` where the subquery has exactly one `?`.
    Member(&'static str, &'static str, Value),
}

impl Predicate {
    fn render(&self, sql: &mut String, args: &mut Vec<Value>) {
        match self {
            Predicate::Eq(column, value) => {
                sql.push_str(column);
                sql.push_str(" = ?");
                args.push(value.clone());
            }
            Predicate::Contains(columns, needle) => {
                let pattern = format!("%{}%", escape_like(needle));
                let clauses: Vec<String> = columns
                    .iter()
                    .map(|c| format!("{c} LIKE ? ESCAPE '\\'"))
                    .collect();
                sql.push('(');
                sql.push_str(&clauses.join(" OR "));
                sql.push(')');
                args.extend(columns.iter().map(|_| Value::Text(pattern.clone())));
            }
            Predicate::IsNull(column) => {
                sql.push_str(column);
                sql.push_str(" IS NULL");
            }
            Predicate::Since(column, modifier) => {
                sql.push_str(column);
                sql.push_str(" >= datetime('now', ?)");
                args.push(Value::Text((*modifier).to_string()));
            }
            Predicate::Member(column, subquery, value) => {
                sql.push_str(column);
                sql.push_str(" IN (");
                sql.push_str(subquery);
                sql.push(')');
                args.push(value.clone());
            }
        }
    }
}

/// Escape `LIKE` wildcards so the needle matches literally.
pub fn escape_like(needle: &str) -> String {
    let mut out = String::with_capacity(needle.len());
    for c in needle.chars() {
        if matches!(c, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Order {
    Asc,
    Desc,
}

impl Order {
    fn as_sql(&self) -> &'static str {
        match self {
            Order::Asc => "ASC",
            Order::Desc => "DESC",
        }
    }
}

/// A 1-based page of fixed size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    number: i64,
    size: i64,
}

impl Page {
    /// Returns `None` for page numbers below 1, or when the row offset
    /// would not fit in an `i64`.
    pub fn new(number: i64, size: i64) -> Option<Self> {
        if number < 1 || size < 1 {
            return None;
        }
        number.checked_sub(1)?.checked_mul(size)?;
        Some(Self { number, size })
    }

    pub fn first(size: i64) -> Self {
        Self { number: 1, size }
    }

    pub fn limit(&self) -> i64 {
        self.size
    }

    pub fn offset(&self) -> i64 {
        (self.number - 1) * self.size
    }
}

#[derive(Debug, Clone)]
pub struct Select {
    base: String,
    filters: Vec<Predicate>,
    group_by: Option<&'static str>,
    order_by: Vec<(&'static str, Order)>,
    page: Option<Page>,
}

impl Select {
    /// `base` is everything up to (not including) the WHERE clause.
    pub fn new(base: impl Into<String>) -> Self {
        Self {
            base: base.into(),
            filters: Vec::new(),
            group_by: None,
            order_by: Vec::new(),
            page: None,
        }
    }

    pub fn filter(mut self, predicate: Predicate) -> Self {
        self.filters.push(predicate);
        self
    }

    pub fn filters(mut self, predicates: impl IntoIterator<Item = Predicate>) -> Self {
        self.filters.extend(predicates);
        self
    }

    pub fn group_by(mut self, column: &'static str) -> Self {
        self.group_by = Some(column);
        self
    }

    pub fn order_by(mut self, expr: &'static str, order: Order) -> Self {
        self.order_by.push((expr, order));
        self
    }

    pub fn page(mut self, page: Page) -> Self {
        self.page = Some(page);
        self
    }

    pub fn build(&self) -> (String, Vec<Value>) {
        let mut sql = self.base.clone();
        let mut args = Vec::new();

        if !self.filters.is_empty() {
            sql.push_str(" WHERE ");
            for (i, predicate) in self.filters.iter().enumerate() {
                if i > 0 {
                    sql.push_str(" AND ");
                }
                predicate.render(&mut sql, &mut args);
            }
        }

        if let Some(column) = self.group_by {
            sql.push_str(" GROUP BY ");
            sql.push_str(column);
        }

        if !self.order_by.is_empty() {
            let terms: Vec<String> = self
                .order_by
                .iter()
                .map(|(expr, order)| format!("{expr} {}", order.as_sql()))
                .collect();
            sql.push_str(" ORDER BY ");
            sql.push_str(&terms.join(", "));
        }

        if let Some(page) = self.page {
            sql.push_str(" LIMIT ? OFFSET ?");
            args.push(Value::Integer(page.limit()));
            args.push(Value::Integer(page.offset()));
        }

        (sql, args)
    }

    pub fn fetch_all<T, F>(&self, conn: &Connection, map: F) -> DbResult<Vec<T>>
    where
        F: FnMut(&Row<'_>) -> rusqlite::Result<T>,
    {
        let (sql, args) = self.build();
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(rusqlite::params_from_iter(args.iter()), map)?;
        let mut items = Vec::new();
        for row in rows {
            items.push(row?);
        }
        Ok(items)
    }

    pub fn fetch_one<T, F>(&self, conn: &Connection, map: F) -> DbResult<T>
    where
        F: FnOnce(&Row<'_>) -> rusqlite::Result<T>,
    {
        let (sql, args) = self.build();
        super::one(conn.query_row(&sql, rusqlite::params_from_iter(args.iter()), map))
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Assignment {
    Value(&'static str, Value),
    Now(&'static str),
}

/// `UPDATE table SET ... WHERE ...` over a dynamic set of columns.
#[derive(Debug, Clone)]
pub struct Update {
    table: &'static str,
    sets: Vec<Assignment>,
    filters: Vec<Predicate>,
}

impl Update {
    pub fn table(table: &'static str) -> Self {
        Self {
            table,
            sets: Vec::new(),
            filters: Vec::new(),
        }
    }

    pub fn set(mut self, column: &'static str, value: impl Into<Value>) -> Self {
        self.sets.push(Assignment::Value(column, value.into()));
        self
    }

    /// `column = datetime('now')`
    pub fn touch(mut self, column: &'static str) -> Self {
        self.sets.push(Assignment::Now(column));
        self
    }

    pub fn filter(mut self, predicate: Predicate) -> Self {
        self.filters.push(predicate);
        self
    }

    /// `None` when there is nothing to assign.
    pub fn build(&self) -> Option<(String, Vec<Value>)> {
        if self.sets.is_empty() {
            return None;
        }

        let mut args = Vec::new();
        let assignments: Vec<String> = self
            .sets
            .iter()
            .map(|a| match a {
                Assignment::Value(column, value) => {
                    args.push(value.clone());
                    format!("{column} = ?")
                }
                Assignment::Now(column) => format!("{column} = datetime('now')"),
            })
            .collect();

        let mut sql = format!("UPDATE {} SET {}", self.table, assignments.join(", "));
        if !self.filters.is_empty() {
            sql.push_str(" WHERE ");
            for (i, predicate) in self.filters.iter().enumerate() {
                if i > 0 {
                    sql.push_str(" AND ");
                }
                predicate.render(&mut sql, &mut args);
            }
        }

        Some((sql, args))
    }

    /// Returns the number of rows changed.
    pub fn execute(&self, conn: &Connection) -> DbResult<usize> {
        match self.build() {
            Some((sql, args)) => Ok(conn.execute(&sql, rusqlite::params_from_iter(args.iter()))?),
            None => Ok(0),
        }
    }
}
