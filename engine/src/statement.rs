//! Parameterized SQL statement builder.
//!
//! Everything here is string building over schema metadata; nothing touches a
//! database. Placeholders use the Postgres `$n` form and are numbered
//! continuously across every row tuple of a statement, so a whole batch goes
//! out in one round-trip.

use crate::schema::{JoinKind, Table};
use chrono::NaiveDateTime;
use std::fmt::Write;

/// Largest number of bind parameters the Postgres wire protocol accepts.
pub const MAX_PLACEHOLDERS: usize = u16::MAX as usize;

/// What an upsert does when the conflict key already exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OnConflict {
    /// Overwrite every written column with the incoming value.
    Update,
    /// Keep the stored row.
    Nothing,
}

/// A bind argument.
///
/// Each variant is nullable so that absent record fields bind as typed NULLs.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Text(Option<String>),
    Int(Option<i32>),
    BigInt(Option<i64>),
    Double(Option<f64>),
    Timestamp(Option<NaiveDateTime>),
}

impl SqlValue {
    pub fn is_null(&self) -> bool {
        match self {
            SqlValue::Text(v) => v.is_none(),
            SqlValue::Int(v) => v.is_none(),
            SqlValue::BigInt(v) => v.is_none(),
            SqlValue::Double(v) => v.is_none(),
            SqlValue::Timestamp(v) => v.is_none(),
        }
    }
}

/// Build a multi-row `INSERT .. ON CONFLICT` statement.
///
/// Returns the SQL text and the number of placeholders it contains. With no
/// columns or no rows the text is empty and callers must not execute it.
pub fn upsert(
    table: &str,
    conflict_key: &str,
    columns: &[&str],
    rows: usize,
    on_conflict: OnConflict,
) -> (String, usize) {
    if columns.is_empty() || rows == 0 {
        return (String::new(), 0);
    }

    let (values, count) = placeholders(columns.len(), rows);
    let mut sql = format!(
        "INSERT INTO {} ({}) VALUES {} ON CONFLICT ({}) ",
        table,
        columns.join(", "),
        values,
        conflict_key
    );

    match on_conflict {
        OnConflict::Update => {
            sql.push_str("DO UPDATE SET ");
            sql.push_str(&excluded(columns));
        }
        OnConflict::Nothing => sql.push_str("DO NOTHING"),
    }

    (sql, count)
}

/// Build a multi-row `INSERT .. RETURNING` statement.
pub fn insert_returning(
    table: &str,
    columns: &[&str],
    rows: usize,
    returning: &[&str],
) -> (String, usize) {
    if columns.is_empty() || rows == 0 {
        return (String::new(), 0);
    }

    let (values, count) = placeholders(columns.len(), rows);
    let mut sql = format!(
        "INSERT INTO {} ({}) VALUES {}",
        table,
        columns.join(", "),
        values
    );
    if !returning.is_empty() {
        sql.push_str(" RETURNING ");
        sql.push_str(&returning.join(", "));
    }

    (sql, count)
}

/// `DELETE FROM table WHERE condition`.
///
/// An unconditional delete is never produced: a blank condition yields an
/// empty statement.
pub fn delete_where(table: &str, condition: &str) -> String {
    let condition = condition.trim();
    if condition.is_empty() {
        return String::new();
    }
    format!("DELETE FROM {} WHERE {}", table, condition)
}

/// `FROM` clause joining `table` against each of its reference tables.
pub fn from_clause(table: Table, join: JoinKind) -> String {
    let mut from = table.name().to_string();
    for reference in table.references() {
        if let Some(predicate) = table.join_on(*reference) {
            let _ = write!(
                from,
                " {} {} ON {}",
                join.keyword(),
                reference.name(),
                predicate
            );
        }
    }
    from
}

/// A `SELECT` statement under construction.
///
/// Optional clauses are only emitted when they carry something, so an empty
/// `group_by` never produces a dangling `GROUP BY`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SelectStatement<'a> {
    from: String,
    columns: &'a [&'a str],
    filter: String,
    group_by: &'a [&'a str],
    order_by: &'a [&'a str],
    limit: Option<u32>,
}

impl<'a> SelectStatement<'a> {
    /// Select `columns` from a table name or a prebuilt joined `FROM` clause.
    pub fn new(from: impl Into<String>, columns: &'a [&'a str]) -> Self {
        Self {
            from: from.into(),
            columns,
            ..Default::default()
        }
    }

    /// Condition without the `WHERE` keyword.
    pub fn filter(mut self, condition: impl Into<String>) -> Self {
        self.filter = condition.into();
        self
    }

    pub fn group_by(mut self, columns: &'a [&'a str]) -> Self {
        self.group_by = columns;
        self
    }

    pub fn order_by(mut self, columns: &'a [&'a str]) -> Self {
        self.order_by = columns;
        self
    }

    pub fn limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Render the statement. Empty when there are no columns.
    pub fn build(&self) -> String {
        if self.columns.is_empty() {
            return String::new();
        }

        let mut sql = format!("SELECT {} FROM {}", self.columns.join(", "), self.from);
        if !self.filter.trim().is_empty() {
            let _ = write!(sql, " WHERE {}", self.filter.trim());
        }
        if !self.group_by.is_empty() {
            let _ = write!(sql, " GROUP BY {}", self.group_by.join(", "));
        }
        if !self.order_by.is_empty() {
            let _ = write!(sql, " ORDER BY {}", self.order_by.join(", "));
        }
        if let Some(limit) = self.limit {
            let _ = write!(sql, " LIMIT {}", limit);
        }
        sql
    }
}

/// `($1, $2), ($3, $4), ...` for `rows` tuples of `count` placeholders.
fn placeholders(count: usize, rows: usize) -> (String, usize) {
    let mut out = String::with_capacity(rows * count * 5);
    let mut n = 0;

    for row in 0..rows {
        if row > 0 {
            out.push_str(", ");
        }
        out.push('(');
        for col in 0..count {
            if col > 0 {
                out.push_str(", ");
            }
            n += 1;
            let _ = write!(out, "${}", n);
        }
        out.push(')');
    }

    (out, n)
}

fn excluded(columns: &[&str]) -> String {
    columns
        .iter()
        .map(|c| format!("{c} = EXCLUDED.{c}"))
        .collect::<Vec<_>>()
        .join(", ")
}
