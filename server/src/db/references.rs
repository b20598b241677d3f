//! Lookup tables in Postgres.

use super::records::bind_values;
use crate::error::{Error, Result};
use crate::resolver::ReferenceStore;
use async_trait::async_trait;
use sqlx::{PgConnection, Row};
use torgi_engine::{statement, ColumnSet, KeyKind, SelectStatement, SqlValue, Table};

/// [`ReferenceStore`] over one connection, usually the sync transaction.
pub struct PgReferenceStore<'c> {
    conn: &'c mut PgConnection,
}

impl<'c> PgReferenceStore<'c> {
    pub fn new(conn: &'c mut PgConnection) -> Self {
        Self { conn }
    }
}

#[async_trait]
impl ReferenceStore for PgReferenceStore<'_> {
    async fn load(&mut self, table: Table) -> Result<Vec<(String, i64)>> {
        let columns = [table.name_column(), table.primary_key(KeyKind::Surrogate)];
        let sql = SelectStatement::new(table.name(), &columns).build();

        sqlx::query_as::<_, (String, i64)>(&sql)
            .fetch_all(&mut *self.conn)
            .await
            .map_err(|e| Error::persistence(&sql, &[], e))
    }

    async fn insert_missing(
        &mut self,
        table: Table,
        names: &[String],
    ) -> Result<Vec<(String, i64)>> {
        if names.is_empty() {
            return Ok(Vec::new());
        }

        let returning = [table.name_column(), table.primary_key(KeyKind::Surrogate)];
        let (sql, _) = statement::insert_returning(
            table.name(),
            table.columns(ColumnSet::Write),
            names.len(),
            &returning,
        );
        let args: Vec<SqlValue> = names
            .iter()
            .map(|name| SqlValue::Text(Some(name.clone())))
            .collect();

        let rows = bind_values(sqlx::query(&sql), &args)
            .fetch_all(&mut *self.conn)
            .await
            .map_err(|e| Error::persistence(&sql, &args, e))?;

        rows.iter()
            .map(|row| -> Result<(String, i64)> { Ok((row.try_get(0)?, row.try_get(1)?)) })
            .collect()
    }
}
