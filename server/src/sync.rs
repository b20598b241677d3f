//! Batch ingestion into the purchase registry.

use crate::db::{bind_values, PgReferenceStore, Pool};
use crate::error::{Error, Result};
use crate::resolver::Resolver;
use std::collections::HashSet;
use torgi_engine::statement::{self, MAX_PLACEHOLDERS};
use torgi_engine::{
    decode_batch, ColumnSet, KeyKind, OnConflict, PurchaseRecord, Schema, SqlValue,
};

/// Writes feed batches into the store.
///
/// Calls take `&mut self`, so a single engine never runs two syncs at once.
pub struct SyncEngine {
    pool: Pool,
    schema: Schema,
}

impl SyncEngine {
    pub fn new(pool: Pool) -> Self {
        Self {
            pool,
            schema: Schema::new(),
        }
    }

    /// Decode a JSON batch and upsert it. Returns the number of rows written.
    pub async fn upsert(&mut self, payload: &[u8]) -> Result<usize> {
        let records = decode_batch(payload)?;
        self.upsert_records(records).await
    }

    /// Resolve references and upsert `records` in one transaction.
    ///
    /// Either every row lands or nothing does, lookup inserts included.
    #[tracing::instrument(skip_all, fields(batch = records.len()))]
    pub async fn upsert_records(&mut self, records: Vec<PurchaseRecord>) -> Result<usize> {
        if records.is_empty() {
            return Err(Error::EmptyBatch);
        }
        let mut records = dedup_by_registry_number(records);
        check_placeholders(&self.schema, records.len())?;

        let mut tx = self.pool.begin().await?;

        let resolution = {
            let mut store = PgReferenceStore::new(&mut *tx);
            Resolver::new(&mut store)
                .resolve_all(&self.schema, &mut records)
                .await?
        };
        tracing::debug!(
            inserted = resolution.inserted,
            retried = resolution.retried,
            "references resolved"
        );

        let (sql, arguments) = build_upsert(&self.schema, &records)?;
        let result = bind_values(sqlx::query(&sql), &arguments)
            .execute(&mut *tx)
            .await;
        if let Err(source) = result {
            // dropping the transaction rolls it back
            return Err(Error::Persistence {
                statement: sql,
                arguments,
                source,
            });
        }

        tx.commit().await?;
        tracing::info!(rows = records.len(), "batch upserted");

        Ok(records.len())
    }

    /// Delete records whose auction is more than `months` months old.
    pub async fn purge_stale(&mut self, months: u32) -> Result<u64> {
        let months = i32::try_from(months)
            .map_err(|_| Error::InvalidArgument(format!("retention of {months} months")))?;

        let table = self.schema.main_table();
        let sql = statement::delete_where(
            table.name(),
            "bidding < current_date - make_interval(months => $1::int)",
        );
        if sql.is_empty() {
            return Err(torgi_engine::Error::EmptyStatement(table.name().to_string()).into());
        }
        let arguments = [SqlValue::Int(Some(months))];

        let result = bind_values(sqlx::query(&sql), &arguments)
            .execute(&self.pool)
            .await
            .map_err(|e| Error::persistence(&sql, &arguments, e))?;

        let purged = result.rows_affected();
        tracing::info!(purged, months, "stale records purged");
        Ok(purged)
    }
}

/// Build the batch upsert and its arguments.
///
/// Every record must already carry its resolved reference ids.
pub fn build_upsert(schema: &Schema, records: &[PurchaseRecord]) -> Result<(String, Vec<SqlValue>)> {
    let table = schema.main_table();
    let columns = table.columns(ColumnSet::Write);

    let (sql, placeholders) = statement::upsert(
        table.name(),
        table.primary_key(KeyKind::Natural),
        columns,
        records.len(),
        OnConflict::Update,
    );
    if sql.is_empty() {
        return Err(torgi_engine::Error::EmptyStatement(table.name().to_string()).into());
    }

    let mut arguments = Vec::with_capacity(placeholders);
    for record in records {
        arguments.extend(record.write_args()?);
    }
    debug_assert_eq!(arguments.len(), placeholders);

    Ok((sql, arguments))
}

fn check_placeholders(schema: &Schema, rows: usize) -> Result<()> {
    let columns = schema.main_table().columns(ColumnSet::Write).len();
    let needed = rows.saturating_mul(columns);
    if needed > MAX_PLACEHOLDERS {
        return Err(Error::InvalidArgument(format!(
            "batch of {rows} records needs {needed} placeholders, at most {MAX_PLACEHOLDERS} allowed"
        )));
    }
    Ok(())
}

/// Keep only the last occurrence of each registry number.
///
/// A single `ON CONFLICT DO UPDATE` cannot touch the same row twice.
fn dedup_by_registry_number(records: Vec<PurchaseRecord>) -> Vec<PurchaseRecord> {
    let mut seen = HashSet::new();
    let mut unique: Vec<PurchaseRecord> = records
        .into_iter()
        .rev()
        .filter(|r| seen.insert(r.registry_number.clone()))
        .collect();
    unique.reverse();
    unique
}
