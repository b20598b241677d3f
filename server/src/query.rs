//! Reads from the purchase registry.

use crate::db::{bind_values, record_from_row, Pool};
use crate::error::{Error, Result};
use chrono::{Datelike, NaiveDate, Weekday};
use torgi_engine::{PurchaseRecord, QueryIntent, QueryPlan};

/// Runs query intents against the store.
///
/// Every call checks a connection out of the pool and returns it when done.
#[derive(Clone)]
pub struct QueryEngine {
    pool: Pool,
}

impl QueryEngine {
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }

    /// Records matching any of `intents`, each tagged with the intent that
    /// produced it. `day_limit` bounds the forward and backward windows.
    pub async fn query(
        &self,
        day_limit: u32,
        intents: &[QueryIntent],
    ) -> Result<Vec<PurchaseRecord>> {
        if intents.is_empty() {
            return Err(Error::InvalidArgument("no query intent given".into()));
        }

        // only the next-business-day window depends on the weekday
        let today = if intents.iter().any(|i| i.needs_rollover()) {
            self.current_weekday().await?
        } else {
            Weekday::Mon
        };

        let mut records = Vec::new();
        for intent in intents {
            let plan = intent.plan(day_limit, today)?;
            let rows = self.fetch(&plan).await?;
            tracing::debug!(%intent, rows = rows.len(), "query executed");
            records.extend(rows);
        }

        Ok(records)
    }

    /// One record by surrogate id.
    pub async fn query_row(&self, id: i64) -> Result<PurchaseRecord> {
        let plan = QueryPlan::by_id(id)?;
        self.fetch(&plan)
            .await?
            .into_iter()
            .next()
            .ok_or(Error::NotFound(id))
    }

    async fn fetch(&self, plan: &QueryPlan) -> Result<Vec<PurchaseRecord>> {
        let rows = bind_values(sqlx::query(&plan.sql), &plan.params)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| Error::persistence(&plan.sql, &plan.params, e))?;

        rows.iter()
            .map(|row| -> Result<PurchaseRecord> {
                let mut record = record_from_row(row, plan.projection)
                    .map_err(|e| Error::persistence(&plan.sql, &plan.params, e))?;
                record.intent = Some(plan.intent);
                Ok(record)
            })
            .collect()
    }

    /// Weekday of the database's `current_date`, the same clock the
    /// statements compare against.
    async fn current_weekday(&self) -> Result<Weekday> {
        let (today,): (NaiveDate,) = sqlx::query_as("SELECT current_date")
            .fetch_one(&self.pool)
            .await?;
        Ok(today.weekday())
    }
}
