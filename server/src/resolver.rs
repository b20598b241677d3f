//! Lookup-table resolution for one sync call.
//!
//! Every natural name in a batch is swapped for its surrogate id. Names the
//! lookup tables do not know yet are inserted once, and the batch gets exactly
//! one more pass; anything still unresolved after that is an error.

use crate::error::{Error, Result};
use async_trait::async_trait;
use torgi_engine::{PurchaseRecord, ReferenceMap, Schema, Table};

/// Access to the lookup tables.
#[async_trait]
pub trait ReferenceStore: Send {
    /// Every `(name, id)` pair currently in `table`.
    async fn load(&mut self, table: Table) -> Result<Vec<(String, i64)>>;

    /// Insert `names` into `table`, returning the new `(name, id)` pairs.
    async fn insert_missing(&mut self, table: Table, names: &[String])
        -> Result<Vec<(String, i64)>>;
}

/// What a resolution pass had to do.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Resolution {
    /// Lookup rows inserted.
    pub inserted: usize,
    /// Whether the batch needed the second pass.
    pub retried: bool,
}

/// Resolver scoped to a single sync call.
///
/// The cache it builds is dropped with it, so concurrent or later syncs never
/// see a stale mapping.
pub struct Resolver<'s, S: ReferenceStore + ?Sized> {
    store: &'s mut S,
    map: ReferenceMap,
}

impl<'s, S: ReferenceStore + ?Sized> Resolver<'s, S> {
    pub fn new(store: &'s mut S) -> Self {
        Self {
            store,
            map: ReferenceMap::new(),
        }
    }

    /// Fill every reference id of `records`.
    pub async fn resolve_all(
        mut self,
        schema: &Schema,
        records: &mut [PurchaseRecord],
    ) -> Result<Resolution> {
        let references = schema.main_table().references();
        for table in references {
            let entries = self
                .store
                .load(*table)
                .await
                .map_err(|e| resolution_error(*table, e))?;
            self.map.load(*table, entries);
        }

        let pending = self.map.apply(records);
        if pending.is_empty() {
            return Ok(Resolution::default());
        }

        tracing::debug!(missing = pending.len(), "inserting new lookup values");
        let mut inserted = 0;
        for (table, names) in pending.tables() {
            let names: Vec<String> = names.iter().cloned().collect();
            let rows = self
                .store
                .insert_missing(table, &names)
                .await
                .map_err(|e| resolution_error(table, e))?;
            inserted += rows.len();
            for (name, id) in rows {
                self.map.insert(table, name, id);
            }
        }

        let still_missing = self.map.apply(records);
        if let Some((table, value)) = still_missing.first() {
            return Err(torgi_engine::Error::UnresolvedReference {
                table: table.to_string(),
                value: value.to_string(),
            }
            .into());
        }

        Ok(Resolution {
            inserted,
            retried: true,
        })
    }
}

fn resolution_error(table: Table, err: Error) -> Error {
    match err {
        err @ Error::ReferenceResolution { .. } => err,
        other => Error::ReferenceResolution {
            table: table.to_string(),
            message: other.to_string(),
        },
    }
}

/// Lookup tables held in memory.
///
/// Ids are handed out sequentially per table. Useful for tests and dry runs.
#[derive(Debug, Default, Clone)]
pub struct MemoryReferenceStore {
    tables: std::collections::BTreeMap<Table, Vec<(String, i64)>>,
    /// Tables whose inserts silently return nothing.
    pub drop_inserts: Vec<Table>,
    /// Number of `insert_missing` calls served.
    pub insert_calls: usize,
}

impl MemoryReferenceStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_rows(mut self, table: Table, names: &[&str]) -> Self {
        for name in names {
            self.push(table, name);
        }
        self
    }

    pub fn rows(&self, table: Table) -> &[(String, i64)] {
        self.tables.get(&table).map(Vec::as_slice).unwrap_or(&[])
    }

    fn push(&mut self, table: Table, name: &str) -> (String, i64) {
        let rows = self.tables.entry(table).or_default();
        let id = rows.len() as i64 + 1;
        rows.push((name.to_string(), id));
        (name.to_string(), id)
    }
}

#[async_trait]
impl ReferenceStore for MemoryReferenceStore {
    async fn load(&mut self, table: Table) -> Result<Vec<(String, i64)>> {
        Ok(self.rows(table).to_vec())
    }

    async fn insert_missing(
        &mut self,
        table: Table,
        names: &[String],
    ) -> Result<Vec<(String, i64)>> {
        self.insert_calls += 1;
        if self.drop_inserts.contains(&table) {
            return Ok(Vec::new());
        }
        Ok(names.iter().map(|name| self.push(table, name)).collect())
    }
}
