//! Natural-name to surrogate-id cache for lookup tables.
//!
//! A [`ReferenceMap`] lives for exactly one sync call: it is loaded from the
//! lookup tables, applied to a batch, grown with whatever had to be inserted,
//! and then dropped.

use crate::record::PurchaseRecord;
use crate::schema::Table;
use std::collections::{BTreeMap, BTreeSet, HashMap};

/// `table -> (natural name -> surrogate id)`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReferenceMap {
    tables: HashMap<Table, HashMap<String, i64>>,
}

impl ReferenceMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the cached mapping of one table.
    pub fn load(&mut self, table: Table, entries: impl IntoIterator<Item = (String, i64)>) {
        self.tables.insert(table, entries.into_iter().collect());
    }

    /// Add a single entry, e.g. a freshly inserted lookup row.
    pub fn insert(&mut self, table: Table, name: impl Into<String>, id: i64) {
        self.tables.entry(table).or_default().insert(name.into(), id);
    }

    pub fn get(&self, table: Table, name: &str) -> Option<i64> {
        self.tables.get(&table).and_then(|m| m.get(name)).copied()
    }

    /// Total number of cached entries across all tables.
    pub fn len(&self) -> usize {
        self.tables.values().map(HashMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Substitute every natural key of every record with its cached id.
    ///
    /// Values with no cached id are left unresolved and returned as the set of
    /// lookup rows that still have to be inserted.
    pub fn apply(&self, records: &mut [PurchaseRecord]) -> PendingInserts {
        let mut pending = PendingInserts::default();

        for record in records.iter_mut() {
            for table in Table::PurchaseRegistry.references() {
                let Some(name) = record.natural_key(*table) else {
                    continue;
                };
                match self.get(*table, name) {
                    Some(id) => record.set_reference_id(*table, id),
                    None => pending.add(*table, name),
                }
            }
        }

        pending
    }
}

/// Natural-key values missing from their lookup tables, per table.
///
/// Ordered so that inserts happen in a deterministic sequence.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PendingInserts {
    tables: BTreeMap<Table, BTreeSet<String>>,
}

impl PendingInserts {
    pub fn add(&mut self, table: Table, name: impl Into<String>) {
        self.tables.entry(table).or_default().insert(name.into());
    }

    pub fn is_empty(&self) -> bool {
        self.tables.values().all(BTreeSet::is_empty)
    }

    /// Number of missing values across all tables.
    pub fn len(&self) -> usize {
        self.tables.values().map(BTreeSet::len).sum()
    }

    pub fn tables(&self) -> impl Iterator<Item = (Table, &BTreeSet<String>)> {
        self.tables.iter().map(|(t, names)| (*t, names))
    }

    /// First missing value, for error reporting.
    pub fn first(&self) -> Option<(Table, &str)> {
        self.tables
            .iter()
            .find_map(|(t, names)| names.iter().next().map(|n| (*t, n.as_str())))
    }
}
