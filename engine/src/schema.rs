//! Schema registry.
//!
//! Every physical table is one variant of [`Table`] and carries its metadata as
//! plain `'static` data ([`TableDef`]). The [`Schema`] registry maps table names
//! to variants and is built once; nothing in it is mutable.

use crate::{error::Result, Error};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Column names shared by the statement builder, query templates and row mapping.
pub mod column {
    pub const PURCHASE_ID: &str = "purchase_id";
    pub const REGISTRY_NUMBER: &str = "registry_number";
    pub const PURCHASE_SUBJECT: &str = "purchase_subject";
    pub const PURCHASE_STRING_CODE: &str = "purchase_string_code";
    pub const PURCHASE_STRING_CODE_NAME: &str = "purchase_string_code_name";
    pub const PURCHASE_TYPE_ID: &str = "purchase_type_id";
    pub const PURCHASE_TYPE_NAME: &str = "purchase_type_name";
    pub const COLLECTING: &str = "collecting";
    pub const APPROVAL_DATE: &str = "approval_date";
    pub const BIDDING: &str = "bidding";
    pub const REGION_ID: &str = "region_id";
    pub const REGION_NAME: &str = "region_name";
    pub const CUSTOMER_TYPE_ID: &str = "customer_type_id";
    pub const CUSTOMER_TYPE_NAME: &str = "customer_type_name";
    pub const MAX_PRICE: &str = "max_price";
    pub const APPLICATION_GUARANTEE: &str = "application_guarantee";
    pub const CONTRACT_GUARANTEE: &str = "contract_guarantee";
    pub const STATUS_ID: &str = "status_id";
    pub const STATUS_NAME: &str = "status_name";
    pub const OUR_PARTICIPANTS: &str = "our_participants";
    pub const ESTIMATION: &str = "estimation";
    pub const ETP_ID: &str = "etp_id";
    pub const ETP_NAME: &str = "etp_name";
    pub const WINNER: &str = "winner";
    pub const WINNER_PRICE: &str = "winner_price";
    pub const PARTICIPANTS: &str = "participants";
}

/// Which primary key of a table is meant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyKind {
    /// Human-readable unique key coming from the feed.
    Natural,
    /// Database generated integer id.
    Surrogate,
}

/// Column list variant, selected by how the table is being used.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnSet {
    /// Columns written by an upsert.
    Write,
    /// Columns projected by an ordinary read, joined against lookups.
    Read,
    /// Columns projected by a grouped read.
    Aggregate,
}

/// Join flavour used when building a `FROM` clause.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinKind {
    Inner,
    Left,
}

impl JoinKind {
    pub fn keyword(self) -> &'static str {
        match self {
            JoinKind::Inner => "INNER JOIN",
            JoinKind::Left => "LEFT JOIN",
        }
    }
}

/// Static metadata describing one table.
#[derive(Debug, PartialEq, Eq)]
pub struct TableDef {
    pub name: &'static str,
    pub natural_key: &'static str,
    pub surrogate_key: &'static str,
    /// Most significant human-readable column.
    pub name_column: &'static str,
    /// Lookup tables referenced by foreign key.
    pub references: &'static [Table],
    pub write_columns: &'static [&'static str],
    pub read_columns: &'static [&'static str],
    pub aggregate_columns: &'static [&'static str],
}

/// A physical table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Table {
    PurchaseRegistry,
    Etp,
    PurchaseStringCodes,
    CustomerTypes,
    Regions,
    PurchaseTypes,
    Statuses,
}

const fn lookup(
    name: &'static str,
    id: &'static str,
    label: &'static str,
    read: &'static [&'static str],
    write: &'static [&'static str],
) -> TableDef {
    TableDef {
        name,
        natural_key: label,
        surrogate_key: id,
        name_column: label,
        references: &[],
        write_columns: write,
        read_columns: read,
        aggregate_columns: &[],
    }
}

static PURCHASE_REGISTRY: TableDef = TableDef {
    name: "purchase_registry",
    natural_key: column::REGISTRY_NUMBER,
    surrogate_key: column::PURCHASE_ID,
    name_column: column::PURCHASE_SUBJECT,
    references: &[
        Table::Etp,
        Table::PurchaseStringCodes,
        Table::CustomerTypes,
        Table::Regions,
        Table::PurchaseTypes,
        Table::Statuses,
    ],
    // purchase_id is generated by the database
    write_columns: &[
        column::REGISTRY_NUMBER,
        column::PURCHASE_SUBJECT,
        column::PURCHASE_STRING_CODE,
        column::PURCHASE_TYPE_ID,
        column::COLLECTING,
        column::APPROVAL_DATE,
        column::BIDDING,
        column::REGION_ID,
        column::CUSTOMER_TYPE_ID,
        column::MAX_PRICE,
        column::APPLICATION_GUARANTEE,
        column::CONTRACT_GUARANTEE,
        column::STATUS_ID,
        column::OUR_PARTICIPANTS,
        column::ESTIMATION,
        column::ETP_ID,
        column::WINNER,
        column::WINNER_PRICE,
        column::PARTICIPANTS,
    ],
    read_columns: &[
        "purchase_registry.purchase_id",
        "purchase_registry.registry_number",
        "purchase_registry.purchase_subject",
        "purchase_string_codes.purchase_string_code_name",
        "purchase_types.purchase_type_name",
        "purchase_registry.collecting",
        "purchase_registry.approval_date",
        "purchase_registry.bidding",
        "regions.region_name",
        "customer_types.customer_type_name",
        "purchase_registry.max_price",
        "purchase_registry.application_guarantee",
        "purchase_registry.contract_guarantee",
        "statuses.status_name",
        "purchase_registry.our_participants",
        "purchase_registry.estimation",
        "etp.etp_name",
        "purchase_registry.winner",
        "purchase_registry.winner_price",
        "purchase_registry.participants",
    ],
    aggregate_columns: &[
        "purchase_registry.our_participants",
        "statuses.status_name",
        "sum(purchase_registry.application_guarantee) AS application_guarantee",
    ],
};

static ETP: TableDef = lookup(
    "etp",
    column::ETP_ID,
    column::ETP_NAME,
    &[column::ETP_ID, column::ETP_NAME],
    &[column::ETP_NAME],
);

static PURCHASE_STRING_CODES: TableDef = lookup(
    "purchase_string_codes",
    column::PURCHASE_STRING_CODE,
    column::PURCHASE_STRING_CODE_NAME,
    &[column::PURCHASE_STRING_CODE, column::PURCHASE_STRING_CODE_NAME],
    &[column::PURCHASE_STRING_CODE_NAME],
);

static CUSTOMER_TYPES: TableDef = lookup(
    "customer_types",
    column::CUSTOMER_TYPE_ID,
    column::CUSTOMER_TYPE_NAME,
    &[column::CUSTOMER_TYPE_ID, column::CUSTOMER_TYPE_NAME],
    &[column::CUSTOMER_TYPE_NAME],
);

static REGIONS: TableDef = lookup(
    "regions",
    column::REGION_ID,
    column::REGION_NAME,
    &[column::REGION_ID, column::REGION_NAME],
    &[column::REGION_NAME],
);

static PURCHASE_TYPES: TableDef = lookup(
    "purchase_types",
    column::PURCHASE_TYPE_ID,
    column::PURCHASE_TYPE_NAME,
    &[column::PURCHASE_TYPE_ID, column::PURCHASE_TYPE_NAME],
    &[column::PURCHASE_TYPE_NAME],
);

static STATUSES: TableDef = lookup(
    "statuses",
    column::STATUS_ID,
    column::STATUS_NAME,
    &[column::STATUS_ID, column::STATUS_NAME],
    &[column::STATUS_NAME],
);

impl Table {
    /// Every table, main table first.
    pub const ALL: [Table; 7] = [
        Table::PurchaseRegistry,
        Table::Etp,
        Table::PurchaseStringCodes,
        Table::CustomerTypes,
        Table::Regions,
        Table::PurchaseTypes,
        Table::Statuses,
    ];

    /// Metadata for this table.
    pub fn def(self) -> &'static TableDef {
        match self {
            Table::PurchaseRegistry => &PURCHASE_REGISTRY,
            Table::Etp => &ETP,
            Table::PurchaseStringCodes => &PURCHASE_STRING_CODES,
            Table::CustomerTypes => &CUSTOMER_TYPES,
            Table::Regions => &REGIONS,
            Table::PurchaseTypes => &PURCHASE_TYPES,
            Table::Statuses => &STATUSES,
        }
    }

    pub fn name(self) -> &'static str {
        self.def().name
    }

    pub fn primary_key(self, kind: KeyKind) -> &'static str {
        match kind {
            KeyKind::Natural => self.def().natural_key,
            KeyKind::Surrogate => self.def().surrogate_key,
        }
    }

    pub fn name_column(self) -> &'static str {
        self.def().name_column
    }

    pub fn references(self) -> &'static [Table] {
        self.def().references
    }

    pub fn columns(self, set: ColumnSet) -> &'static [&'static str] {
        let def = self.def();
        match set {
            ColumnSet::Write => def.write_columns,
            ColumnSet::Read => def.read_columns,
            ColumnSet::Aggregate => def.aggregate_columns,
        }
    }

    /// Join predicate linking this table to `other`, if `other` is one of its
    /// references.
    ///
    /// The foreign key column in this table carries the same name as the
    /// surrogate key of the referenced table.
    pub fn join_on(self, other: Table) -> Option<String> {
        if !self.references().contains(&other) {
            return None;
        }
        let key = other.primary_key(KeyKind::Surrogate);
        Some(format!(
            "{}.{} = {}.{}",
            self.name(),
            key,
            other.name(),
            key
        ))
    }

    /// Whether this table is a natural-name lookup table.
    pub fn is_lookup(self) -> bool {
        self.references().is_empty()
    }
}

impl std::fmt::Display for Table {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Registry of all known tables, looked up by name.
#[derive(Debug, Clone)]
pub struct Schema {
    tables: HashMap<&'static str, Table>,
}

impl Schema {
    /// Build the registry.
    pub fn new() -> Self {
        Self {
            tables: Table::ALL.iter().map(|t| (t.name(), *t)).collect(),
        }
    }

    /// Get a table by name.
    pub fn table(&self, name: &str) -> Result<Table> {
        self.tables
            .get(name)
            .copied()
            .ok_or_else(|| Error::TableNotFound(name.to_string()))
    }

    /// All tables, main table first.
    pub fn tables(&self) -> Vec<Table> {
        let mut tables: Vec<Table> = self.tables.values().copied().collect();
        tables.sort();
        tables
    }

    /// The table procurement records are stored in.
    pub fn main_table(&self) -> Table {
        Table::PurchaseRegistry
    }
}

impl Default for Schema {
    fn default() -> Self {
        Self::new()
    }
}
