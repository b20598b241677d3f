//! # Torgi Engine
//!
//! Pure logic behind the torgi procurement store: table metadata, SQL
//! generation, record decoding, lookup resolution and notification timing.
//!
//! ## Design Principles
//!
//! - **No IO**: the engine never opens a connection; it produces SQL text and
//!   bind arguments and consumes rows already mapped into records
//! - **Schema-driven**: every statement is derived from [`Table`] metadata, so
//!   adding a lookup table means adding one descriptor
//! - **Testable**: all of it runs without a database
//!
//! ## Core Concepts
//!
//! ### Schema
//!
//! [`Table`] is a closed enumeration of the physical tables: the main
//! `purchase_registry` and six lookup tables mapping a natural name to a
//! surrogate id. [`Schema`] looks them up by name.
//!
//! ### Statements
//!
//! [`statement::upsert`] emits one multi-row `INSERT .. ON CONFLICT` for a
//! whole batch with continuously numbered placeholders.
//! [`SelectStatement`] emits selects whose optional clauses appear only when
//! non-empty.
//!
//! ### Reference resolution
//!
//! A [`ReferenceMap`] caches lookup tables for the duration of one sync. Applying
//! it to a batch fills surrogate ids and reports the values still missing as
//! [`PendingInserts`].
//!
//! ### Query intents
//!
//! A [`QueryIntent`] selects a filter, ordering or grouping, and projection.
//! [`QueryIntent::plan`] turns it into SQL with bound day parameters.
//!
//! ### Scheduling
//!
//! [`nearest_event`] picks the next auction to notify about and how long to
//! wait; [`SchedulerState`] consumes records one at a time in bidding order.
//!
//! ## Quick Start
//!
//! ```rust
//! use torgi_engine::{decode_batch, statement, ColumnSet, OnConflict, Table};
//!
//! let records = decode_batch(br#"[{"registry_number": "0859", "purchase_subject": "roads"}]"#).unwrap();
//!
//! let table = Table::PurchaseRegistry;
//! let (sql, placeholders) = statement::upsert(
//!     table.name(),
//!     "registry_number",
//!     table.columns(ColumnSet::Write),
//!     records.len(),
//!     OnConflict::Update,
//! );
//!
//! assert!(sql.starts_with("INSERT INTO purchase_registry"));
//! assert_eq!(placeholders, 19);
//! ```

pub mod error;
pub mod query;
pub mod record;
pub mod reference;
pub mod schedule;
pub mod schema;
pub mod statement;

// Re-export main types at crate root
pub use error::Error;
pub use query::{rollover_days, QueryIntent, QueryPlan};
pub use record::{decode_batch, PurchaseRecord};
pub use reference::{PendingInserts, ReferenceMap};
pub use schedule::{nearest_event, NearestEvent, Notified, SchedulerState, Timing};
pub use schema::{column, ColumnSet, JoinKind, KeyKind, Schema, Table, TableDef};
pub use statement::{OnConflict, SelectStatement, SqlValue};
