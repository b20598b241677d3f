//! Torgi Server - Postgres-backed procurement store and auction notifier.
//!
//! Feed batches are upserted through [`sync::SyncEngine`], read back through
//! [`query::QueryEngine`], and today's auctions are announced by the
//! [`scheduler::Scheduler`] shortly before they start.

pub mod config;
pub mod db;
pub mod error;
pub mod query;
pub mod resolver;
pub mod scheduler;
pub mod signal;
pub mod sync;

pub use config::Config;
pub use error::{Error, Result};
pub use query::QueryEngine;
pub use scheduler::{Scheduler, SchedulerHandle};
pub use signal::ChangeSignal;
pub use sync::SyncEngine;
