//! Database module for PostgreSQL persistence.

mod pool;
mod records;
mod references;

pub use pool::*;
pub use records::*;
pub use references::*;
