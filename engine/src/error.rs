//! Error types for the torgi engine.

use thiserror::Error;

/// All possible errors from the torgi engine.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("table not found: {0}")]
    TableNotFound(String),

    #[error("empty statement for {0}")]
    EmptyStatement(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("unresolved reference in {table}: {value}")]
    UnresolvedReference { table: String, value: String },
}

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, Error>;
