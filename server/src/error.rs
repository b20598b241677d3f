//! Unified error handling for the store and notifier.

use torgi_engine::SqlValue;

/// Application error type.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("malformed batch: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("the batch contains no records")]
    EmptyBatch,

    #[error("reference resolution failed for {table}: {message}")]
    ReferenceResolution { table: String, message: String },

    #[error("statement failed: {source}; stmt={statement} args={arguments:?}")]
    Persistence {
        statement: String,
        arguments: Vec<SqlValue>,
        #[source]
        source: sqlx::Error,
    },

    #[error("no record with id {0}")]
    NotFound(i64),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("scheduler stopped: {0}")]
    SchedulerFatal(#[source] Box<Error>),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),

    #[error("Engine error: {0}")]
    Engine(torgi_engine::Error),

    #[error("Task error: {0}")]
    Task(#[from] tokio::task::JoinError),
}

impl From<torgi_engine::Error> for Error {
    fn from(err: torgi_engine::Error) -> Self {
        match err {
            torgi_engine::Error::InvalidArgument(msg) => Error::InvalidArgument(msg),
            torgi_engine::Error::UnresolvedReference { table, value } => {
                Error::ReferenceResolution {
                    table,
                    message: format!("value {value:?} is still unresolved"),
                }
            }
            other => Error::Engine(other),
        }
    }
}

impl Error {
    /// Wrap a driver error with the statement and arguments that caused it.
    pub fn persistence(statement: &str, arguments: &[SqlValue], source: sqlx::Error) -> Self {
        Error::Persistence {
            statement: statement.to_string(),
            arguments: arguments.to_vec(),
            source,
        }
    }
}

/// Result type alias for store operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn engine_errors_keep_their_class() {
        let err: Error = torgi_engine::Error::InvalidArgument("id 0".into()).into();
        assert!(matches!(err, Error::InvalidArgument(m) if m == "id 0"));

        let err: Error = torgi_engine::Error::UnresolvedReference {
            table: "regions".into(),
            value: "Tver".into(),
        }
        .into();
        assert!(matches!(err, Error::ReferenceResolution { ref table, .. } if table == "regions"));

        let err: Error = torgi_engine::Error::TableNotFound("x".into()).into();
        assert!(matches!(err, Error::Engine(_)));
    }

    #[test]
    fn persistence_carries_statement_and_arguments() {
        let err = Error::persistence(
            "INSERT INTO t (a) VALUES ($1)",
            &[SqlValue::Text(Some("x".into()))],
            sqlx::Error::RowNotFound,
        );
        let text = err.to_string();
        assert!(text.contains("stmt=INSERT INTO t (a) VALUES ($1)"));
        assert!(text.contains("Text(Some(\"x\"))"));
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn scheduler_fatal_wraps_cause() {
        let err = Error::SchedulerFatal(Box::new(Error::NotFound(3)));
        assert_eq!(err.to_string(), "scheduler stopped: no record with id 3");
    }
}
