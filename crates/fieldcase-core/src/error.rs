//! Error types for fieldcase-core

use thiserror::Error;

/// Result type alias using fieldcase-core's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in fieldcase-core store operations
#[derive(Error, Debug)]
pub enum Error {
    /// Database error
    #[error("Database error: {0}")]
    Database(String),

    /// libSQL error
    #[error("libSQL error: {0}")]
    LibSql(#[from] libsql::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Record not found
    #[error("Record not found: {0}")]
    NotFound(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A single element failed to reconcile into the local store.
    ///
    /// Isolated per element by the sync orchestrator; never aborts a batch.
    #[error("Reconciliation error for {entity} {key}: {source}")]
    Reconciliation {
        entity: &'static str,
        key: String,
        #[source]
        source: Box<Error>,
    },
}

impl Error {
    /// Wrap a store error as an element-level reconciliation failure.
    pub fn reconciliation(entity: &'static str, key: impl Into<String>, source: Self) -> Self {
        Self::Reconciliation {
            entity,
            key: key.into(),
            source: Box::new(source),
        }
    }
}
