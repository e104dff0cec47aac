use thiserror::Error;

/// Storage-specific error types for the local pending queue.
///
/// Only failing to open the database at startup is fatal to the client;
/// every runtime storage error is caught at the call site, logged, and
/// degrades to "this scan may be lost" rather than crashing a worker.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Database connection or query execution failed
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Migration execution failed
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// Record not found
    #[error("Record not found: id={0}")]
    RecordNotFound(i64),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Configuration(String),
}

/// Specialized result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;
