use thiserror::Error;

/// Errors surfaced by the job store layer.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Underlying diesel / SQLite error.
    #[error("Database error: {0}")]
    Database(#[from] diesel::result::Error),

    /// A job with the same id already exists in this store's alias.
    #[error("A job with id {id} already exists")]
    Conflict { id: String },

    /// No job with the given id exists in this store's alias.
    #[error("Job not found: {id}")]
    NotFound { id: String },

    /// The job specification could not be encoded for storage.
    #[error("Failed to serialize job payload: {0}")]
    Serialization(String),

    /// A stored payload could not be turned back into a runnable job, e.g.
    /// because its task is no longer registered.
    #[error("Failed to deserialize stored job payload: {0}")]
    Deserialization(String),

    /// The shared manual-run budget ran out before the job finished.
    #[error("Manual run timed out before the job finished")]
    Timeout,
}

pub type Result<T> = std::result::Result<T, StoreError>;
