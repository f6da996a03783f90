//! Error types for task store operations.

use thiserror::Error;

use crate::id::TaskId;

/// Errors that can occur during task store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// No task exists with the given ID.
    #[error("task not found: {0}")]
    NotFound(TaskId),

    /// A task with this ID already exists (PK collision).
    #[error("task already exists: {0}")]
    AlreadyExists(TaskId),

    /// Underlying database failure.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}
