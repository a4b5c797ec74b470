//! Domain errors for the Cadence orchestration engine.

use thiserror::Error;
use uuid::Uuid;

/// Domain-level errors that can occur in the Cadence engine.
#[derive(Debug, Error)]
pub enum DomainError {
    #[error("Task not found: {0}")]
    TaskNotFound(Uuid),

    #[error("Task run not found: {0}")]
    TaskRunNotFound(Uuid),

    #[error("Invalid state transition from {from} to {to}: {reason}")]
    InvalidStateTransition { from: String, to: String, reason: String },

    #[error("Validation failed: {0}")]
    ValidationFailed(String),

    #[error("Invalid trigger configuration for task {task_id}: {reason}")]
    InvalidTriggerConfig { task_id: Uuid, reason: String },

    #[error("Unknown trigger: {0}")]
    UnknownTrigger(String),

    #[error("Trigger capability not supported: {0}")]
    Unsupported(&'static str),

    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Execution failed: {0}")]
    ExecutionFailed(String),
}

pub type DomainResult<T> = Result<T, DomainError>;

impl From<sqlx::Error> for DomainError {
    fn from(err: sqlx::Error) -> Self {
        DomainError::DatabaseError(err.to_string())
    }
}

impl From<serde_json::Error> for DomainError {
    fn from(err: serde_json::Error) -> Self {
        DomainError::SerializationError(err.to_string())
    }
}
