use thiserror::Error;

use shared_models::AppError;

use crate::models::QueueStatus;

#[derive(Error, Debug)]
pub enum QueueError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid status transition from {from} to {to}")]
    StateConflict { from: QueueStatus, to: QueueStatus },

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Duplicate queue code: {0}")]
    DuplicateCode(String),

    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),
}

impl From<QueueError> for AppError {
    fn from(err: QueueError) -> Self {
        match err {
            QueueError::NotFound(msg) => AppError::NotFound(msg),
            QueueError::StateConflict { .. } => AppError::Conflict(err.to_string()),
            QueueError::Validation(msg) => AppError::BadRequest(msg),
            QueueError::DuplicateCode(msg) => AppError::Conflict(msg),
            QueueError::StoreUnavailable(msg) => AppError::Database(msg),
        }
    }
}
