//! Model error types.

use thiserror::Error;

use crate::JobStatus;

pub type ModelResult<T> = Result<T, ModelError>;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ModelError {
    #[error("Invalid idempotency key: {0}")]
    InvalidKey(String),

    #[error("Invalid job transition from {from} to {to}")]
    InvalidTransition { from: JobStatus, to: JobStatus },
}

impl ModelError {
    pub fn invalid_key(msg: impl Into<String>) -> Self {
        Self::InvalidKey(msg.into())
    }
}
