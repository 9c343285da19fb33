//! Model error types.

use thiserror::Error;

use crate::cycle::{CyclePhase, CycleStatus};

pub type ModelResult<T> = Result<T, ModelError>;

#[derive(Debug, Error)]
pub enum ModelError {
    #[error("Cycle record is immutable once {0}")]
    RecordSealed(CycleStatus),

    #[error("Invalid phase transition: {from} -> {to}")]
    InvalidTransition { from: CyclePhase, to: CyclePhase },

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Unknown channel kind: {0}")]
    UnknownChannelKind(String),
}

impl ModelError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }
}

impl From<validator::ValidationErrors> for ModelError {
    fn from(errors: validator::ValidationErrors) -> Self {
        Self::Validation(errors.to_string())
    }
}
