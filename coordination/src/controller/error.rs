use thiserror::Error;

use crate::bus::BusError;
use crate::errors::{Categorized, Category};
use crate::state::StoreError;

#[derive(Debug, Error)]
pub enum ControllerError {
    /// At-least-once redelivery of an assignment already being processed (§4.6 step 2).
    #[error("duplicate assignment for {0}: already in flight")]
    DuplicateAssignment(String),
    #[error("method worker failed: {0}")]
    WorkerFailure(String),
    #[error("message bus error: {0}")]
    Bus(#[from] BusError),
    #[error("persistence error: {0}")]
    Store(#[from] StoreError),
}

impl Categorized for ControllerError {
    fn category(&self) -> Category {
        match self {
            ControllerError::DuplicateAssignment(_) => Category::Validation,
            ControllerError::WorkerFailure(_) => Category::ProcessingError,
            ControllerError::Bus(inner) => inner.category(),
            ControllerError::Store(inner) => inner.category(),
        }
    }
}

pub type ControllerResult<T> = Result<T, ControllerError>;
