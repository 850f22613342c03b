use thiserror::Error;

use crate::errors::{Categorized, Category};

#[derive(Debug, Error)]
pub enum PolicyError {
    #[error("spawn denied: {0}")]
    CapacityDenied(String),
    #[error("throttled: {0}")]
    Throttled(String),
    #[error("invalid config: {0}")]
    InvalidConfig(String),
}

impl Categorized for PolicyError {
    fn category(&self) -> Category {
        match self {
            PolicyError::CapacityDenied(_) => Category::Capacity,
            PolicyError::Throttled(_) => Category::Capacity,
            PolicyError::InvalidConfig(_) => Category::Validation,
        }
    }
}

pub type PolicyResult<T> = Result<T, PolicyError>;
