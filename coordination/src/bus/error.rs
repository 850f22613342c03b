use thiserror::Error;

use crate::errors::{Categorized, Category};
use crate::state::StoreError;

#[derive(Debug, Error)]
pub enum BusError {
    #[error("invalid queue name: {0}")]
    InvalidQueueName(String),
    #[error("queue not found: {0}")]
    QueueNotFound(String),
    #[error("item not found (already acknowledged, expired, or unknown): {0}")]
    ItemNotFound(String),
    #[error("channel not found: {0}")]
    ChannelNotFound(String),
    #[error("queue {0} does not have priority enabled")]
    PriorityNotEnabled(String),
    #[error("message too large: {size} bytes exceeds {max} and could not be truncated further")]
    OversizedMessage { size: usize, max: usize },
    #[error("queue {0} is full ({0} has reached its configured maxQueueSize)")]
    QueueFull(String),
    #[error("serialization error: {0}")]
    Serialization(String),
    #[error("persistence error: {0}")]
    Store(#[from] StoreError),
}

impl Categorized for BusError {
    fn category(&self) -> Category {
        match self {
            BusError::InvalidQueueName(_) => Category::Validation,
            BusError::QueueNotFound(_) => Category::Validation,
            BusError::ItemNotFound(_) => Category::Validation,
            BusError::ChannelNotFound(_) => Category::Validation,
            BusError::PriorityNotEnabled(_) => Category::Validation,
            BusError::OversizedMessage { .. } => Category::Validation,
            BusError::QueueFull(_) => Category::Capacity,
            BusError::Serialization(_) => Category::Validation,
            BusError::Store(inner) => inner.category(),
        }
    }
}

pub type BusResult<T> = Result<T, BusError>;
