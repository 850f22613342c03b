use thiserror::Error;

use crate::errors::{Categorized, Category};
use crate::state::StoreError;

#[derive(Debug, Error)]
pub enum XrefError {
    #[error("cross-reference not found: {0}")]
    NotFound(uuid::Uuid),
    #[error("graph store error: {0}")]
    Graph(String),
    #[error("search index error: {0}")]
    Search(String),
    #[error("persistence error: {0}")]
    Store(#[from] StoreError),
}

impl Categorized for XrefError {
    fn category(&self) -> Category {
        match self {
            XrefError::NotFound(_) => Category::Validation,
            XrefError::Graph(_) | XrefError::Search(_) => Category::Transient,
            XrefError::Store(inner) => inner.category(),
        }
    }
}

pub type XrefResult<T> = Result<T, XrefError>;
