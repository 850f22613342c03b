use coordination::{BusError, Categorized, Category, StoreError, XrefError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DesignerError {
    #[error("cross-reference registry error: {0}")]
    Xref(#[from] XrefError),
    #[error("persistence error: {0}")]
    Store(#[from] StoreError),
    #[error("message bus error: {0}")]
    Bus(#[from] BusError),
}

impl Categorized for DesignerError {
    fn category(&self) -> Category {
        match self {
            DesignerError::Xref(inner) => inner.category(),
            DesignerError::Store(inner) => inner.category(),
            DesignerError::Bus(inner) => inner.category(),
        }
    }
}

pub type DesignerResult<T> = Result<T, DesignerError>;
