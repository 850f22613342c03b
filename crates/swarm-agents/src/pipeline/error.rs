use coordination::{BusError, Categorized, Category, StoreError, XrefError};
use thiserror::Error;

use crate::build_tool::BuildToolError;
use crate::designer::DesignerError;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("persistence error: {0}")]
    Store(#[from] StoreError),
    #[error("message bus error: {0}")]
    Bus(#[from] BusError),
    #[error("cross-reference registry error: {0}")]
    Xref(#[from] XrefError),
    #[error("designer parser error: {0}")]
    Designer(#[from] DesignerError),
    #[error("build tool error: {0}")]
    BuildTool(#[from] BuildToolError),
    #[error("staging filesystem error: {0}")]
    Io(#[from] std::io::Error),
}

impl Categorized for PipelineError {
    fn category(&self) -> Category {
        match self {
            PipelineError::Store(inner) => inner.category(),
            PipelineError::Bus(inner) => inner.category(),
            PipelineError::Xref(inner) => inner.category(),
            PipelineError::Designer(inner) => inner.category(),
            PipelineError::BuildTool(inner) => inner.category(),
            PipelineError::Io(_) => Category::Fatal,
        }
    }
}

pub type PipelineResult<T> = Result<T, PipelineError>;
