use coordination::{Categorized, Category};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BuildToolError {
    #[error("unsupported target language: {0}")]
    UnsupportedLanguage(String),
    #[error("failed to spawn build tool: {0}")]
    Spawn(#[from] std::io::Error),
}

impl Categorized for BuildToolError {
    fn category(&self) -> Category {
        match self {
            BuildToolError::UnsupportedLanguage(_) => Category::Validation,
            BuildToolError::Spawn(_) => Category::Fatal,
        }
    }
}

pub type BuildToolResult<T> = Result<T, BuildToolError>;
