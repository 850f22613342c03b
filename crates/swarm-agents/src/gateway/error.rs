use coordination::{Categorized, Category};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("failed to build LLM client: {0}")]
    ClientBuild(String),
}

impl Categorized for GatewayError {
    fn category(&self) -> Category {
        Category::Fatal
    }
}

pub type GatewayResult<T> = Result<T, GatewayError>;
