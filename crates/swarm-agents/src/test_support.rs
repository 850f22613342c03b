//! Shared test doubles used by gateway/designer/pipeline/supervisor unit tests.

use async_trait::async_trait;
use std::sync::Mutex;

use coordination::llm::{Generate, GenerateRequest, LlmResponse};

/// A `Generate` double that returns a fixed response, or a queued sequence of
/// responses (consumed in order, repeating the last one once exhausted).
pub struct StubGenerate {
    responses: Mutex<Vec<LlmResponse>>,
}

impl StubGenerate {
    pub fn once(response: LlmResponse) -> Self {
        Self { responses: Mutex::new(vec![response]) }
    }

    pub fn sequence(responses: Vec<LlmResponse>) -> Self {
        Self { responses: Mutex::new(responses) }
    }

    pub fn success(content: impl Into<String>) -> Self {
        Self::once(ok_response(content))
    }
}

pub fn ok_response(content: impl Into<String>) -> LlmResponse {
    LlmResponse {
        success: true,
        content: content.into(),
        tokens_in: 10,
        tokens_out: 10,
        cost: 0.001,
        duration_ms: 5,
        model: "test-model".into(),
        error: None,
    }
}

pub fn failure_response(error: impl Into<String>) -> LlmResponse {
    LlmResponse::failure("test-model", 5, error)
}

#[async_trait]
impl Generate for StubGenerate {
    async fn generate(&self, _request: GenerateRequest) -> LlmResponse {
        let mut responses = self.responses.lock().expect("stub lock poisoned");
        if responses.len() > 1 {
            responses.remove(0)
        } else {
            responses.last().cloned().unwrap_or_else(|| failure_response("no stub response configured"))
        }
    }
}
