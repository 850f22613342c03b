//! The LLM Gateway contract (C3, §4.3): a single `Generate` call surface.
//!
//! This crate defines only the trait and its request/response types; `swarm-agents`
//! supplies the concrete implementation backed by an OpenAI-compatible client, so that
//! `coordination` stays free of any LLM client dependency and the pipeline executor can
//! depend on `Arc<dyn Generate>` instead of a concrete type (supports test doubles).

use crate::domain::Stage;

/// One `Generate` call's inputs (§4.3): `Generate(system, user, maxTokens, temperature,
/// agentType, stage)`.
#[derive(Debug, Clone)]
pub struct GenerateRequest {
    pub system: String,
    pub user: String,
    pub max_tokens: u32,
    pub temperature: f64,
    pub agent_type: String,
    pub stage: Stage,
}

impl GenerateRequest {
    pub fn new(system: impl Into<String>, user: impl Into<String>, agent_type: impl Into<String>, stage: Stage) -> Self {
        Self {
            system: system.into(),
            user: user.into(),
            max_tokens: 4096,
            temperature: 0.2,
            agent_type: agent_type.into(),
            stage,
        }
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = temperature;
        self
    }
}

/// `LLMResponse{success, content, tokensIn, tokensOut, cost, durationMs, model, error?}`
/// (§4.3). A hard 120s timeout surfaces as `success=false, error=Some("Timeout")` —
/// `Generate` never throws into its caller; every failure mode round-trips through this
/// struct instead.
#[derive(Debug, Clone)]
pub struct LlmResponse {
    pub success: bool,
    pub content: String,
    pub tokens_in: u32,
    pub tokens_out: u32,
    pub cost: f64,
    pub duration_ms: u64,
    pub model: String,
    pub error: Option<String>,
}

impl LlmResponse {
    pub fn failure(model: impl Into<String>, duration_ms: u64, error: impl Into<String>) -> Self {
        Self {
            success: false,
            content: String::new(),
            tokens_in: 0,
            tokens_out: 0,
            cost: 0.0,
            duration_ms,
            model: model.into(),
            error: Some(error.into()),
        }
    }
}

/// The single operation exposed by the LLM Gateway (§4.3).
#[async_trait::async_trait]
pub trait Generate: Send + Sync {
    async fn generate(&self, request: GenerateRequest) -> LlmResponse;
}

/// Estimated token count: the upper bound of word count and `len/4` (§4.3, §6).
pub fn estimate_tokens(text: &str) -> u32 {
    let word_count = text.split_whitespace().count();
    let len_based = text.len() / 4;
    word_count.max(len_based) as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_estimate_takes_the_upper_bound() {
        // 2 words, 25 chars -> len/4 = 6, which wins.
        assert_eq!(estimate_tokens("supercalifragilisticexpialidocious word"), 6);
        // Many short words -> word_count wins.
        assert_eq!(estimate_tokens("a b c d e f g h"), 8);
    }

    #[test]
    fn empty_text_estimates_zero_tokens() {
        assert_eq!(estimate_tokens(""), 0);
    }
}
