//! The LLM Gateway (C3, §4.3): the single call surface every stage and every method
//! worker goes through. Wraps a `rig-core` OpenAI-compatible client and implements
//! [`coordination::llm::Generate`] so callers depend on the trait object, not this
//! concrete type (supports test doubles in the pipeline executor and controller).

mod error;
mod pricing;
mod worker;

pub use error::{GatewayError, GatewayResult};
pub use pricing::estimate_cost;
pub use worker::GatewayMethodWorker;

use std::path::PathBuf;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::Utc;
use rig::client::CompletionClient;
use rig::completion::Prompt;
use rig::providers::openai;
use tracing::warn;

use coordination::llm::{estimate_tokens, Generate, GenerateRequest, LlmResponse};

/// Hard per-call timeout (§4.3): a timeout returns `success=false, error=Some("Timeout")`
/// rather than propagating into the caller.
const CALL_TIMEOUT: Duration = Duration::from_secs(120);

/// An OpenAI-compatible `Generate` implementation backed by one model endpoint.
pub struct LlmGateway {
    client: openai::CompletionsClient,
    model: String,
    artifact_dir: Option<PathBuf>,
}

impl LlmGateway {
    pub fn new(api_key: &str, base_url: &str, model: impl Into<String>) -> GatewayResult<Self> {
        let client = openai::CompletionsClient::builder()
            .api_key(api_key)
            .base_url(base_url)
            .build()
            .map_err(|e| GatewayError::ClientBuild(e.to_string()))?;
        Ok(Self { client, model: model.into(), artifact_dir: None })
    }

    /// Persist every generated response under this directory for audit (§4.3). Best
    /// effort: the gateway still returns a normal response if the directory is unset
    /// or the write fails.
    pub fn with_artifact_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.artifact_dir = Some(dir.into());
        self
    }

    fn persist_artifact(&self, agent_type: &str, content: &str) {
        let Some(dir) = &self.artifact_dir else { return };
        if let Err(err) = std::fs::create_dir_all(dir) {
            warn!(?dir, error = %err, "could not create LLM artifact directory");
            return;
        }
        let file_name = format!("{}-{agent_type}-{}.txt", Utc::now().format("%Y%m%dT%H%M%S%.f"), uuid::Uuid::new_v4());
        let path = dir.join(file_name);
        if let Err(err) = std::fs::write(&path, content) {
            warn!(?path, error = %err, "failed to persist LLM artifact; storage failure must not fail the call");
        }
    }
}

#[async_trait]
impl Generate for LlmGateway {
    async fn generate(&self, request: GenerateRequest) -> LlmResponse {
        let started = Instant::now();
        let agent = self
            .client
            .agent(&self.model)
            .preamble(&request.system)
            .temperature(request.temperature)
            .max_tokens(request.max_tokens as u64)
            .build();

        let call = agent.prompt(request.user.as_str());
        let outcome = tokio::time::timeout(CALL_TIMEOUT, call).await;
        let duration_ms = started.elapsed().as_millis() as u64;

        match outcome {
            Ok(Ok(content)) => {
                self.persist_artifact(&request.agent_type, &content);
                let tokens_in = estimate_tokens(&request.system) + estimate_tokens(&request.user);
                let tokens_out = estimate_tokens(&content);
                let cost = estimate_cost(&self.model, tokens_in, tokens_out);
                LlmResponse {
                    success: true,
                    content,
                    tokens_in,
                    tokens_out,
                    cost,
                    duration_ms,
                    model: self.model.clone(),
                    error: None,
                }
            }
            Ok(Err(err)) => LlmResponse::failure(self.model.clone(), duration_ms, err.to_string()),
            Err(_elapsed) => LlmResponse::failure(self.model.clone(), duration_ms, "Timeout"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::StubGenerate;

    #[tokio::test]
    async fn stub_generate_echoes_configured_response() {
        let stub = StubGenerate::success("hello");
        let response = stub
            .generate(GenerateRequest::new("sys", "user", "Designer", coordination::Stage::Designing))
            .await;
        assert_eq!(response.content, "hello");
    }
}
