//! A [`MethodWorker`] that turns one [`MethodJobPacket`] into a `Generate` call
//! (§4.6 step 3b "method workers call Generate with a per-function prompt").

use std::sync::Arc;

use async_trait::async_trait;

use coordination::controller::{MethodJobPacket, MethodWorker};
use coordination::llm::{Generate, GenerateRequest};
use coordination::Stage;

const PREAMBLE: &str = "You implement one function at a time for a larger code unit. Return only the \
    function body and its signature in the target language; no surrounding class, no markdown fences, \
    no commentary.";

/// Backs the Controller's fan-out with a real LLM call per function (§6 "method
/// worker = Generate wrapper").
pub struct GatewayMethodWorker {
    generate: Arc<dyn Generate>,
}

impl GatewayMethodWorker {
    pub fn new(generate: Arc<dyn Generate>) -> Self {
        Self { generate }
    }
}

#[async_trait]
impl MethodWorker for GatewayMethodWorker {
    async fn execute(&self, packet: &MethodJobPacket) -> Result<String, anyhow::Error> {
        let user = build_prompt(packet);
        let request = GenerateRequest::new(PREAMBLE, user, "MethodWorker", Stage::Building);
        let response = self.generate.generate(request).await;

        if !response.success {
            anyhow::bail!(response.error.unwrap_or_else(|| "method worker call failed".to_string()));
        }
        if response.content.trim().is_empty() {
            anyhow::bail!("method worker returned empty content");
        }
        Ok(response.content)
    }
}

fn build_prompt(packet: &MethodJobPacket) -> String {
    let function = &packet.function;
    let mut prompt = format!(
        "Code unit: {}\nTarget language: {}\nSignature: {}\nReturn type: {}\nAccess: {}\nAsync: {}\n\nDescription:\n{}\n",
        packet.code_unit_name,
        function.target_language,
        function.signature,
        packet.extracted.return_type,
        packet.extracted.access_modifier,
        packet.extracted.is_async,
        function.description,
    );

    if let Some(logic) = &function.business_logic {
        prompt.push_str(&format!("\nBusiness logic:\n{logic}\n"));
    }
    if let Some(rules) = &function.validation_rules {
        prompt.push_str(&format!("\nValidation rules:\n{rules}\n"));
    }
    if let Some(handling) = &function.error_handling {
        prompt.push_str(&format!("\nError handling:\n{handling}\n"));
    }
    if let Some(security) = &function.security_considerations {
        prompt.push_str(&format!("\nSecurity considerations:\n{security}\n"));
    }
    if let Some(cases) = &function.test_cases {
        prompt.push_str(&format!("\nTest cases to satisfy:\n- {}\n", cases.join("\n- ")));
    }

    prompt.push_str("\nImplement the function now.");
    prompt
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::StubGenerate;
    use chrono::Utc;
    use coordination::controller::FunctionAssignment;
    use coordination::Priority;
    use uuid::Uuid;

    fn packet() -> MethodJobPacket {
        let function = FunctionAssignment {
            assignment_id: Uuid::new_v4(),
            function_specification_id: Uuid::new_v4(),
            function_name: "GetUser".to_string(),
            code_unit: "UserService".to_string(),
            signature: "public async Task<UserDto> GetUser(int id)".to_string(),
            description: "fetches a user by id".to_string(),
            business_logic: Some("look up by id, 404 if missing".to_string()),
            validation_rules: None,
            error_handling: None,
            security_considerations: None,
            test_cases: Some(vec!["returns None when absent".to_string()]),
            complexity_rating: 3,
            estimated_minutes: Some(10),
            priority: Priority::Medium,
            target_language: "C#".to_string(),
            assigned_at: Utc::now(),
            due_at: None,
        };
        MethodJobPacket::new(Uuid::new_v4(), "UserService", function)
    }

    #[tokio::test]
    async fn successful_call_returns_generated_content() {
        let worker = GatewayMethodWorker::new(Arc::new(StubGenerate::success("public Task<UserDto> GetUser(int id) { ... }")));
        let content = worker.execute(&packet()).await.unwrap();
        assert!(content.contains("GetUser"));
    }

    #[tokio::test]
    async fn failed_call_surfaces_as_error() {
        let worker = GatewayMethodWorker::new(Arc::new(StubGenerate::once(crate::test_support::failure_response("boom"))));
        let err = worker.execute(&packet()).await.unwrap_err();
        assert!(err.to_string().contains("boom"));
    }

    #[tokio::test]
    async fn empty_content_is_treated_as_failure() {
        let worker = GatewayMethodWorker::new(Arc::new(StubGenerate::success("")));
        let err = worker.execute(&packet()).await.unwrap_err();
        assert!(err.to_string().contains("empty"));
    }

    #[test]
    fn prompt_includes_signature_and_business_logic() {
        let prompt = build_prompt(&packet());
        assert!(prompt.contains("GetUser"));
        assert!(prompt.contains("look up by id"));
    }
}
