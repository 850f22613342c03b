//! Designer-Output Parser (C4, §4.4): turns one Designer agent's markdown into
//! persisted `FunctionSpecification`/`CodeUnit` rows and `CodeUnitAssignment` messages.

mod error;

pub use error::{DesignerError, DesignerResult};

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Utc;
use serde::Deserialize;
use serde_json::json;
use tracing::warn;
use uuid::Uuid;

use coordination::controller::{CodeUnitAssignment, FunctionAssignment, CODEUNIT_ASSIGNMENTS_QUEUE};
use coordination::llm::{Generate, GenerateRequest};
use coordination::{
    CodeUnit, CodeUnitStatus, CrossReferenceRegistry, DesignerOutput, DesignerOutputStatus,
    FunctionSpecStatus, FunctionSpecification, Priority, SharedMessageBus, SharedStateStore, Stage,
    UnitType,
};

const EXTRACTION_INSTRUCTION: &str = "Extract function specifications; return a JSON array with keys {functionName, codeUnit, namespace, signature, description, inputParameters, returnType, dependencies, businessLogic, validationRules, errorHandling, performanceRequirements, securityConsiderations, testCases, complexityRating (1..10), estimatedMinutes, priority}";

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct RawFunctionSpec {
    #[serde(default)]
    function_name: String,
    #[serde(default)]
    code_unit: String,
    #[serde(default)]
    namespace: Option<String>,
    #[serde(default)]
    signature: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    business_logic: Option<String>,
    #[serde(default)]
    validation_rules: Option<String>,
    #[serde(default)]
    error_handling: Option<String>,
    #[serde(default)]
    security_considerations: Option<String>,
    #[serde(default)]
    test_cases: Option<Vec<String>>,
    #[serde(default = "default_complexity")]
    complexity_rating: u8,
    #[serde(default)]
    estimated_minutes: Option<u32>,
    #[serde(default = "default_priority")]
    priority: Priority,
}

fn default_complexity() -> u8 {
    1
}

fn default_priority() -> Priority {
    Priority::Medium
}

/// A function spec plus the fields the domain row doesn't carry but the assignment does.
struct ParsedFunction {
    spec: FunctionSpecification,
    namespace: Option<String>,
    security_considerations: Option<String>,
    test_cases: Option<Vec<String>>,
}

pub struct DesignerOutputParser {
    generate: Arc<dyn Generate>,
    registry: Arc<CrossReferenceRegistry>,
    store: SharedStateStore,
    bus: SharedMessageBus,
}

impl DesignerOutputParser {
    pub fn new(
        generate: Arc<dyn Generate>,
        registry: Arc<CrossReferenceRegistry>,
        store: SharedStateStore,
        bus: SharedMessageBus,
    ) -> Self {
        Self { generate, registry, store, bus }
    }

    /// Runs the full extract -> parse -> persist -> assign pipeline for one Designer
    /// agent's markdown output. Never fails the caller on an LLM or parse failure: an
    /// empty `DesignerOutput` is persisted and logged instead (§4.4 error handling).
    pub async fn ingest(
        &self,
        project_id: Uuid,
        pipeline_id: Uuid,
        agent_type: &str,
        markdown: &str,
        target_language: &str,
    ) -> DesignerResult<DesignerOutput> {
        let request = GenerateRequest::new(
            "You design function-level specifications from a software brief.",
            format!("{EXTRACTION_INSTRUCTION}\n\n{markdown}"),
            agent_type.to_string(),
            Stage::Designing,
        );
        let response = self.generate.generate(request).await;

        if !response.success || response.content.trim().is_empty() {
            warn!(agent_type, "designer extraction produced no content");
            return self.persist_empty(project_id, pipeline_id, agent_type, markdown).await;
        }

        let Some(array_text) = extract_json_array(&response.content) else {
            warn!(agent_type, "designer response had no JSON array; emitting zero specs");
            return self.persist_empty(project_id, pipeline_id, agent_type, markdown).await;
        };

        let raw_specs: Vec<RawFunctionSpec> = match serde_json::from_str(array_text) {
            Ok(specs) => specs,
            Err(err) => {
                warn!(agent_type, error = %err, "designer JSON array failed to decode; emitting zero specs");
                return self.persist_empty(project_id, pipeline_id, agent_type, markdown).await;
            }
        };

        let kept: Vec<RawFunctionSpec> =
            raw_specs.into_iter().filter(|s| !s.function_name.trim().is_empty()).collect();

        if kept.is_empty() {
            return self.persist_empty(project_id, pipeline_id, agent_type, markdown).await;
        }

        let designer_output_xref = self
            .registry
            .create("DesignerOutput", &json!({"agentType": agent_type, "pipelineId": pipeline_id}))
            .await?;

        let total_complexity: u32 = kept.iter().map(|s| s.complexity_rating as u32).sum();
        let designer_output = DesignerOutput {
            id: Uuid::new_v4(),
            cross_ref_id: designer_output_xref.primary_id,
            project_id,
            pipeline_id,
            agent_type: agent_type.to_string(),
            markdown: markdown.to_string(),
            structured_summary: array_text.to_string(),
            function_spec_count: kept.len() as u32,
            complexity: total_complexity,
            quality: 1.0,
            status: DesignerOutputStatus::Parsed,
        };
        self.store.put_designer_output(&designer_output)?;

        let mut parsed = Vec::with_capacity(kept.len());
        for raw in kept {
            let xref = self
                .registry
                .create(
                    "FunctionSpecification",
                    &json!({"functionName": raw.function_name, "codeUnit": raw.code_unit}),
                )
                .await?;
            let spec = FunctionSpecification {
                id: Uuid::new_v4(),
                cross_ref_id: xref.primary_id,
                project_id,
                pipeline_id,
                code_unit: raw.code_unit.clone(),
                function_name: raw.function_name.clone(),
                signature: raw.signature.clone(),
                description: raw.description.clone(),
                business_logic: raw.business_logic.clone(),
                validation_rules: raw.validation_rules.clone(),
                error_handling: raw.error_handling.clone(),
                complexity_rating: raw.complexity_rating.clamp(1, 10),
                estimated_minutes: raw.estimated_minutes,
                priority: raw.priority,
                language: target_language.to_string(),
                status: FunctionSpecStatus::Pending,
            };
            self.store.put_function_spec(&spec)?;
            parsed.push(ParsedFunction {
                spec,
                namespace: raw.namespace,
                security_considerations: raw.security_considerations,
                test_cases: raw.test_cases,
            });
        }

        let mut groups: BTreeMap<String, Vec<ParsedFunction>> = BTreeMap::new();
        for function in parsed {
            groups.entry(function.spec.code_unit.clone()).or_default().push(function);
        }

        for (name, members) in groups {
            self.persist_code_unit_and_assign(
                project_id,
                pipeline_id,
                designer_output.id,
                &name,
                members,
                target_language,
            )
            .await?;
        }

        Ok(designer_output)
    }

    async fn persist_code_unit_and_assign(
        &self,
        project_id: Uuid,
        pipeline_id: Uuid,
        designer_output_id: Uuid,
        name: &str,
        members: Vec<ParsedFunction>,
        target_language: &str,
    ) -> DesignerResult<()> {
        let unit_type = UnitType::infer(name);
        let namespace = members
            .iter()
            .find_map(|m| m.namespace.clone())
            .unwrap_or_else(|| CodeUnit::default_namespace(target_language).to_string());
        let file_path = CodeUnit::file_path(unit_type, name, target_language);

        let function_count = members.len() as u32;
        let simple_function_count =
            members.iter().filter(|m| m.spec.complexity_rating < 4).count() as u32;
        let complex_function_count = function_count - simple_function_count;
        let total_complexity: u32 = members.iter().map(|m| m.spec.complexity_rating as u32).sum();
        let complexity = (total_complexity as f64 / function_count as f64).ceil() as u32;
        let estimated_minutes: u32 = members.iter().filter_map(|m| m.spec.estimated_minutes).sum();
        let priority = members
            .iter()
            .map(|m| m.spec.priority)
            .max()
            .unwrap_or(Priority::Medium);

        let code_unit_xref = self
            .registry
            .create("CodeUnit", &json!({"name": name, "pipelineId": pipeline_id}))
            .await?;
        let code_unit = CodeUnit {
            id: Uuid::new_v4(),
            cross_ref_id: code_unit_xref.primary_id,
            project_id,
            pipeline_id,
            designer_output_id,
            name: name.to_string(),
            unit_type,
            namespace: Some(namespace.clone()),
            language: target_language.to_string(),
            file_path,
            function_count,
            simple_function_count,
            complex_function_count,
            complexity,
            status: CodeUnitStatus::Planned,
            completion_pct: 0.0,
            priority,
            estimated_minutes,
        };
        self.store.put_code_unit(&code_unit)?;

        let now = Utc::now();
        let functions: Vec<FunctionAssignment> = members
            .into_iter()
            .map(|member| FunctionAssignment {
                assignment_id: Uuid::new_v4(),
                function_specification_id: member.spec.id,
                function_name: member.spec.function_name,
                code_unit: member.spec.code_unit,
                signature: member.spec.signature,
                description: member.spec.description,
                business_logic: member.spec.business_logic,
                validation_rules: member.spec.validation_rules,
                error_handling: member.spec.error_handling,
                security_considerations: member.security_considerations,
                test_cases: member.test_cases,
                complexity_rating: member.spec.complexity_rating,
                estimated_minutes: member.spec.estimated_minutes,
                priority: member.spec.priority,
                target_language: target_language.to_string(),
                assigned_at: now,
                due_at: None,
            })
            .collect();

        let assignment = CodeUnitAssignment {
            assignment_id: Uuid::new_v4(),
            code_unit_id: code_unit.id,
            name: code_unit.name.clone(),
            unit_type,
            namespace: Some(namespace),
            description: None,
            functions,
            simple_function_count,
            complex_function_count,
            dependencies: None,
            patterns: None,
            testing_strategy: None,
            complexity_rating: complexity.clamp(1, 10) as u8,
            estimated_minutes,
            priority,
            target_language: target_language.to_string(),
            assigned_at: now,
            due_at: None,
        };

        self.bus.send_priority(
            CODEUNIT_ASSIGNMENTS_QUEUE,
            &assignment,
            priority.assignment_priority(),
            None,
        )?;
        Ok(())
    }

    async fn persist_empty(
        &self,
        project_id: Uuid,
        pipeline_id: Uuid,
        agent_type: &str,
        markdown: &str,
    ) -> DesignerResult<DesignerOutput> {
        let xref = self
            .registry
            .create("DesignerOutput", &json!({"agentType": agent_type, "pipelineId": pipeline_id}))
            .await?;
        let output = DesignerOutput {
            id: Uuid::new_v4(),
            cross_ref_id: xref.primary_id,
            project_id,
            pipeline_id,
            agent_type: agent_type.to_string(),
            markdown: markdown.to_string(),
            structured_summary: String::new(),
            function_spec_count: 0,
            complexity: 0,
            quality: 0.0,
            status: DesignerOutputStatus::Empty,
        };
        self.store.put_designer_output(&output)?;
        Ok(output)
    }
}

/// Greedy first-`[`-to-last-`]` span scan across the whole response (§4.4 step 2).
/// Returns `None` if there's no bracket pair, which the caller treats as "zero specs".
fn extract_json_array(text: &str) -> Option<&str> {
    let start = text.find('[')?;
    let end = text.rfind(']')?;
    if end <= start {
        return None;
    }
    Some(&text[start..=end])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::StubGenerate;
    use coordination::{MessageBus, StateStore};

    fn parser(responses: Vec<coordination::llm::LlmResponse>) -> (tempfile::TempDir, DesignerOutputParser) {
        let dir = tempfile::tempdir().unwrap();
        let store = StateStore::open(dir.path().join("designer.db")).unwrap().shared();
        let registry = Arc::new(CrossReferenceRegistry::with_stubs(store.clone()));
        let bus = MessageBus::with_store(store.clone()).shared();
        let generate: Arc<dyn Generate> = Arc::new(StubGenerate::sequence(responses));
        (dir, DesignerOutputParser::new(generate, registry, store, bus))
    }

    #[test]
    fn extracts_first_to_last_bracket_span() {
        let text = "here you go:\n[{\"a\":1}]\nthanks";
        assert_eq!(extract_json_array(text), Some("[{\"a\":1}]"));
    }

    #[test]
    fn returns_none_without_brackets() {
        assert_eq!(extract_json_array("no array here"), None);
    }

    #[tokio::test]
    async fn ingest_persists_specs_and_emits_one_assignment_per_code_unit() {
        let content = r#"Some preamble.
        [
          {"functionName": "Create", "codeUnit": "UserService", "signature": "public Task<User> Create(User u)", "description": "creates a user", "complexityRating": 3, "estimatedMinutes": 15, "priority": "High"},
          {"functionName": "Delete", "codeUnit": "UserService", "signature": "public Task Delete(int id)", "description": "deletes a user", "complexityRating": 2, "estimatedMinutes": 5, "priority": "Medium"},
          {"functionName": "", "codeUnit": "UserService", "signature": "", "description": ""}
        ]
        trailing notes"#;
        let (_dir, parser) = parser(vec![crate::test_support::ok_response(content)]);
        let project_id = Uuid::new_v4();
        let pipeline_id = Uuid::new_v4();

        let output = parser
            .ingest(project_id, pipeline_id, "Designer", "brief text", "C#")
            .await
            .unwrap();

        assert_eq!(output.status, DesignerOutputStatus::Parsed);
        assert_eq!(output.function_spec_count, 2);

        let specs = parser.store.get_function_specs_for_pipeline(pipeline_id).unwrap();
        assert_eq!(specs.len(), 2);

        let units = parser.store.get_code_units_for_pipeline(pipeline_id).unwrap();
        assert_eq!(units.len(), 1);
        assert_eq!(units[0].name, "UserService");
        assert_eq!(units[0].unit_type, UnitType::Service);
        assert_eq!(units[0].priority, Priority::High);

        let item = parser.bus.receive(CODEUNIT_ASSIGNMENTS_QUEUE, None).await.unwrap().unwrap();
        let assignment: CodeUnitAssignment = coordination::bus::decode(&item).unwrap();
        assert_eq!(assignment.functions.len(), 2);
        assert_eq!(assignment.name, "UserService");
    }

    #[tokio::test]
    async fn ingest_matches_happy_path_scenario_one_from_the_spec() {
        // UserController.Create (rating=3, Medium) + UserController.Delete (rating=6, High).
        let content = r#"[
          {"functionName": "Create", "codeUnit": "UserController", "signature": "public Task<User> Create(User u)", "description": "creates a user", "complexityRating": 3, "priority": "Medium"},
          {"functionName": "Delete", "codeUnit": "UserController", "signature": "public Task Delete(int id)", "description": "deletes a user", "complexityRating": 6, "priority": "High"}
        ]"#;
        let (_dir, parser) = parser(vec![crate::test_support::ok_response(content)]);
        let pipeline_id = Uuid::new_v4();

        let output = parser.ingest(Uuid::new_v4(), pipeline_id, "Designer", "brief", "C#").await.unwrap();
        assert_eq!(output.function_spec_count, 2);

        let units = parser.store.get_code_units_for_pipeline(pipeline_id).unwrap();
        assert_eq!(units.len(), 1);
        let unit = &units[0];
        assert_eq!(unit.name, "UserController");
        assert_eq!(unit.unit_type, UnitType::Controller);
        assert_eq!(unit.simple_function_count, 1);
        assert_eq!(unit.complex_function_count, 1);
        assert_eq!(unit.priority, Priority::High);

        let item = parser.bus.receive(CODEUNIT_ASSIGNMENTS_QUEUE, None).await.unwrap().unwrap();
        let assignment: CodeUnitAssignment = coordination::bus::decode(&item).unwrap();
        assert_eq!(assignment.priority.assignment_priority(), 8);
    }

    #[tokio::test]
    async fn ingest_persists_empty_output_when_llm_call_fails() {
        let (_dir, parser) = parser(vec![crate::test_support::failure_response("boom")]);
        let output = parser
            .ingest(Uuid::new_v4(), Uuid::new_v4(), "Designer", "brief", "C#")
            .await
            .unwrap();
        assert_eq!(output.status, DesignerOutputStatus::Empty);
        assert_eq!(output.function_spec_count, 0);
    }

    #[tokio::test]
    async fn ingest_persists_empty_output_when_response_has_no_json_array() {
        let (_dir, parser) = parser(vec![crate::test_support::ok_response("no array in here")]);
        let output = parser
            .ingest(Uuid::new_v4(), Uuid::new_v4(), "Designer", "brief", "C#")
            .await
            .unwrap();
        assert_eq!(output.status, DesignerOutputStatus::Empty);
    }
}
