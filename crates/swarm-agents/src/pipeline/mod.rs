//! Pipeline Executor (C7, §4.7): drives one project through the fixed stage order
//! `Planning -> Designing -> Swarming -> Building -> Validating`.

mod error;
mod registry;

pub use error::{PipelineError, PipelineResult};
pub use registry::{AgentRegistry, AgentSpec};

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use uuid::Uuid;

use coordination::controller::{CodeUnitAssignment, FunctionAssignment, BUILDER_ERRORS_QUEUE, CODEUNIT_ASSIGNMENTS_QUEUE};
use coordination::llm::{Generate, GenerateRequest};
use coordination::{
    AgentExecution, CodeUnit, CrossReferenceRegistry, ExecutionStatus, FunctionSpecification,
    PipelineExecution, Priority, Project, SharedMessageBus, SharedStateStore, Stage, StageExecution,
    SwarmPolicy,
};

use crate::build_tool;
use crate::designer::DesignerOutputParser;

pub struct PipelineExecutor {
    generate: Arc<dyn Generate>,
    store: SharedStateStore,
    bus: SharedMessageBus,
    policy: Arc<SwarmPolicy>,
    designer: DesignerOutputParser,
    agents: AgentRegistry,
    staging_root: PathBuf,
}

impl PipelineExecutor {
    pub fn new(
        generate: Arc<dyn Generate>,
        registry: Arc<CrossReferenceRegistry>,
        store: SharedStateStore,
        bus: SharedMessageBus,
        policy: Arc<SwarmPolicy>,
        staging_root: impl Into<PathBuf>,
    ) -> Self {
        let designer = DesignerOutputParser::new(generate.clone(), registry, store.clone(), bus.clone());
        Self {
            generate,
            store,
            bus,
            policy,
            designer,
            agents: AgentRegistry::default(),
            staging_root: staging_root.into(),
        }
    }

    pub fn with_agent_registry(mut self, agents: AgentRegistry) -> Self {
        self.agents = agents;
        self
    }

    /// Drives `project` through all five stages, persisting a `PipelineExecution` row
    /// and one `StageExecution` row per stage as it goes. Checked for cancellation
    /// between stages (§5 "Executor checks between stages").
    pub async fn run(&self, project: &Project, cancellation: CancellationToken) -> PipelineResult<PipelineExecution> {
        let config_snapshot = format!("{:#?}", self.policy.config());
        let mut pipeline = PipelineExecution::new(project.id, config_snapshot);
        pipeline.mark_running();
        self.store.put_pipeline(&pipeline)?;

        loop {
            if cancellation.is_cancelled() {
                info!(pipeline_id = %pipeline.id, stage = %pipeline.stage, "pipeline cancelled between stages");
                pipeline.mark_cancelled();
                self.store.put_pipeline(&pipeline)?;
                break;
            }

            let mut stage_exec = StageExecution::new(pipeline.id, pipeline.stage);
            self.store.put_stage_execution(&stage_exec)?;

            let outcome = self.run_stage(project, &pipeline, &mut stage_exec, &cancellation).await;

            match outcome {
                Ok(()) => stage_exec.complete(),
                Err(err) => {
                    stage_exec.fail();
                    self.store.put_stage_execution(&stage_exec)?;
                    pipeline.mark_failed(err.to_string());
                    self.store.put_pipeline(&pipeline)?;
                    return Err(err);
                }
            }
            self.store.put_stage_execution(&stage_exec)?;

            if pipeline.advance() {
                self.store.put_pipeline(&pipeline)?;
            } else {
                pipeline.mark_completed();
                self.store.put_pipeline(&pipeline)?;
                break;
            }
        }

        Ok(pipeline)
    }

    async fn run_stage(
        &self,
        project: &Project,
        pipeline: &PipelineExecution,
        stage_exec: &mut StageExecution,
        cancellation: &CancellationToken,
    ) -> PipelineResult<()> {
        match pipeline.stage {
            Stage::Planning => self.run_generic_stage(project, pipeline, stage_exec, &self.agents.planning).await,
            Stage::Designing => self.run_designing_stage(project, pipeline, stage_exec).await,
            Stage::Swarming => self.run_swarming_stage(project, pipeline, stage_exec, cancellation).await,
            Stage::Building => self.run_building_stage(project, pipeline, stage_exec).await,
            Stage::Validating => self.run_generic_stage(project, pipeline, stage_exec, &self.agents.validating).await,
        }
    }

    /// Planning/Validating (§4.7): call the gateway once per registered agent type,
    /// persisting an `AgentExecution` row per call. Never batched across agent types.
    async fn run_generic_stage(
        &self,
        project: &Project,
        pipeline: &PipelineExecution,
        stage_exec: &mut StageExecution,
        agents: &[AgentSpec],
    ) -> PipelineResult<()> {
        for agent in agents {
            let system = (agent.preamble)(project);
            let user = (agent.instruction)(project);
            let mut execution =
                AgentExecution::new(project.id, pipeline.id, stage_exec.id, agent.agent_type, format!("{system}\n\n{user}"));
            self.store.put_agent_execution(&execution)?;

            let request = GenerateRequest::new(system, user, agent.agent_type, pipeline.stage);
            let response = self.generate.generate(request).await;

            if response.success {
                execution.complete(response.content, response.tokens_in, response.tokens_out, response.cost);
                stage_exec.items_completed += 1;
            } else {
                let message = response.error.unwrap_or_else(|| "unknown gateway error".to_string());
                warn!(agent_type = agent.agent_type, error = %message, "agent execution failed");
                execution.fail(message);
                stage_exec.items_failed += 1;
            }
            self.store.put_agent_execution(&execution)?;
        }
        Ok(())
    }

    /// Designing (§4.7): per-agent, never batched — each designer's markdown flows
    /// through the C4 ingestion hook immediately so its code-unit assignments are
    /// emitted before the stage ends.
    async fn run_designing_stage(
        &self,
        project: &Project,
        pipeline: &PipelineExecution,
        stage_exec: &mut StageExecution,
    ) -> PipelineResult<()> {
        let target_language = project.target_language.as_deref().unwrap_or("C#").to_string();

        for agent in &self.agents.designing {
            let system = (agent.preamble)(project);
            let user = (agent.instruction)(project);
            let mut execution =
                AgentExecution::new(project.id, pipeline.id, stage_exec.id, agent.agent_type, format!("{system}\n\n{user}"));
            self.store.put_agent_execution(&execution)?;

            let request = GenerateRequest::new(system, user, agent.agent_type, Stage::Designing);
            let response = self.generate.generate(request).await;

            if !response.success {
                let message = response.error.unwrap_or_else(|| "unknown gateway error".to_string());
                warn!(agent_type = agent.agent_type, error = %message, "designer agent call failed");
                execution.fail(message);
                stage_exec.items_failed += 1;
                self.store.put_agent_execution(&execution)?;
                continue;
            }

            execution.complete(response.content.clone(), response.tokens_in, response.tokens_out, response.cost);
            self.store.put_agent_execution(&execution)?;

            let output = self
                .designer
                .ingest(project.id, pipeline.id, agent.agent_type, &response.content, &target_language)
                .await?;
            stage_exec.items_completed += output.function_spec_count;
        }
        Ok(())
    }

    /// Swarming (§4.7): never calls the LLM. Re-groups all `FunctionSpecification`
    /// rows by code unit and re-emits one `CodeUnitAssignment` per unit at a fixed
    /// "High" priority; the Controller's idempotency guard absorbs the duplicate
    /// delivery against whatever the Designing stage already emitted (§9 open question 1).
    /// Cancellation is observed per group (§5): a cancellation arriving mid-dispatch
    /// stops further emission instead of waiting for the whole unit list to drain.
    async fn run_swarming_stage(
        &self,
        _project: &Project,
        pipeline: &PipelineExecution,
        stage_exec: &mut StageExecution,
        cancellation: &CancellationToken,
    ) -> PipelineResult<()> {
        let specs = self.store.get_function_specs_for_pipeline(pipeline.id)?;
        if specs.is_empty() {
            info!(pipeline_id = %pipeline.id, "no function specifications to swarm; advancing");
            return Ok(());
        }

        let mut by_unit: HashMap<String, Vec<FunctionSpecification>> = HashMap::new();
        for spec in specs {
            by_unit.entry(spec.code_unit.clone()).or_default().push(spec);
        }

        let units = self.store.get_code_units_for_pipeline(pipeline.id)?;
        let now = chrono::Utc::now();

        for unit in &units {
            if cancellation.is_cancelled() {
                info!(pipeline_id = %pipeline.id, "swarming dispatch cancelled mid-loop; stopping re-emission");
                break;
            }

            let Some(unit_specs) = by_unit.get(&unit.name) else { continue };
            let functions: Vec<FunctionAssignment> = unit_specs
                .iter()
                .map(|spec| FunctionAssignment {
                    assignment_id: Uuid::new_v4(),
                    function_specification_id: spec.id,
                    function_name: spec.function_name.clone(),
                    code_unit: spec.code_unit.clone(),
                    signature: spec.signature.clone(),
                    description: spec.description.clone(),
                    business_logic: spec.business_logic.clone(),
                    validation_rules: spec.validation_rules.clone(),
                    error_handling: spec.error_handling.clone(),
                    security_considerations: None,
                    test_cases: None,
                    complexity_rating: spec.complexity_rating,
                    estimated_minutes: spec.estimated_minutes,
                    priority: spec.priority,
                    target_language: spec.language.clone(),
                    assigned_at: now,
                    due_at: None,
                })
                .collect();

            let assignment = CodeUnitAssignment {
                assignment_id: Uuid::new_v4(),
                code_unit_id: unit.id,
                name: unit.name.clone(),
                unit_type: unit.unit_type,
                namespace: unit.namespace.clone(),
                description: None,
                functions,
                simple_function_count: unit.simple_function_count,
                complex_function_count: unit.complex_function_count,
                dependencies: None,
                patterns: None,
                testing_strategy: None,
                complexity_rating: unit.complexity.clamp(1, 10) as u8,
                estimated_minutes: unit.estimated_minutes,
                priority: Priority::High,
                target_language: unit.language.clone(),
                assigned_at: now,
                due_at: None,
            };

            self.bus
                .send_priority(CODEUNIT_ASSIGNMENTS_QUEUE, &assignment, Priority::High.assignment_priority(), None)?;
            stage_exec.items_completed += 1;
        }

        Ok(())
    }

    /// Building (§4.7): a single "enhanced builder" pass per code unit — aggregate its
    /// `CodeDocument`s onto disk, shell the target language's build tool, and emit
    /// `BuilderError`s for high-severity failures.
    async fn run_building_stage(
        &self,
        project: &Project,
        pipeline: &PipelineExecution,
        stage_exec: &mut StageExecution,
    ) -> PipelineResult<()> {
        let units = self.store.get_code_units_for_pipeline(pipeline.id)?;
        let run_dir = self.staging_root.join(pipeline.id.to_string());

        for unit in &units {
            let documents = self.store.get_code_documents_for_unit(project.id, &unit.name)?;
            if documents.is_empty() {
                continue;
            }

            let unit_dir = run_dir.join(&unit.name);
            tokio::fs::create_dir_all(&unit_dir).await?;
            for document in &documents {
                let extension = CodeUnit::extension(&unit.language);
                let file_name = format!("{}{extension}", document.function_name);
                tokio::fs::write(unit_dir.join(file_name), &document.content).await?;
            }

            let outcome = build_tool::run_build(&unit.language, &unit_dir, project.id, &unit.name).await?;
            for error in outcome.errors.iter().filter(|e| e.severity >= 8) {
                self.bus.send_priority(BUILDER_ERRORS_QUEUE, error, error.severity, None)?;
            }

            if outcome.success {
                stage_exec.items_completed += 1;
            } else {
                stage_exec.items_failed += 1;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::StubGenerate;
    use coordination::{CrossReferenceRegistry, MessageBus, Project, StateStore, SwarmPolicyConfig};

    fn executor(responses: Vec<coordination::llm::LlmResponse>) -> (tempfile::TempDir, PipelineExecutor) {
        let dir = tempfile::tempdir().unwrap();
        let store = StateStore::open(dir.path().join("pipeline.db")).unwrap().shared();
        let registry = Arc::new(CrossReferenceRegistry::with_stubs(store.clone()));
        let bus = MessageBus::with_store(store.clone()).shared();
        let policy = Arc::new(SwarmPolicy::new(SwarmPolicyConfig::default()));
        let generate: Arc<dyn Generate> = Arc::new(StubGenerate::sequence(responses));
        let staging = dir.path().join("staging");
        let executor = PipelineExecutor::new(generate, registry, store, bus, policy, staging);
        (dir, executor)
    }

    fn designer_markdown() -> String {
        r#"Design notes.
        [
          {"functionName": "Create", "codeUnit": "UserService", "signature": "public Task<User> Create(User u)", "description": "creates a user", "complexityRating": 3, "estimatedMinutes": 15, "priority": "Medium"}
        ]
        "#
        .to_string()
    }

    #[tokio::test]
    async fn cancellation_before_any_stage_marks_pipeline_cancelled() {
        let (_dir, executor) = executor(vec![]);
        let project = Project::new("demo", "build a thing");
        let token = CancellationToken::new();
        token.cancel();

        let pipeline = executor.run(&project, token).await.unwrap();
        assert_eq!(pipeline.status, ExecutionStatus::Cancelled);
        assert_eq!(pipeline.stage, Stage::Planning);
    }

    /// A `Generate` double that cancels a shared token as soon as its responses run
    /// out, so the pipeline observes cancellation right after the Designing stage's
    /// own generate calls are done but before the Swarming stage starts.
    struct CancelOnExhaustion {
        responses: std::sync::Mutex<Vec<coordination::llm::LlmResponse>>,
        token: CancellationToken,
    }

    #[async_trait::async_trait]
    impl Generate for CancelOnExhaustion {
        async fn generate(&self, _request: coordination::llm::GenerateRequest) -> coordination::llm::LlmResponse {
            let mut responses = self.responses.lock().unwrap();
            if responses.len() > 1 {
                responses.remove(0)
            } else {
                self.token.cancel();
                responses.last().cloned().unwrap()
            }
        }
    }

    #[tokio::test]
    async fn cancellation_after_designing_stops_swarming_reemission() {
        let dir = tempfile::tempdir().unwrap();
        let store = StateStore::open(dir.path().join("pipeline.db")).unwrap().shared();
        let registry = Arc::new(CrossReferenceRegistry::with_stubs(store.clone()));
        let bus = MessageBus::with_store(store.clone()).shared();
        let policy = Arc::new(SwarmPolicy::new(SwarmPolicyConfig::default()));
        let token = CancellationToken::new();
        let generate: Arc<dyn Generate> = Arc::new(CancelOnExhaustion {
            responses: std::sync::Mutex::new(vec![
                crate::test_support::ok_response("Plan: build the thing."), // Planning
                crate::test_support::ok_response(designer_markdown()),      // Designing agent call
                crate::test_support::ok_response(designer_markdown()),      // Designing->C4 extraction call
            ]),
            token: token.clone(),
        });
        let staging = dir.path().join("staging");
        let executor = PipelineExecutor::new(generate, registry, store, bus.clone(), policy, staging);

        let project = Project::new("demo", "build a thing").with_target_language("C#");
        let pipeline = executor.run(&project, token).await.unwrap();

        assert_eq!(pipeline.status, ExecutionStatus::Cancelled);
        assert_eq!(pipeline.stage, Stage::Swarming);
        // Designing's own C4 emission fired before cancellation was observed; Swarming
        // never ran, so there is no second (re-emitted) assignment on the queue.
        assert_eq!(bus.queue_len(CODEUNIT_ASSIGNMENTS_QUEUE).unwrap(), 1);
    }

    #[tokio::test]
    async fn swarming_stage_observes_cancellation_per_group_not_just_between_stages() {
        // Two units already persisted (as if Designing had already run). A token
        // cancelled before the stage starts must stop dispatch at the first group
        // instead of emitting for every unit, proving the check lives inside the loop.
        let (_dir, executor) = executor(vec![]);
        let project_id = Uuid::new_v4();
        let pipeline = PipelineExecution::new(project_id, "snapshot".to_string());
        let pipeline_id = pipeline.id;

        for name in ["UserService", "OrderService"] {
            let spec = FunctionSpecification {
                id: Uuid::new_v4(),
                cross_ref_id: Uuid::new_v4(),
                project_id,
                pipeline_id,
                code_unit: name.to_string(),
                function_name: "Create".to_string(),
                signature: "public Task<User> Create(User u)".to_string(),
                description: "creates a thing".to_string(),
                business_logic: None,
                validation_rules: None,
                error_handling: None,
                complexity_rating: 3,
                estimated_minutes: Some(10),
                priority: Priority::Medium,
                language: "C#".to_string(),
                status: coordination::FunctionSpecStatus::Pending,
            };
            executor.store.put_function_spec(&spec).unwrap();

            let unit = CodeUnit {
                id: Uuid::new_v4(),
                cross_ref_id: Uuid::new_v4(),
                project_id,
                pipeline_id,
                designer_output_id: Uuid::new_v4(),
                name: name.to_string(),
                unit_type: coordination::UnitType::Service,
                namespace: None,
                language: "C#".to_string(),
                file_path: format!("/Services/{name}.cs"),
                function_count: 1,
                simple_function_count: 1,
                complex_function_count: 0,
                complexity: 3,
                status: coordination::CodeUnitStatus::Planned,
                completion_pct: 0.0,
                priority: Priority::Medium,
                estimated_minutes: 10,
            };
            executor.store.put_code_unit(&unit).unwrap();
        }

        let mut stage_exec = StageExecution::new(pipeline.id, Stage::Swarming);
        let project = Project::new("demo", "build a thing").with_target_language("C#");
        let token = CancellationToken::new();
        token.cancel();

        executor
            .run_swarming_stage(&project, &pipeline, &mut stage_exec, &token)
            .await
            .unwrap();

        assert_eq!(stage_exec.items_completed, 0);
        assert_eq!(executor.bus.queue_len(CODEUNIT_ASSIGNMENTS_QUEUE).unwrap(), 0);
    }

    #[tokio::test]
    async fn full_run_advances_through_every_stage_and_completes() {
        let responses = vec![
            crate::test_support::ok_response("Plan: build the thing."), // Planning
            crate::test_support::ok_response(designer_markdown()),      // Designing agent call
            crate::test_support::ok_response(designer_markdown()),      // Designing->C4 extraction call
            crate::test_support::ok_response("Looks good."),            // Validating
        ];
        let (_dir, executor) = executor(responses);
        let project = Project::new("demo", "build a thing").with_target_language("C#");
        let token = CancellationToken::new();

        let pipeline = executor.run(&project, token).await.unwrap();
        assert_eq!(pipeline.status, ExecutionStatus::Completed);
        assert_eq!(pipeline.stage, Stage::Validating);

        let units = executor.store.get_code_units_for_pipeline(pipeline.id).unwrap();
        assert_eq!(units.len(), 1);
    }
}
