//! Orchestrator Supervisor (C8, §4.8): a background loop that pulls
//! `CodeUnitAssignment` messages off the durable queue and hands each to the
//! Code-Unit Controller, independent of whichever `PipelineExecutor` run produced it.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use uuid::Uuid;

use coordination::controller::{CodeUnitAssignment, CodeUnitController, CODEUNIT_ASSIGNMENTS_QUEUE};
use coordination::{bus, SharedMessageBus};

const POLL_TIMEOUT: Duration = Duration::from_millis(500);
const ERROR_BACKOFF: Duration = Duration::from_millis(100);

pub struct Supervisor {
    controller: Arc<CodeUnitController>,
    bus: SharedMessageBus,
}

impl Supervisor {
    pub fn new(controller: Arc<CodeUnitController>, bus: SharedMessageBus) -> Self {
        Self { controller, bus }
    }

    /// Runs until `shutdown` is cancelled. Each receive/dispatch round either drains
    /// one assignment or waits up to [`POLL_TIMEOUT`] for one to arrive; a malformed
    /// or undecodable message is logged and dropped rather than retried forever.
    pub async fn run(&self, project_id: Uuid, shutdown: CancellationToken) {
        info!("supervisor starting");
        loop {
            let received = tokio::select! {
                _ = shutdown.cancelled() => {
                    info!("supervisor shutting down");
                    return;
                }
                result = self.bus.receive(CODEUNIT_ASSIGNMENTS_QUEUE, Some(POLL_TIMEOUT)) => result,
            };

            let item = match received {
                Ok(Some(item)) => item,
                Ok(None) => continue,
                Err(err) => {
                    error!(error = %err, "failed to receive from assignment queue");
                    tokio::time::sleep(ERROR_BACKOFF).await;
                    continue;
                }
            };

            let assignment: CodeUnitAssignment = match bus::decode(&item) {
                Ok(assignment) => assignment,
                Err(err) => {
                    warn!(error = %err, "dropping undecodable codeunit assignment");
                    let _ = self.bus.acknowledge(CODEUNIT_ASSIGNMENTS_QUEUE, item.id);
                    continue;
                }
            };

            let code_unit_name = assignment.name.clone();
            match self.controller.handle_assignment(project_id, assignment).await {
                Ok(()) => {
                    let _ = self.bus.acknowledge(CODEUNIT_ASSIGNMENTS_QUEUE, item.id);
                }
                Err(err) => {
                    error!(code_unit = code_unit_name, error = %err, "controller failed to handle assignment");
                    let _ = self.bus.reject(CODEUNIT_ASSIGNMENTS_QUEUE, item.id, true);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use coordination::controller::{FunctionAssignment, MethodJobPacket, MethodWorker};
    use coordination::{MessageBus, Priority, StateStore, SwarmPolicy, SwarmPolicyConfig, UnitType};
    use chrono::Utc;

    struct EchoWorker;

    #[async_trait]
    impl MethodWorker for EchoWorker {
        async fn execute(&self, packet: &MethodJobPacket) -> Result<String, anyhow::Error> {
            Ok(format!("// {}", packet.function.function_name))
        }
    }

    fn assignment() -> CodeUnitAssignment {
        CodeUnitAssignment {
            assignment_id: Uuid::new_v4(),
            code_unit_id: Uuid::new_v4(),
            name: "UserService".to_string(),
            unit_type: UnitType::Service,
            namespace: None,
            description: None,
            functions: vec![FunctionAssignment {
                assignment_id: Uuid::new_v4(),
                function_specification_id: Uuid::new_v4(),
                function_name: "GetUser".to_string(),
                code_unit: "UserService".to_string(),
                signature: "public Task<User> GetUser(int id)".to_string(),
                description: "fetches a user".to_string(),
                business_logic: None,
                validation_rules: None,
                error_handling: None,
                security_considerations: None,
                test_cases: None,
                complexity_rating: 2,
                estimated_minutes: Some(5),
                priority: Priority::Medium,
                target_language: "C#".to_string(),
                assigned_at: Utc::now(),
                due_at: None,
            }],
            simple_function_count: 1,
            complex_function_count: 0,
            dependencies: None,
            patterns: None,
            testing_strategy: None,
            complexity_rating: 2,
            estimated_minutes: 5,
            priority: Priority::Medium,
            target_language: "C#".to_string(),
            assigned_at: Utc::now(),
            due_at: None,
        }
    }

    #[tokio::test]
    async fn drains_one_assignment_then_shuts_down_on_cancel() {
        let dir = tempfile::tempdir().unwrap();
        let store = StateStore::open(dir.path().join("supervisor.db")).unwrap().shared();
        let bus = MessageBus::with_store(store.clone()).shared();
        let policy = Arc::new(SwarmPolicy::new(SwarmPolicyConfig::default()));
        let controller = Arc::new(CodeUnitController::new(bus.clone(), store.clone(), policy, Arc::new(EchoWorker)));
        let project_id = Uuid::new_v4();

        bus.send_priority(CODEUNIT_ASSIGNMENTS_QUEUE, &assignment(), 5, None).unwrap();

        let supervisor = Supervisor::new(controller.clone(), bus.clone());
        let shutdown = CancellationToken::new();
        let shutdown_clone = shutdown.clone();

        let handle = tokio::spawn(async move { supervisor.run(project_id, shutdown_clone).await });
        tokio::time::sleep(Duration::from_millis(50)).await;
        shutdown.cancel();
        handle.await.unwrap();

        let docs = store.get_code_documents_for_unit(project_id, "UserService").unwrap();
        assert_eq!(docs.len(), 1);
    }
}
