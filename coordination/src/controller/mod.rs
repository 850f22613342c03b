//! The Code-Unit Controller (C6, §4.6) — "the hardest subsystem". Consumes one
//! `CodeUnitAssignment` at a time, fans its function entries out to method workers
//! bounded by a semaphore, counts completions in a single mutex-guarded map, and
//! publishes exactly one `BuilderNotification` per code unit when its count drains
//! to zero.

mod error;
mod packet;

pub use error::{ControllerError, ControllerResult};
pub use packet::{
    calculate_packet_priority, extract_access_modifier, extract_return_type, extract_signature,
    BuilderError, BuilderNotification, BuilderStatus, CodeUnitAssignment, ExtractedSignature,
    FunctionAssignment, MethodJobPacket,
};

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{error, warn};
use uuid::Uuid;

use crate::bus::SharedMessageBus;
use crate::domain::{CodeDocument, Priority};
use crate::policy::SwarmPolicy;
use crate::state::SharedStateStore;

pub const CODEUNIT_ASSIGNMENTS_QUEUE: &str = "swarm.codeunit.assignments";
pub const BUILDER_NOTIFICATIONS_QUEUE: &str = "builder.notifications";
pub const BUILDER_ERRORS_QUEUE: &str = "builder.errors";

/// A concrete method worker (§6 external interface): an LLM-backed generator that
/// turns one [`MethodJobPacket`] into implementation source. `swarm-agents` provides
/// the real, gateway-backed implementation; this crate only defines the contract so
/// `coordination` stays free of any LLM client dependency.
#[async_trait]
pub trait MethodWorker: Send + Sync {
    async fn execute(&self, packet: &MethodJobPacket) -> Result<String, anyhow::Error>;
}

/// Key identifying one in-flight code-unit assignment: `(codeUnitId, unitName)` (§4.6
/// "State").
type ActiveKey = (Uuid, String);

pub struct CodeUnitController {
    active: Mutex<HashMap<ActiveKey, usize>>,
    /// Code units already drained to completion this process's lifetime (§4.6 step 2:
    /// at-least-once delivery can redeliver an assignment whose first delivery has
    /// already finished, not only one still in flight. The Designing-stage emission
    /// and the Swarming-stage re-emission of the same unit hit this every run, not
    /// just a crash-recovery edge case.
    completed: Mutex<std::collections::HashSet<ActiveKey>>,
    bus: SharedMessageBus,
    store: SharedStateStore,
    policy: Arc<SwarmPolicy>,
    worker: Arc<dyn MethodWorker>,
}

impl CodeUnitController {
    pub fn new(bus: SharedMessageBus, store: SharedStateStore, policy: Arc<SwarmPolicy>, worker: Arc<dyn MethodWorker>) -> Self {
        Self {
            active: Mutex::new(HashMap::new()),
            completed: Mutex::new(std::collections::HashSet::new()),
            bus,
            store,
            policy,
            worker,
        }
    }

    /// Number of code units currently being fanned out, for diagnostics/tests.
    pub fn in_flight_count(&self) -> usize {
        self.active.lock().expect("active map lock poisoned").len()
    }

    /// The per-assignment protocol of §4.6.
    pub async fn handle_assignment(&self, project_id: Uuid, assignment: CodeUnitAssignment) -> ControllerResult<()> {
        let key: ActiveKey = (assignment.code_unit_id, assignment.name.clone());
        let n = assignment.functions.len();

        {
            let mut active = self.active.lock().expect("active map lock poisoned");
            let completed = self.completed.lock().expect("completed set lock poisoned");
            if active.contains_key(&key) || completed.contains(&key) {
                return Err(ControllerError::DuplicateAssignment(format!(
                    "{}/{}",
                    assignment.code_unit_id, assignment.name
                )));
            }
            if n > 0 {
                active.insert(key.clone(), n);
            }
        }

        if n == 0 {
            self.completed.lock().expect("completed set lock poisoned").insert(key);
            self.publish_notification(project_id, &assignment.name, BuilderStatus::Complete, assignment.priority.assignment_priority())
                .await?;
            return Ok(());
        }

        let max_concurrent = self
            .policy
            .config()
            .resource_limits
            .get("MethodAgent")
            .map(|limit| limit.max_concurrent as usize)
            .unwrap_or(n)
            .max(1);
        let semaphore = Arc::new(Semaphore::new(max_concurrent));

        let mut jobs = JoinSet::new();
        for function in assignment.functions.clone() {
            let packet = MethodJobPacket::new(project_id, assignment.name.clone(), function);
            let worker = Arc::clone(&self.worker);
            let permit_guard = Arc::clone(&semaphore);
            jobs.spawn(async move {
                let _permit = permit_guard.acquire_owned().await.expect("semaphore never closes");
                let outcome = worker.execute(&packet).await;
                (packet, outcome)
            });
        }

        while let Some(joined) = jobs.join_next().await {
            let (packet, outcome) = match joined {
                Ok(result) => result,
                Err(join_err) => {
                    warn!(code_unit = %assignment.name, error = %join_err, "method worker task panicked");
                    self.decrement_and_maybe_notify(project_id, key.clone(), &assignment).await?;
                    continue;
                }
            };

            match outcome {
                Ok(content) => {
                    let document = CodeDocument::new(project_id, &packet.code_unit_name, &packet.function.function_name, content);
                    self.store.put_code_document(&document)?;
                }
                Err(err) => {
                    let builder_error = BuilderError {
                        error_id: Uuid::new_v4(),
                        project_id,
                        code_unit_name: assignment.name.clone(),
                        function_name: Some(packet.function.function_name.clone()),
                        function_signature: Some(packet.function.signature.clone()),
                        error_type: "FunctionProcessingError".to_string(),
                        error_message: err.to_string(),
                        details: None,
                        stack_trace: None,
                        file_name: None,
                        line_number: None,
                        severity: 6,
                        suggested_fix: None,
                        related_functions: Vec::new(),
                    };
                    self.publish_error(builder_error, 8).await?;
                }
            }

            self.decrement_and_maybe_notify(project_id, key.clone(), &assignment).await?;
        }

        Ok(())
    }

    /// A whole-assignment failure before fan-out began (§4.6 "Failure semantics").
    pub async fn report_assignment_failure(
        &self,
        project_id: Uuid,
        code_unit_name: &str,
        message: impl Into<String>,
    ) -> ControllerResult<()> {
        let builder_error = BuilderError {
            error_id: Uuid::new_v4(),
            project_id,
            code_unit_name: code_unit_name.to_string(),
            function_name: None,
            function_signature: None,
            error_type: "ProcessingError".to_string(),
            error_message: message.into(),
            details: None,
            stack_trace: None,
            file_name: None,
            line_number: None,
            severity: 8,
            suggested_fix: None,
            related_functions: Vec::new(),
        };
        self.publish_error(builder_error, 8).await
    }

    async fn decrement_and_maybe_notify(
        &self,
        project_id: Uuid,
        key: ActiveKey,
        assignment: &CodeUnitAssignment,
    ) -> ControllerResult<()> {
        let drained = {
            let mut active = self.active.lock().expect("active map lock poisoned");
            match active.get_mut(&key) {
                Some(remaining) => {
                    *remaining = remaining.saturating_sub(1);
                    if *remaining == 0 {
                        active.remove(&key);
                        true
                    } else {
                        false
                    }
                }
                None => {
                    error!(code_unit = %key.1, "decrement on an assignment with no active entry");
                    false
                }
            }
        };

        if drained {
            self.completed.lock().expect("completed set lock poisoned").insert(key);
            self.publish_notification(project_id, &assignment.name, BuilderStatus::Complete, assignment.priority.assignment_priority())
                .await?;
        }
        Ok(())
    }

    async fn publish_notification(
        &self,
        project_id: Uuid,
        code_unit_name: &str,
        status: BuilderStatus,
        priority: u8,
    ) -> ControllerResult<()> {
        let notification = BuilderNotification {
            notification_id: Uuid::new_v4(),
            project_id,
            code_unit_name: code_unit_name.to_string(),
            status,
            completed_at: Utc::now(),
            priority,
        };
        self.bus.send_priority(BUILDER_NOTIFICATIONS_QUEUE, &notification, priority, None)?;
        Ok(())
    }

    async fn publish_error(&self, builder_error: BuilderError, priority: u8) -> ControllerResult<()> {
        self.bus.send_priority(BUILDER_ERRORS_QUEUE, &builder_error, priority, None)?;
        Ok(())
    }
}
