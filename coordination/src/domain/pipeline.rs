use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// The fixed stage order: `Planning -> Designing -> Swarming -> Building -> Validating`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum Stage {
    Planning,
    Designing,
    Swarming,
    Building,
    Validating,
}

impl Stage {
    pub const ORDER: [Stage; 5] = [
        Stage::Planning,
        Stage::Designing,
        Stage::Swarming,
        Stage::Building,
        Stage::Validating,
    ];

    /// The next stage in the fixed order, or `None` after `Validating`.
    pub fn next(self) -> Option<Stage> {
        let idx = Self::ORDER.iter().position(|s| *s == self)?;
        Self::ORDER.get(idx + 1).copied()
    }

    pub fn order_index(self) -> usize {
        Self::ORDER.iter().position(|s| *s == self).unwrap_or(0)
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Stage::Planning => "Planning",
            Stage::Designing => "Designing",
            Stage::Swarming => "Swarming",
            Stage::Building => "Building",
            Stage::Validating => "Validating",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum ExecutionStatus {
    Pending,
    Running,
    Completed,
    Cancelled,
    Failed,
}

impl ExecutionStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            ExecutionStatus::Completed | ExecutionStatus::Cancelled | ExecutionStatus::Failed
        )
    }
}

/// One project's run through the five-stage pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineExecution {
    pub id: Uuid,
    pub project_id: Uuid,
    pub stage: Stage,
    pub status: ExecutionStatus,
    pub started_at: DateTime<Utc>,
    pub stage_started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub progress_pct: f64,
    pub total_functions: u32,
    pub completed_functions: u32,
    pub failed_functions: u32,
    pub error_message: Option<String>,
    /// Debug-formatted snapshot of the `SwarmPolicyConfig` active when this execution
    /// was created, so a re-run can be audited against the config that produced it.
    pub config_snapshot: String,
}

impl PipelineExecution {
    pub fn new(project_id: Uuid, config_snapshot: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            project_id,
            stage: Stage::Planning,
            status: ExecutionStatus::Pending,
            started_at: now,
            stage_started_at: now,
            completed_at: None,
            progress_pct: 0.0,
            total_functions: 0,
            completed_functions: 0,
            failed_functions: 0,
            error_message: None,
            config_snapshot: config_snapshot.into(),
        }
    }

    /// Transition to the next stage in the fixed order. Updates `stage_started_at`.
    /// Returns `false` (no-op) if there is no next stage.
    pub fn advance(&mut self) -> bool {
        match self.stage.next() {
            Some(next) => {
                self.stage = next;
                self.stage_started_at = Utc::now();
                true
            }
            None => false,
        }
    }

    pub fn mark_running(&mut self) {
        self.status = ExecutionStatus::Running;
    }

    pub fn mark_completed(&mut self) {
        self.status = ExecutionStatus::Completed;
        self.completed_at = Some(Utc::now());
    }

    pub fn mark_cancelled(&mut self) {
        self.status = ExecutionStatus::Cancelled;
        self.completed_at = Some(Utc::now());
    }

    pub fn mark_failed(&mut self, error_message: impl Into<String>) {
        self.status = ExecutionStatus::Failed;
        self.error_message = Some(error_message.into());
        self.completed_at = Some(Utc::now());
    }

    /// Record one function outcome and recompute `progress_pct` (§3 invariant:
    /// `progressPct = 100 * (completed+failed) / total` when `total > 0`).
    pub fn record_function_outcome(&mut self, succeeded: bool) {
        if succeeded {
            self.completed_functions += 1;
        } else {
            self.failed_functions += 1;
        }
        self.recompute_progress();
    }

    pub fn set_total_functions(&mut self, total: u32) {
        self.total_functions = total;
        self.recompute_progress();
    }

    fn recompute_progress(&mut self) {
        if self.total_functions == 0 {
            self.progress_pct = 0.0;
            return;
        }
        let done = (self.completed_functions + self.failed_functions) as f64;
        self.progress_pct = 100.0 * done / self.total_functions as f64;
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageExecution {
    pub id: Uuid,
    pub pipeline_id: Uuid,
    pub stage_name: Stage,
    pub order: u32,
    pub status: ExecutionStatus,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub items_completed: u32,
    pub items_failed: u32,
}

impl StageExecution {
    pub fn new(pipeline_id: Uuid, stage_name: Stage) -> Self {
        Self {
            id: Uuid::new_v4(),
            pipeline_id,
            order: stage_name.order_index() as u32,
            stage_name,
            status: ExecutionStatus::Running,
            started_at: Utc::now(),
            completed_at: None,
            items_completed: 0,
            items_failed: 0,
        }
    }

    pub fn complete(&mut self) {
        self.status = ExecutionStatus::Completed;
        self.completed_at = Some(Utc::now());
    }

    pub fn fail(&mut self) {
        self.status = ExecutionStatus::Failed;
        self.completed_at = Some(Utc::now());
    }
}

/// One invocation of an LLM-backed agent within a stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentExecution {
    pub id: Uuid,
    pub project_id: Uuid,
    pub pipeline_id: Uuid,
    pub stage_id: Uuid,
    pub agent_type: String,
    pub status: ExecutionStatus,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub input_prompt: String,
    pub output_response: Option<String>,
    pub tokens_in: u32,
    pub tokens_out: u32,
    pub cost: f64,
    pub quality_score: Option<f64>,
    pub confidence_score: Option<f64>,
    pub error_message: Option<String>,
}

impl AgentExecution {
    pub fn new(
        project_id: Uuid,
        pipeline_id: Uuid,
        stage_id: Uuid,
        agent_type: impl Into<String>,
        input_prompt: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            project_id,
            pipeline_id,
            stage_id,
            agent_type: agent_type.into(),
            status: ExecutionStatus::Running,
            started_at: Utc::now(),
            completed_at: None,
            input_prompt: input_prompt.into(),
            output_response: None,
            tokens_in: 0,
            tokens_out: 0,
            cost: 0.0,
            quality_score: None,
            confidence_score: None,
            error_message: None,
        }
    }

    pub fn complete(&mut self, response: impl Into<String>, tokens_in: u32, tokens_out: u32, cost: f64) {
        self.output_response = Some(response.into());
        self.tokens_in = tokens_in;
        self.tokens_out = tokens_out;
        self.cost = cost;
        self.status = ExecutionStatus::Completed;
        self.completed_at = Some(Utc::now());
    }

    pub fn fail(&mut self, error_message: impl Into<String>) {
        self.error_message = Some(error_message.into());
        self.status = ExecutionStatus::Failed;
        self.completed_at = Some(Utc::now());
    }
}
