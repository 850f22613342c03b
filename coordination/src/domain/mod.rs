//! Data model entities shared by every component (§3 of the specification).
//!
//! Every entity holds only the ids of the rows it relates to (`project_id: Uuid`, not
//! an embedded `Project`) and is resolved on demand through the [`crate::state::StateStore`].
//! There are no in-memory object-graph cycles.

mod codeunit;
mod document;
mod pipeline;
mod project;
mod queue;
mod xref;

pub use codeunit::{
    CodeUnit, CodeUnitStatus, DesignerOutput, DesignerOutputStatus, FunctionSpecification,
    FunctionSpecStatus, UnitType,
};
pub use document::CodeDocument;
pub use pipeline::{AgentExecution, ExecutionStatus, PipelineExecution, Stage, StageExecution};
pub use project::{Project, ProjectStatus};
pub use queue::QueueItem;
pub use xref::{CrossReference, CrossRefStatus};

use serde::{Deserialize, Serialize};
use std::fmt;

/// Priority band shared by `FunctionSpecification`, `CodeUnit` and queue messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum Priority {
    Low,
    Medium,
    High,
    Critical,
}

impl Priority {
    /// The numeric assignment priority used when emitting a `CodeUnitAssignment`
    /// (§4.4 step 5: `High->8, Medium->5, Low->2, Critical->10`).
    pub fn assignment_priority(self) -> u8 {
        match self {
            Priority::Low => 2,
            Priority::Medium => 5,
            Priority::High => 8,
            Priority::Critical => 10,
        }
    }

    /// The urgency boost applied by `CalculatePriority` (§4.5):
    /// `Critical -> +2+U, High -> +U, Normal -> 0, Low -> -2`.
    pub fn urgency_boost(self, u: i32) -> i32 {
        match self {
            Priority::Critical => 2 + u,
            Priority::High => u,
            Priority::Medium => 0,
            Priority::Low => -2,
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Priority::Low => "Low",
            Priority::Medium => "Medium",
            Priority::High => "High",
            Priority::Critical => "Critical",
        };
        f.write_str(s)
    }
}

impl std::cmp::PartialOrd<Priority> for &Priority {
    fn partial_cmp(&self, other: &Priority) -> Option<std::cmp::Ordering> {
        Some((*self).cmp(other))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn assignment_priority_matches_table() {
        assert_eq!(Priority::Critical.assignment_priority(), 10);
        assert_eq!(Priority::High.assignment_priority(), 8);
        assert_eq!(Priority::Medium.assignment_priority(), 5);
        assert_eq!(Priority::Low.assignment_priority(), 2);
    }

    #[test]
    fn urgency_boost_matches_table() {
        assert_eq!(Priority::Critical.urgency_boost(1), 3);
        assert_eq!(Priority::High.urgency_boost(1), 1);
        assert_eq!(Priority::Medium.urgency_boost(1), 0);
        assert_eq!(Priority::Low.urgency_boost(1), -2);
    }
}
