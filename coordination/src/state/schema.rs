//! Column-family names and key composition for the state store.
//!
//! A central naming module is the only place allowed to compose row keys, mirroring
//! the rule the specification lays down for the message bus (§4.1): sender/consumer
//! key-naming mismatch is a bug class that should be ruled out by construction.

pub const CF_PROJECTS: &str = "projects";
pub const CF_PIPELINES: &str = "pipelines";
pub const CF_STAGE_EXECUTIONS: &str = "stage_executions";
pub const CF_AGENT_EXECUTIONS: &str = "agent_executions";
pub const CF_DESIGNER_OUTPUTS: &str = "designer_outputs";
pub const CF_FUNCTION_SPECS: &str = "function_specs";
pub const CF_CODE_UNITS: &str = "code_units";
pub const CF_CROSS_REFERENCES: &str = "cross_references";
pub const CF_CODE_DOCUMENTS: &str = "code_documents";
pub const CF_EVENTS: &str = "events";
/// Write-through snapshots for durable bus queues (§4.1 `enablePersistence`).
pub const CF_BUS_QUEUES: &str = "bus_queues";

pub const ALL_CFS: &[&str] = &[
    CF_PROJECTS,
    CF_PIPELINES,
    CF_STAGE_EXECUTIONS,
    CF_AGENT_EXECUTIONS,
    CF_DESIGNER_OUTPUTS,
    CF_FUNCTION_SPECS,
    CF_CODE_UNITS,
    CF_CROSS_REFERENCES,
    CF_CODE_DOCUMENTS,
    CF_EVENTS,
    CF_BUS_QUEUES,
];

pub mod keys {
    use uuid::Uuid;

    pub fn project(id: Uuid) -> String {
        format!("project:{id}")
    }

    pub fn pipeline(id: Uuid) -> String {
        format!("pipeline:{id}")
    }

    pub fn pipeline_prefix() -> &'static str {
        "pipeline:"
    }

    pub fn stage_execution(id: Uuid) -> String {
        format!("stage:{id}")
    }

    pub fn stage_execution_by_pipeline(pipeline_id: Uuid, id: Uuid) -> String {
        format!("stage:{pipeline_id}:{id}")
    }

    pub fn stage_execution_prefix(pipeline_id: Uuid) -> String {
        format!("stage:{pipeline_id}:")
    }

    pub fn agent_execution(id: Uuid) -> String {
        format!("agent:{id}")
    }

    pub fn agent_execution_by_stage(stage_id: Uuid, id: Uuid) -> String {
        format!("agent:{stage_id}:{id}")
    }

    pub fn agent_execution_prefix(stage_id: Uuid) -> String {
        format!("agent:{stage_id}:")
    }

    pub fn designer_output(id: Uuid) -> String {
        format!("designer_output:{id}")
    }

    pub fn function_spec(id: Uuid) -> String {
        format!("function_spec:{id}")
    }

    pub fn function_spec_by_pipeline(pipeline_id: Uuid, code_unit: &str, id: Uuid) -> String {
        format!("function_spec:{pipeline_id}:{code_unit}:{id}")
    }

    pub fn function_spec_prefix(pipeline_id: Uuid) -> String {
        format!("function_spec:{pipeline_id}:")
    }

    pub fn function_spec_prefix_for_unit(pipeline_id: Uuid, code_unit: &str) -> String {
        format!("function_spec:{pipeline_id}:{code_unit}:")
    }

    pub fn code_unit(id: Uuid) -> String {
        format!("code_unit:{id}")
    }

    pub fn code_unit_by_pipeline(pipeline_id: Uuid, id: Uuid) -> String {
        format!("code_unit:{pipeline_id}:{id}")
    }

    pub fn code_unit_prefix(pipeline_id: Uuid) -> String {
        format!("code_unit:{pipeline_id}:")
    }

    pub fn cross_reference(primary_id: Uuid) -> String {
        format!("xref:{primary_id}")
    }

    pub fn code_document(id: Uuid) -> String {
        format!("code_document:{id}")
    }

    pub fn code_document_by_unit(project_id: Uuid, code_unit_name: &str, id: Uuid) -> String {
        format!("code_document:{project_id}:{code_unit_name}:{id}")
    }

    pub fn code_document_prefix_for_unit(project_id: Uuid, code_unit_name: &str) -> String {
        format!("code_document:{project_id}:{code_unit_name}:")
    }

    /// Zero-padded for lexicographic = chronological ordering, as the event log does.
    pub fn event(timestamp_nanos: i64, event_id: &str) -> String {
        format!("evt:{:020}:{}", timestamp_nanos, event_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn event_keys_sort_chronologically() {
        let k1 = keys::event(100, "a");
        let k2 = keys::event(200, "b");
        assert!(k1 < k2);
    }

    #[test]
    fn prefix_keys_are_prefixes_of_full_keys() {
        let pipeline_id = Uuid::new_v4();
        let id = Uuid::new_v4();
        let full = keys::code_unit_by_pipeline(pipeline_id, id);
        assert!(full.starts_with(&keys::code_unit_prefix(pipeline_id)));
    }
}
