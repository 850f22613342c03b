//! The per-stage agent registry (§4.7, §9 "dynamic dispatch by agent type" design
//! note): a compile-time table of `agentType -> prompt-building fns`, not reflection.

use coordination::Project;

#[derive(Clone, Copy)]
pub struct AgentSpec {
    pub agent_type: &'static str,
    pub preamble: fn(&Project) -> String,
    pub instruction: fn(&Project) -> String,
}

pub struct AgentRegistry {
    pub planning: Vec<AgentSpec>,
    pub designing: Vec<AgentSpec>,
    pub validating: Vec<AgentSpec>,
}

impl Default for AgentRegistry {
    fn default() -> Self {
        Self {
            planning: vec![AgentSpec {
                agent_type: "Architect",
                preamble: architect_preamble,
                instruction: architect_instruction,
            }],
            designing: vec![AgentSpec {
                agent_type: "Designer",
                preamble: designer_preamble,
                instruction: designer_instruction,
            }],
            validating: vec![AgentSpec {
                agent_type: "QualityAssurance",
                preamble: qa_preamble,
                instruction: qa_instruction,
            }],
        }
    }
}

fn architect_preamble(_project: &Project) -> String {
    "You are the planning architect for a software build pipeline. Produce a concise, \
     ordered implementation plan; do not write code."
        .to_string()
}

fn architect_instruction(project: &Project) -> String {
    format!(
        "Project: {}\nRequirements:\n{}\n\nProduce the implementation plan.",
        project.name, project.requirements
    )
}

fn designer_preamble(_project: &Project) -> String {
    "You design function-level specifications for a software project from its brief \
     and implementation plan. Organize functions into named code units (services, \
     controllers, repositories, etc.)."
        .to_string()
}

fn designer_instruction(project: &Project) -> String {
    let language = project.target_language.as_deref().unwrap_or("C#");
    format!(
        "Project: {}\nTarget language: {language}\nRequirements:\n{}\n\nDesign the code \
         units and their functions.",
        project.name, project.requirements
    )
}

fn qa_preamble(_project: &Project) -> String {
    "You review generated code for correctness, completeness against the brief, and \
     obvious defects. Report findings; do not rewrite the code."
        .to_string()
}

fn qa_instruction(project: &Project) -> String {
    format!(
        "Review the implementation produced for project '{}' against its requirements \
         and report validation results.",
        project.name
    )
}
