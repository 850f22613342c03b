//! Stage-driving and LLM-facing pieces of the Maestro orchestrator: the gateway that
//! talks to the model, the parser that turns Designer output into durable rows, the
//! pipeline executor that drives a run stage by stage, the build-tool shelling, and
//! the supervisor that dispatches code-unit assignments to the controller.

pub mod build_tool;
pub mod designer;
pub mod gateway;
pub mod pipeline;
pub mod supervisor;

#[cfg(test)]
pub(crate) mod test_support;

pub use designer::{DesignerError, DesignerOutputParser};
pub use gateway::{GatewayMethodWorker, LlmGateway};
pub use pipeline::{AgentRegistry, PipelineError, PipelineExecutor};
pub use supervisor::Supervisor;
