//! CLI entrypoint (§6): `maestro run <brief-file>` drives one project through the
//! five-stage pipeline against a concrete `StateStore`/`MessageBus`/`LlmGateway`, with
//! the Orchestrator Supervisor (C8) running alongside to dispatch code-unit assignments
//! as the Designing/Swarming stages emit them. The HTTP/UI surface named in the wire
//! spec is out of scope for implementation (§1); this CLI exercises the in-scope core
//! directly for local/manual testing.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use coordination::controller::CodeUnitController;
use coordination::{CrossReferenceRegistry, MessageBus, Project, StateStore, SwarmPolicy, SwarmPolicyConfig};
use swarm_agents::{GatewayMethodWorker, LlmGateway, PipelineExecutor, Supervisor};

#[derive(Parser)]
#[command(name = "maestro", about = "Drives one project brief through the Maestro pipeline")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run a project brief through Planning -> Designing -> Swarming -> Building -> Validating.
    Run {
        /// Path to a text file containing the project's natural-language requirements.
        brief_file: PathBuf,
        /// Target language for generated code (default "C#").
        #[arg(long, default_value = "C#")]
        target_language: String,
        /// Project name (default: the brief file's stem).
        #[arg(long)]
        name: Option<String>,
    },
}

fn env_var(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_env_filter(EnvFilter::from_default_env()).init();

    let cli = Cli::parse();
    match cli.command {
        Command::Run { brief_file, target_language, name } => run(brief_file, target_language, name).await,
    }
}

async fn run(brief_file: PathBuf, target_language: String, name: Option<String>) -> anyhow::Result<()> {
    let requirements = std::fs::read_to_string(&brief_file)
        .map_err(|e| anyhow::anyhow!("failed to read brief file {}: {e}", brief_file.display()))?;
    let project_name = name.unwrap_or_else(|| {
        brief_file
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| "maestro-project".to_string())
    });
    let project = Project::new(project_name, requirements).with_target_language(target_language);

    let db_path = env_var("MAESTRO_DB_PATH", "./maestro-data");
    let artifact_dir = env_var("MAESTRO_ARTIFACT_DIR", "./maestro-artifacts");
    let staging_dir = env_var("MAESTRO_STAGING_DIR", "./maestro-staging");
    let api_key = std::env::var("MAESTRO_API_KEY").unwrap_or_default();
    let base_url = env_var("MAESTRO_BASE_URL", "https://api.openai.com/v1");
    let model = env_var("MAESTRO_MODEL", "gpt-4o-mini");

    let store = StateStore::open(&db_path)?.shared();
    let bus = MessageBus::with_store(store.clone()).shared();
    let xref_registry = Arc::new(CrossReferenceRegistry::with_stubs(store.clone()));
    let policy = Arc::new(SwarmPolicy::new(SwarmPolicyConfig::default()));

    let gateway = LlmGateway::new(&api_key, &base_url, &model)?.with_artifact_dir(artifact_dir.clone());
    let generate: Arc<dyn coordination::llm::Generate> = Arc::new(gateway);

    let worker = Arc::new(GatewayMethodWorker::new(generate.clone()));
    let controller = Arc::new(CodeUnitController::new(bus.clone(), store.clone(), policy.clone(), worker));

    let shutdown = CancellationToken::new();
    let supervisor = Supervisor::new(controller.clone(), bus.clone());
    let supervisor_shutdown = shutdown.clone();
    let project_id = project.id;
    let supervisor_handle = tokio::spawn(async move { supervisor.run(project_id, supervisor_shutdown).await });

    let executor = PipelineExecutor::new(generate, xref_registry, store, bus, policy, staging_dir);

    let result = executor.run(&project, CancellationToken::new()).await;

    shutdown.cancel();
    let _ = supervisor_handle.await;

    match result {
        Ok(pipeline) => {
            info!(pipeline_id = %pipeline.id, status = ?pipeline.status, "pipeline finished");
            Ok(())
        }
        Err(err) => {
            error!(error = %err, "pipeline failed");
            Err(err.into())
        }
    }
}
