//! Build-tool shelling for the Building stage (§4.7, §6 "Build-tool shelling table"):
//! one module per target language, each invoking the real toolchain and turning its
//! output into `BuilderError` records via a language-specific regex.

mod dotnet;
mod error;
mod java;
mod python;
mod typescript;

pub use error::{BuildToolError, BuildToolResult};

use std::path::Path;
use std::process::Stdio;

use tokio::process::Command;
use uuid::Uuid;

use coordination::controller::BuilderError;

pub struct CommandOutput {
    pub success: bool,
    pub combined: String,
}

pub struct BuildOutcome {
    pub success: bool,
    pub raw_output: String,
    pub errors: Vec<BuilderError>,
}

/// Runs the toolchain for `target_language` against `project_dir` and classifies its
/// output into `BuilderError` records (§6). Unknown languages are rejected up front.
pub async fn run_build(
    target_language: &str,
    project_dir: &Path,
    project_id: Uuid,
    code_unit_name: &str,
) -> BuildToolResult<BuildOutcome> {
    let (output, errors) = match target_language {
        "C#" => {
            let output = dotnet::run(project_dir).await?;
            let errors = dotnet::parse_errors(project_id, code_unit_name, &output.combined);
            (output, errors)
        }
        "TypeScript" => {
            let output = typescript::run(project_dir).await?;
            let errors = typescript::parse_errors(project_id, code_unit_name, &output.combined);
            (output, errors)
        }
        "Python" => {
            let output = python::run(project_dir).await?;
            let errors = python::parse_errors(project_id, code_unit_name, &output.combined);
            (output, errors)
        }
        "Java" => {
            let output = java::run(project_dir).await?;
            let errors = java::parse_errors(project_id, code_unit_name, &output.combined);
            (output, errors)
        }
        other => return Err(BuildToolError::UnsupportedLanguage(other.to_string())),
    };

    let high_severity = errors.iter().any(|e| e.severity >= 8);
    Ok(BuildOutcome {
        success: output.success && !high_severity,
        raw_output: output.combined,
        errors,
    })
}

async fn run_command(project_dir: &Path, program: &str, args: &[&str]) -> BuildToolResult<CommandOutput> {
    let output = Command::new(program)
        .args(args)
        .current_dir(project_dir)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .await?;
    let combined = format!(
        "{}\n{}",
        String::from_utf8_lossy(&output.stdout),
        String::from_utf8_lossy(&output.stderr)
    );
    Ok(CommandOutput { success: output.status.success(), combined })
}

/// Some toolchain invocations rely on shell globbing (`*.java`, `*.py`); those run
/// through `sh -c` rather than a direct argv, matching how the table in §6 writes them.
async fn run_command_shell(project_dir: &Path, command_line: &str) -> BuildToolResult<CommandOutput> {
    let output = Command::new("sh")
        .arg("-c")
        .arg(command_line)
        .current_dir(project_dir)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .await?;
    let combined = format!(
        "{}\n{}",
        String::from_utf8_lossy(&output.stdout),
        String::from_utf8_lossy(&output.stderr)
    );
    Ok(CommandOutput { success: output.status.success(), combined })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn unsupported_language_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let err = run_build("Ruby", dir.path(), Uuid::new_v4(), "Widget").await.unwrap_err();
        assert!(matches!(err, BuildToolError::UnsupportedLanguage(_)));
    }
}
