//! Java build-tool shelling (§6 build-tool table): `javac *.java`.

use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;
use uuid::Uuid;

use super::error::BuildToolResult;
use super::CommandOutput;
use coordination::controller::BuilderError;

/// `file.java:line: error: msg`.
static PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?P<file>[^\s:]+\.java):(?P<line>\d+): (?P<level>error|warning): (?P<message>.+)").unwrap());

pub async fn run(project_dir: &Path) -> BuildToolResult<CommandOutput> {
    super::run_command_shell(project_dir, "javac *.java").await
}

pub fn parse_errors(project_id: Uuid, code_unit_name: &str, combined_output: &str) -> Vec<BuilderError> {
    let mut errors = Vec::new();
    for line in combined_output.lines() {
        let Some(captures) = PATTERN.captures(line) else { continue };
        let severity = if &captures["level"] == "error" { 8 } else { 4 };
        errors.push(BuilderError {
            error_id: Uuid::new_v4(),
            project_id,
            code_unit_name: code_unit_name.to_string(),
            function_name: None,
            function_signature: None,
            error_type: "JavacError".to_string(),
            error_message: captures["message"].to_string(),
            details: None,
            stack_trace: None,
            file_name: Some(captures["file"].to_string()),
            line_number: captures["line"].parse().ok(),
            severity,
            suggested_fix: None,
            related_functions: Vec::new(),
        });
    }
    errors
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_javac_error_line() {
        let output = "UserService.java:42: error: cannot find symbol";
        let errors = parse_errors(Uuid::new_v4(), "UserService", output);
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].line_number, Some(42));
        assert_eq!(errors[0].severity, 8);
    }
}
