//! TypeScript build-tool shelling (§6 build-tool table): `npm install && npx tsc`.

use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;
use uuid::Uuid;

use super::error::BuildToolResult;
use super::CommandOutput;
use coordination::controller::BuilderError;

/// `file.ts(line,col): error TSxxxx: msg`.
static PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?P<file>[^\s()]+\.tsx?)\((?P<line>\d+),(?P<col>\d+)\): (?P<level>error|warning) (?P<code>TS\d+): (?P<message>.+)").unwrap()
});

pub async fn run(project_dir: &Path) -> BuildToolResult<CommandOutput> {
    let install = super::run_command(project_dir, "npm", &["install"]).await?;
    if !install.success {
        return Ok(install);
    }
    super::run_command(project_dir, "npx", &["tsc"]).await
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
            error_type: captures["code"].to_string(),
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
    fn parses_typescript_compiler_errors() {
        let output = "src/index.ts(7,3): error TS2322: Type 'string' is not assignable to type 'number'.";
        let errors = parse_errors(Uuid::new_v4(), "Index", output);
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].error_type, "TS2322");
        assert_eq!(errors[0].severity, 8);
    }
}
