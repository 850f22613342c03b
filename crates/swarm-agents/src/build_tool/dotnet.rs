//! C# build-tool shelling (§6 build-tool table): `dotnet build`.

use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;
use uuid::Uuid;

use super::error::BuildToolResult;
use super::CommandOutput;
use coordination::controller::BuilderError;

/// `file.cs(line,col): error CSxxxx: msg` (also matches `warning CSxxxx`).
static PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?P<file>[^\s()]+\.cs)\((?P<line>\d+),(?P<col>\d+)\): (?P<level>error|warning) (?P<code>CS\d+): (?P<message>.+)").unwrap()
});

pub async fn run(project_dir: &Path) -> BuildToolResult<CommandOutput> {
    super::run_command(project_dir, "dotnet", &["build"]).await
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
    fn parses_error_and_warning_lines() {
        let output = "Foo/Bar.cs(12,5): error CS0103: The name 'x' does not exist\nFoo/Baz.cs(4,1): warning CS0168: unused variable";
        let errors = parse_errors(Uuid::new_v4(), "Bar", output);
        assert_eq!(errors.len(), 2);
        assert_eq!(errors[0].severity, 8);
        assert_eq!(errors[0].line_number, Some(12));
        assert_eq!(errors[1].severity, 4);
    }
}
