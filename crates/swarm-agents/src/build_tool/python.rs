//! Python build-tool shelling (§6 build-tool table): `python -m py_compile *.py`.

use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;
use uuid::Uuid;

use super::error::BuildToolResult;
use super::CommandOutput;
use coordination::controller::BuilderError;

/// `File "path.py", line N` preceding a `SyntaxError`/`IndentationError` line.
static LOCATION: LazyLock<Regex> = LazyLock::new(|| Regex::new(r#"File "(?P<file>[^"]+)", line (?P<line>\d+)"#).unwrap());

pub async fn run(project_dir: &Path) -> BuildToolResult<CommandOutput> {
    super::run_command_shell(project_dir, "python -m py_compile *.py").await
}

/// Any line containing `SyntaxError` or `IndentationError` is a build error at
/// severity 8 (§6); the preceding `File "...", line N` line supplies location, if any.
pub fn parse_errors(project_id: Uuid, code_unit_name: &str, combined_output: &str) -> Vec<BuilderError> {
    let mut errors = Vec::new();
    let lines: Vec<&str> = combined_output.lines().collect();
    for (idx, line) in lines.iter().enumerate() {
        if !line.contains("SyntaxError") && !line.contains("IndentationError") {
            continue;
        }
        let location = idx.checked_sub(1).and_then(|prev| LOCATION.captures(lines[prev]));
        errors.push(BuilderError {
            error_id: Uuid::new_v4(),
            project_id,
            code_unit_name: code_unit_name.to_string(),
            function_name: None,
            function_signature: None,
            error_type: "PythonSyntaxError".to_string(),
            error_message: line.to_string(),
            details: None,
            stack_trace: None,
            file_name: location.as_ref().map(|c| c["file"].to_string()),
            line_number: location.as_ref().and_then(|c| c["line"].parse().ok()),
            severity: 8,
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
    fn parses_syntax_error_with_preceding_location() {
        let output = "  File \"widget.py\", line 10\nSyntaxError: invalid syntax";
        let errors = parse_errors(Uuid::new_v4(), "widget", output);
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].file_name.as_deref(), Some("widget.py"));
        assert_eq!(errors[0].line_number, Some(10));
    }

    #[test]
    fn parses_indentation_error_without_location() {
        let output = "IndentationError: unexpected indent";
        let errors = parse_errors(Uuid::new_v4(), "widget", output);
        assert_eq!(errors.len(), 1);
        assert!(errors[0].file_name.is_none());
    }
}
