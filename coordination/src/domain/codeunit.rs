use super::Priority;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Markdown artifact produced by one Designer agent, plus the parser's summary of it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DesignerOutput {
    pub id: Uuid,
    pub cross_ref_id: Uuid,
    pub project_id: Uuid,
    pub pipeline_id: Uuid,
    pub agent_type: String,
    pub markdown: String,
    pub structured_summary: String,
    pub function_spec_count: u32,
    pub complexity: u32,
    pub quality: f64,
    pub status: DesignerOutputStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum DesignerOutputStatus {
    Parsed,
    Empty,
}

/// One structured record describing a single function to implement.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionSpecification {
    pub id: Uuid,
    pub cross_ref_id: Uuid,
    pub project_id: Uuid,
    pub pipeline_id: Uuid,
    pub code_unit: String,
    pub function_name: String,
    pub signature: String,
    pub description: String,
    pub business_logic: Option<String>,
    pub validation_rules: Option<String>,
    pub error_handling: Option<String>,
    pub complexity_rating: u8,
    pub estimated_minutes: Option<u32>,
    pub priority: Priority,
    pub language: String,
    pub status: FunctionSpecStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum FunctionSpecStatus {
    Pending,
    Assigned,
    Complete,
    Failed,
}

/// A class/controller/service/etc. grouping related functions (§4.4 derives these by
/// grouping `FunctionSpecification`s by `codeUnit`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum UnitType {
    Service,
    Controller,
    Repository,
    Interface,
    Entity,
    Exception,
    Utility,
    Class,
}

impl UnitType {
    /// Infer from a lowercased code-unit name per the exact rule table in §4.4.
    pub fn infer(name: &str) -> UnitType {
        let lower = name.to_lowercase();
        let starts_with_interface_marker =
            name.starts_with('I') && name.chars().nth(1).is_some_and(|c| c.is_uppercase());
        if lower.contains("service") {
            UnitType::Service
        } else if lower.contains("controller") {
            UnitType::Controller
        } else if lower.contains("repository") {
            UnitType::Repository
        } else if starts_with_interface_marker {
            UnitType::Interface
        } else if lower.contains("model") || lower.contains("entity") {
            UnitType::Entity
        } else if lower.contains("exception") {
            UnitType::Exception
        } else if lower.contains("helper") || lower.contains("utility") {
            UnitType::Utility
        } else {
            UnitType::Class
        }
    }

    /// The folder a generated file of this unit type lives under (§4.4 `filePath`).
    pub fn folder(self) -> &'static str {
        match self {
            UnitType::Service => "Services",
            UnitType::Controller => "Controllers",
            UnitType::Repository => "Repositories",
            UnitType::Interface => "Interfaces",
            UnitType::Entity => "Models",
            UnitType::Exception => "Exceptions",
            UnitType::Utility => "Utilities",
            UnitType::Class => "Generated",
        }
    }
}

impl fmt::Display for UnitType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            UnitType::Service => "Service",
            UnitType::Controller => "Controller",
            UnitType::Repository => "Repository",
            UnitType::Interface => "Interface",
            UnitType::Entity => "Entity",
            UnitType::Exception => "Exception",
            UnitType::Utility => "Utility",
            UnitType::Class => "Class",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum CodeUnitStatus {
    Planned,
    Assigned,
    InProgress,
    Complete,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CodeUnit {
    pub id: Uuid,
    pub cross_ref_id: Uuid,
    pub project_id: Uuid,
    pub pipeline_id: Uuid,
    pub designer_output_id: Uuid,
    pub name: String,
    pub unit_type: UnitType,
    pub namespace: Option<String>,
    pub language: String,
    pub file_path: String,
    pub function_count: u32,
    pub simple_function_count: u32,
    pub complex_function_count: u32,
    pub complexity: u32,
    pub status: CodeUnitStatus,
    pub completion_pct: f64,
    pub priority: Priority,
    pub estimated_minutes: u32,
}

impl CodeUnit {
    /// `namespace` by target language (§4.4).
    pub fn default_namespace(language: &str) -> &'static str {
        match language {
            "C#" => "Ensemble.Maestro.Generated",
            "TypeScript" => "generated",
            "Python" => "generated",
            "Java" => "com.ensemble.maestro.generated",
            _ => "Generated",
        }
    }

    /// File extension by target language (§4.4), default `.cs`.
    pub fn extension(language: &str) -> &'static str {
        match language {
            "C#" => ".cs",
            "TypeScript" => ".ts",
            "Python" => ".py",
            "Java" => ".java",
            "JavaScript" => ".js",
            _ => ".cs",
        }
    }

    pub fn file_path(unit_type: UnitType, name: &str, language: &str) -> String {
        format!("/{}/{}{}", unit_type.folder(), name, Self::extension(language))
    }

    pub fn mark_complete(&mut self) {
        self.status = CodeUnitStatus::Complete;
        self.completion_pct = 100.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unit_type_inference_matches_table() {
        assert_eq!(UnitType::infer("UserService"), UnitType::Service);
        assert_eq!(UnitType::infer("UserController"), UnitType::Controller);
        assert_eq!(UnitType::infer("UserRepository"), UnitType::Repository);
        assert_eq!(UnitType::infer("IUserThing"), UnitType::Interface);
        assert_eq!(UnitType::infer("UserModel"), UnitType::Entity);
        assert_eq!(UnitType::infer("UserEntity"), UnitType::Entity);
        assert_eq!(UnitType::infer("NotFoundException"), UnitType::Exception);
        assert_eq!(UnitType::infer("StringHelper"), UnitType::Utility);
        assert_eq!(UnitType::infer("StringUtility"), UnitType::Utility);
        assert_eq!(UnitType::infer("Widget"), UnitType::Class);
    }

    #[test]
    fn interface_marker_requires_uppercase_second_char() {
        // "Item" starts with 'I' but the second char is lowercase, so it's not an interface.
        assert_eq!(UnitType::infer("Item"), UnitType::Class);
        assert_eq!(UnitType::infer("ILogger"), UnitType::Interface);
    }

    #[test]
    fn file_path_uses_folder_and_extension() {
        let path = CodeUnit::file_path(UnitType::Controller, "UserController", "C#");
        assert_eq!(path, "/Controllers/UserController.cs");
    }

    #[test]
    fn namespace_defaults_by_language() {
        assert_eq!(CodeUnit::default_namespace("C#"), "Ensemble.Maestro.Generated");
        assert_eq!(CodeUnit::default_namespace("TypeScript"), "generated");
        assert_eq!(CodeUnit::default_namespace("Ruby"), "Generated");
    }
}
