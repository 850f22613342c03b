//! Wire messages exchanged over the bus by the Swarming/Controller/Building
//! components (§6 "Queue wire format"), plus the in-process `MethodJobPacket`
//! the Controller hands to a method worker.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::{Priority, UnitType};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FunctionAssignment {
    pub assignment_id: Uuid,
    pub function_specification_id: Uuid,
    pub function_name: String,
    pub code_unit: String,
    pub signature: String,
    pub description: String,
    pub business_logic: Option<String>,
    pub validation_rules: Option<String>,
    pub error_handling: Option<String>,
    pub security_considerations: Option<String>,
    pub test_cases: Option<Vec<String>>,
    pub complexity_rating: u8,
    pub estimated_minutes: Option<u32>,
    pub priority: Priority,
    pub target_language: String,
    pub assigned_at: DateTime<Utc>,
    pub due_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CodeUnitAssignment {
    pub assignment_id: Uuid,
    pub code_unit_id: Uuid,
    pub name: String,
    pub unit_type: UnitType,
    pub namespace: Option<String>,
    pub description: Option<String>,
    pub functions: Vec<FunctionAssignment>,
    pub simple_function_count: u32,
    pub complex_function_count: u32,
    pub dependencies: Option<Vec<String>>,
    pub patterns: Option<Vec<String>>,
    pub testing_strategy: Option<String>,
    pub complexity_rating: u8,
    pub estimated_minutes: u32,
    pub priority: Priority,
    pub target_language: String,
    pub assigned_at: DateTime<Utc>,
    pub due_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum BuilderStatus {
    Complete,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuilderNotification {
    pub notification_id: Uuid,
    pub project_id: Uuid,
    pub code_unit_name: String,
    pub status: BuilderStatus,
    pub completed_at: DateTime<Utc>,
    pub priority: u8,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuilderError {
    pub error_id: Uuid,
    pub project_id: Uuid,
    pub code_unit_name: String,
    pub function_name: Option<String>,
    pub function_signature: Option<String>,
    pub error_type: String,
    pub error_message: String,
    pub details: Option<String>,
    pub stack_trace: Option<String>,
    pub file_name: Option<String>,
    pub line_number: Option<u32>,
    /// 1..10 (§6).
    pub severity: u8,
    pub suggested_fix: Option<String>,
    pub related_functions: Vec<String>,
}

/// The return-type/access-modifier/flags extracted from a raw signature by simple
/// keyword matching (§4.6 step 3a).
#[derive(Debug, Clone)]
pub struct ExtractedSignature {
    pub return_type: String,
    pub access_modifier: &'static str,
    pub is_static: bool,
    pub is_async: bool,
}

/// `Task<…>`/`Task`/`string`/`int`/`bool`/else `object` (§4.6 step 3a).
pub fn extract_return_type(signature: &str) -> String {
    if signature.contains("Task<") {
        let start = signature.find("Task<").unwrap();
        let rest = &signature[start..];
        if let Some(end) = rest.find('>') {
            return rest[..=end].to_string();
        }
        "Task".to_string()
    } else if signature.contains("Task") {
        "Task".to_string()
    } else if signature.contains("string") {
        "string".to_string()
    } else if signature.contains("int") {
        "int".to_string()
    } else if signature.contains("bool") {
        "bool".to_string()
    } else {
        "object".to_string()
    }
}

/// `private`/`protected`/`internal`/else `public` (§4.6 step 3a).
pub fn extract_access_modifier(signature: &str) -> &'static str {
    if signature.contains("private") {
        "private"
    } else if signature.contains("protected") {
        "protected"
    } else if signature.contains("internal") {
        "internal"
    } else {
        "public"
    }
}

pub fn extract_signature(signature: &str) -> ExtractedSignature {
    ExtractedSignature {
        return_type: extract_return_type(signature),
        access_modifier: extract_access_modifier(signature),
        is_static: signature.contains("static"),
        is_async: signature.contains("async") || signature.contains("Task"),
    }
}

/// The packet handed to a method worker for exactly one function (§4.6 step 3a).
#[derive(Debug, Clone)]
pub struct MethodJobPacket {
    pub job_id: Uuid,
    pub project_id: Uuid,
    pub code_unit_name: String,
    pub function: FunctionAssignment,
    pub extracted: ExtractedSignature,
    pub priority: u8,
    pub context: HashMap<String, String>,
}

impl MethodJobPacket {
    pub fn new(project_id: Uuid, code_unit_name: impl Into<String>, function: FunctionAssignment) -> Self {
        let extracted = extract_signature(&function.signature);
        let priority = calculate_packet_priority(&function, &extracted);
        Self {
            job_id: Uuid::new_v4(),
            project_id,
            code_unit_name: code_unit_name.into(),
            function,
            extracted,
            priority,
            context: HashMap::new(),
        }
    }
}

/// Starts at 5 and adds: +2 public, +1 async/Task, +1 complexity>5, +3 name contains
/// "main", +2 priority=Critical, +1 priority=High; clamp to ≤10 (§4.6).
pub fn calculate_packet_priority(function: &FunctionAssignment, extracted: &ExtractedSignature) -> u8 {
    let mut score: i32 = 5;
    if extracted.access_modifier == "public" {
        score += 2;
    }
    if extracted.is_async || extracted.return_type.starts_with("Task") {
        score += 1;
    }
    if function.complexity_rating > 5 {
        score += 1;
    }
    if function.function_name.to_lowercase().contains("main") {
        score += 3;
    }
    match function.priority {
        Priority::Critical => score += 2,
        Priority::High => score += 1,
        Priority::Medium | Priority::Low => {}
    }
    score.clamp(1, 10) as u8
}
