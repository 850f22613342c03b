use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Per-function implementation artifact produced by a method worker.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CodeDocument {
    pub id: Uuid,
    pub project_id: Uuid,
    pub code_unit_name: String,
    pub function_name: String,
    pub content: String,
    pub size_bytes: usize,
    pub created_at: DateTime<Utc>,
}

impl CodeDocument {
    pub fn new(
        project_id: Uuid,
        code_unit_name: impl Into<String>,
        function_name: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        let content = content.into();
        let size_bytes = content.len();
        Self {
            id: Uuid::new_v4(),
            project_id,
            code_unit_name: code_unit_name.into(),
            function_name: function_name.into(),
            content,
            size_bytes,
            created_at: Utc::now(),
        }
    }
}
