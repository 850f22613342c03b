//! RocksDB-backed persistence for every durable entity in the data model.
//!
//! Follows the put/get/delete/list_keys-with-typed-wrappers shape used throughout this
//! codebase's other RocksDB-backed stores: one `Arc<RwLock<DB>>`, a fixed set of column
//! families opened eagerly, `bincode` for row encoding (compact, not meant for human
//! inspection) and plain JSON for the append-only event log (kept human-debuggable).

use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use rocksdb::{ColumnFamilyDescriptor, IteratorMode, Options, DB};
use serde::{de::DeserializeOwned, Serialize};
use thiserror::Error;
use uuid::Uuid;

use super::schema::{self, keys, ALL_CFS};
use crate::domain::{
    AgentExecution, CodeDocument, CodeUnit, CrossReference, DesignerOutput, FunctionSpecification,
    PipelineExecution, Project, StageExecution,
};
use crate::errors::{Categorized, Category};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("rocksdb error: {0}")]
    RocksDb(#[from] rocksdb::Error),
    #[error("serialization error: {0}")]
    Serialization(String),
    #[error("deserialization error: {0}")]
    Deserialization(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("lock poisoned")]
    LockPoisoned,
    #[error("unknown column family: {0}")]
    ColumnFamilyNotFound(String),
}

impl Categorized for StoreError {
    fn category(&self) -> Category {
        match self {
            StoreError::RocksDb(_) => Category::Fatal,
            StoreError::Serialization(_) | StoreError::Deserialization(_) => Category::Validation,
            StoreError::NotFound(_) => Category::Validation,
            StoreError::LockPoisoned => Category::Fatal,
            StoreError::ColumnFamilyNotFound(_) => Category::Fatal,
        }
    }
}

pub type StoreResult<T> = Result<T, StoreError>;
pub type SharedStateStore = Arc<StateStore>;

pub struct StateStore {
    db: RwLock<DB>,
    path: PathBuf,
}

impl StateStore {
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let path = path.as_ref().to_path_buf();
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let cf_descriptors: Vec<ColumnFamilyDescriptor> = ALL_CFS
            .iter()
            .map(|name| ColumnFamilyDescriptor::new(*name, Options::default()))
            .collect();

        let db = DB::open_cf_descriptors(&opts, &path, cf_descriptors)?;
        Ok(Self {
            db: RwLock::new(db),
            path,
        })
    }

    pub fn shared(self) -> SharedStateStore {
        Arc::new(self)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn put<T: Serialize>(&self, cf_name: &str, key: &str, value: &T) -> StoreResult<()> {
        let db = self.db.read().map_err(|_| StoreError::LockPoisoned)?;
        let cf = db
            .cf_handle(cf_name)
            .ok_or_else(|| StoreError::ColumnFamilyNotFound(cf_name.to_string()))?;
        let bytes = bincode::serialize(value).map_err(|e| StoreError::Serialization(e.to_string()))?;
        db.put_cf(&cf, key.as_bytes(), bytes)?;
        Ok(())
    }

    fn get<T: DeserializeOwned>(&self, cf_name: &str, key: &str) -> StoreResult<Option<T>> {
        let db = self.db.read().map_err(|_| StoreError::LockPoisoned)?;
        let cf = db
            .cf_handle(cf_name)
            .ok_or_else(|| StoreError::ColumnFamilyNotFound(cf_name.to_string()))?;
        match db.get_cf(&cf, key.as_bytes())? {
            Some(bytes) => {
                let value = bincode::deserialize(&bytes).map_err(|e| StoreError::Deserialization(e.to_string()))?;
                Ok(Some(value))
            }
            None => Ok(None),
        }
    }

    fn delete(&self, cf_name: &str, key: &str) -> StoreResult<()> {
        let db = self.db.read().map_err(|_| StoreError::LockPoisoned)?;
        let cf = db
            .cf_handle(cf_name)
            .ok_or_else(|| StoreError::ColumnFamilyNotFound(cf_name.to_string()))?;
        db.delete_cf(&cf, key.as_bytes())?;
        Ok(())
    }

    fn list_values<T: DeserializeOwned>(&self, cf_name: &str, prefix: &str) -> StoreResult<Vec<T>> {
        let db = self.db.read().map_err(|_| StoreError::LockPoisoned)?;
        let cf = db
            .cf_handle(cf_name)
            .ok_or_else(|| StoreError::ColumnFamilyNotFound(cf_name.to_string()))?;
        let mut out = Vec::new();
        let iter = db.prefix_iterator_cf(&cf, prefix.as_bytes());
        for item in iter {
            let (key, value) = item?;
            if !key.starts_with(prefix.as_bytes()) {
                break;
            }
            let decoded = bincode::deserialize(&value).map_err(|e| StoreError::Deserialization(e.to_string()))?;
            out.push(decoded);
        }
        Ok(out)
    }

    // -- Project -----------------------------------------------------------

    pub fn put_project(&self, project: &Project) -> StoreResult<()> {
        self.put(schema::CF_PROJECTS, &keys::project(project.id), project)
    }

    pub fn get_project(&self, id: Uuid) -> StoreResult<Option<Project>> {
        self.get(schema::CF_PROJECTS, &keys::project(id))
    }

    // -- PipelineExecution ---------------------------------------------------

    pub fn put_pipeline(&self, pipeline: &PipelineExecution) -> StoreResult<()> {
        self.put(schema::CF_PIPELINES, &keys::pipeline(pipeline.id), pipeline)
    }

    pub fn get_pipeline(&self, id: Uuid) -> StoreResult<Option<PipelineExecution>> {
        self.get(schema::CF_PIPELINES, &keys::pipeline(id))
    }

    // -- StageExecution -------------------------------------------------------

    pub fn put_stage_execution(&self, stage: &StageExecution) -> StoreResult<()> {
        self.put(
            schema::CF_STAGE_EXECUTIONS,
            &keys::stage_execution_by_pipeline(stage.pipeline_id, stage.id),
            stage,
        )
    }

    pub fn get_stage_executions(&self, pipeline_id: Uuid) -> StoreResult<Vec<StageExecution>> {
        self.list_values(schema::CF_STAGE_EXECUTIONS, &keys::stage_execution_prefix(pipeline_id))
    }

    // -- AgentExecution -------------------------------------------------------

    pub fn put_agent_execution(&self, agent: &AgentExecution) -> StoreResult<()> {
        self.put(
            schema::CF_AGENT_EXECUTIONS,
            &keys::agent_execution_by_stage(agent.stage_id, agent.id),
            agent,
        )
    }

    pub fn get_agent_executions(&self, stage_id: Uuid) -> StoreResult<Vec<AgentExecution>> {
        self.list_values(schema::CF_AGENT_EXECUTIONS, &keys::agent_execution_prefix(stage_id))
    }

    // -- DesignerOutput -------------------------------------------------------

    pub fn put_designer_output(&self, output: &DesignerOutput) -> StoreResult<()> {
        self.put(schema::CF_DESIGNER_OUTPUTS, &keys::designer_output(output.id), output)
    }

    pub fn get_designer_output(&self, id: Uuid) -> StoreResult<Option<DesignerOutput>> {
        self.get(schema::CF_DESIGNER_OUTPUTS, &keys::designer_output(id))
    }

    // -- FunctionSpecification -------------------------------------------------

    pub fn put_function_spec(&self, spec: &FunctionSpecification) -> StoreResult<()> {
        self.put(
            schema::CF_FUNCTION_SPECS,
            &keys::function_spec_by_pipeline(spec.pipeline_id, &spec.code_unit, spec.id),
            spec,
        )
    }

    pub fn get_function_specs_for_pipeline(&self, pipeline_id: Uuid) -> StoreResult<Vec<FunctionSpecification>> {
        self.list_values(schema::CF_FUNCTION_SPECS, &keys::function_spec_prefix(pipeline_id))
    }

    pub fn get_function_specs_for_unit(
        &self,
        pipeline_id: Uuid,
        code_unit: &str,
    ) -> StoreResult<Vec<FunctionSpecification>> {
        self.list_values(
            schema::CF_FUNCTION_SPECS,
            &keys::function_spec_prefix_for_unit(pipeline_id, code_unit),
        )
    }

    // -- CodeUnit ---------------------------------------------------------------

    pub fn put_code_unit(&self, unit: &CodeUnit) -> StoreResult<()> {
        self.put(
            schema::CF_CODE_UNITS,
            &keys::code_unit_by_pipeline(unit.pipeline_id, unit.id),
            unit,
        )
    }

    pub fn get_code_units_for_pipeline(&self, pipeline_id: Uuid) -> StoreResult<Vec<CodeUnit>> {
        self.list_values(schema::CF_CODE_UNITS, &keys::code_unit_prefix(pipeline_id))
    }

    // -- CrossReference -----------------------------------------------------------

    pub fn put_cross_reference(&self, xref: &CrossReference) -> StoreResult<()> {
        self.put(schema::CF_CROSS_REFERENCES, &keys::cross_reference(xref.primary_id), xref)
    }

    pub fn get_cross_reference(&self, primary_id: Uuid) -> StoreResult<Option<CrossReference>> {
        self.get(schema::CF_CROSS_REFERENCES, &keys::cross_reference(primary_id))
    }

    pub fn delete_cross_reference(&self, primary_id: Uuid) -> StoreResult<()> {
        self.delete(schema::CF_CROSS_REFERENCES, &keys::cross_reference(primary_id))
    }

    pub fn all_cross_references(&self) -> StoreResult<Vec<CrossReference>> {
        self.list_values(schema::CF_CROSS_REFERENCES, "xref:")
    }

    // -- CodeDocument -------------------------------------------------------------

    pub fn put_code_document(&self, doc: &CodeDocument) -> StoreResult<()> {
        self.put(
            schema::CF_CODE_DOCUMENTS,
            &keys::code_document_by_unit(doc.project_id, &doc.code_unit_name, doc.id),
            doc,
        )
    }

    pub fn get_code_documents_for_unit(
        &self,
        project_id: Uuid,
        code_unit_name: &str,
    ) -> StoreResult<Vec<CodeDocument>> {
        self.list_values(
            schema::CF_CODE_DOCUMENTS,
            &keys::code_document_prefix_for_unit(project_id, code_unit_name),
        )
    }

    // -- Bus queue snapshots (JSON, write-through for durable queues) ---------------

    pub fn put_bus_snapshot(&self, key: &str, snapshot: &impl Serialize) -> StoreResult<()> {
        let db = self.db.read().map_err(|_| StoreError::LockPoisoned)?;
        let cf = db
            .cf_handle(schema::CF_BUS_QUEUES)
            .ok_or_else(|| StoreError::ColumnFamilyNotFound(schema::CF_BUS_QUEUES.to_string()))?;
        let json = serde_json::to_vec(snapshot).map_err(|e| StoreError::Serialization(e.to_string()))?;
        db.put_cf(&cf, key.as_bytes(), json)?;
        Ok(())
    }

    pub fn get_bus_snapshot<T: DeserializeOwned>(&self, key: &str) -> StoreResult<Option<T>> {
        let db = self.db.read().map_err(|_| StoreError::LockPoisoned)?;
        let cf = db
            .cf_handle(schema::CF_BUS_QUEUES)
            .ok_or_else(|| StoreError::ColumnFamilyNotFound(schema::CF_BUS_QUEUES.to_string()))?;
        match db.get_cf(&cf, key.as_bytes())? {
            Some(bytes) => {
                let value = serde_json::from_slice(&bytes).map_err(|e| StoreError::Deserialization(e.to_string()))?;
                Ok(Some(value))
            }
            None => Ok(None),
        }
    }

    pub fn delete_bus_snapshot(&self, key: &str) -> StoreResult<()> {
        self.delete(schema::CF_BUS_QUEUES, key)
    }

    // -- Event log (JSON, for debuggability) ---------------------------------------

    pub fn put_event(&self, timestamp_nanos: i64, event_id: &str, event: &impl Serialize) -> StoreResult<()> {
        let db = self.db.read().map_err(|_| StoreError::LockPoisoned)?;
        let cf = db
            .cf_handle(schema::CF_EVENTS)
            .ok_or_else(|| StoreError::ColumnFamilyNotFound(schema::CF_EVENTS.to_string()))?;
        let json = serde_json::to_vec(event).map_err(|e| StoreError::Serialization(e.to_string()))?;
        db.put_cf(&cf, keys::event(timestamp_nanos, event_id).as_bytes(), json)?;
        Ok(())
    }

    pub fn get_events_range<T: DeserializeOwned>(
        &self,
        start_nanos: i64,
        end_nanos: i64,
    ) -> StoreResult<Vec<(i64, T)>> {
        let db = self.db.read().map_err(|_| StoreError::LockPoisoned)?;
        let cf = db
            .cf_handle(schema::CF_EVENTS)
            .ok_or_else(|| StoreError::ColumnFamilyNotFound(schema::CF_EVENTS.to_string()))?;
        let start_key = format!("evt:{:020}:", start_nanos);
        let mut out = Vec::new();
        for item in db.iterator_cf(&cf, IteratorMode::From(start_key.as_bytes(), rocksdb::Direction::Forward)) {
            let (key, value) = item?;
            let key_str = String::from_utf8_lossy(&key);
            let ts: i64 = key_str
                .split(':')
                .nth(1)
                .and_then(|s| s.parse().ok())
                .unwrap_or(i64::MAX);
            if ts > end_nanos {
                break;
            }
            let decoded: T = serde_json::from_slice(&value).map_err(|e| StoreError::Deserialization(e.to_string()))?;
            out.push((ts, decoded));
        }
        Ok(out)
    }
}
