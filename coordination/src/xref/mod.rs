//! The Cross-Reference Registry (C2, §4.2): the write-across-three-stores protocol
//! used for every durable entity produced by the pipeline.
//!
//! The SQL row is modeled as a [`crate::state::StateStore`] column family
//! (`CF_CROSS_REFERENCES`), not a literal SQL engine, consistent with the rest of the
//! persistence layer (§9 design note on object-graph ownership: ids only, resolved on
//! demand). Graph and search are [`GraphStore`]/[`SearchIndex`] trait objects with
//! in-memory stubs (§9: their internal schema is unspecified).

mod error;
mod stores;

pub use error::{XrefError, XrefResult};
pub use stores::{GraphStore, SearchIndex, SearchResults, StubGraphStore, StubSearchIndex};

use std::sync::Arc;

use serde_json::Value;
use tracing::warn;
use uuid::Uuid;

use crate::domain::{CrossRefStatus, CrossReference};
use crate::state::SharedStateStore;

/// The result of a `Validate` call (§4.2): per-store resolvability plus the derived
/// `HasOrphanedReferences` flag.
#[derive(Debug, Clone)]
pub struct ValidationReport {
    pub primary_id: Uuid,
    pub sql_resolves: bool,
    pub graph_resolves: bool,
    pub search_resolves: bool,
    pub has_orphaned_references: bool,
    pub cross_reference: CrossReference,
}

pub struct CrossReferenceRegistry {
    store: SharedStateStore,
    graph: Arc<dyn GraphStore>,
    search: Arc<dyn SearchIndex>,
}

impl CrossReferenceRegistry {
    pub fn new(store: SharedStateStore, graph: Arc<dyn GraphStore>, search: Arc<dyn SearchIndex>) -> Self {
        Self { store, graph, search }
    }

    /// Convenience constructor wiring the in-memory stub stores (§9).
    pub fn with_stubs(store: SharedStateStore) -> Self {
        Self::new(store, Arc::new(StubGraphStore::new()), Arc::new(StubSearchIndex::new()))
    }

    /// `Create(entityType, entityData) -> CrossReference` (§4.2): SQL row write
    /// happens-before the graph write happens-before the search-index write (§5
    /// ordering guarantee). On (c) or (d) failure, compensating deletes run on every
    /// store that returned an id, then the row itself, and the original error returns.
    pub async fn create(&self, entity_type: &str, entity_data: &Value) -> XrefResult<CrossReference> {
        let mut xref = CrossReference::new(entity_type);
        xref.sql_id = Some(xref.primary_id.to_string());
        xref.recompute_hash();
        self.store.put_cross_reference(&xref)?;

        let graph_id = match self.graph.create_node(entity_type, entity_data, xref.primary_id).await {
            Ok(id) => id,
            Err(err) => {
                self.store.delete_cross_reference(xref.primary_id)?;
                return Err(err);
            }
        };

        let search_id = match self.search.index(entity_type, entity_data, xref.primary_id).await {
            Ok(id) => id,
            Err(err) => {
                if let Err(compensate_err) = self.graph.delete_node(&graph_id).await {
                    warn!(primary_id = %xref.primary_id, error = %compensate_err, "graph compensation delete failed");
                }
                self.store.delete_cross_reference(xref.primary_id)?;
                return Err(err);
            }
        };

        xref.graph_id = Some(graph_id);
        xref.search_id = Some(search_id);
        xref.recompute_hash();
        self.store.put_cross_reference(&xref)?;
        Ok(xref)
    }

    pub fn get(&self, primary_id: Uuid) -> XrefResult<Option<CrossReference>> {
        Ok(self.store.get_cross_reference(primary_id)?)
    }

    pub fn update(&self, primary_id: Uuid, mut updated: CrossReference) -> XrefResult<CrossReference> {
        updated.primary_id = primary_id;
        updated.recompute_hash();
        self.store.put_cross_reference(&updated)?;
        Ok(updated)
    }

    /// `Delete(primaryId)` (§4.2): best-effort on externals, source row last.
    pub async fn delete(&self, primary_id: Uuid) -> XrefResult<()> {
        let xref = self
            .store
            .get_cross_reference(primary_id)?
            .ok_or(XrefError::NotFound(primary_id))?;

        if let Some(graph_id) = &xref.graph_id {
            if let Err(err) = self.graph.delete_node(graph_id).await {
                warn!(%primary_id, error = %err, "best-effort graph delete failed");
            }
        }
        if let Some(search_id) = &xref.search_id {
            if let Err(err) = self.search.delete(&xref.entity_type, search_id).await {
                warn!(%primary_id, error = %err, "best-effort search delete failed");
            }
        }
        self.store.delete_cross_reference(primary_id)?;
        Ok(())
    }

    /// `Validate(primaryId)` (§4.2): checks each non-null external id still resolves,
    /// writes `HasOrphanedReferences` and per-store booleans, and persists the
    /// recomputed `status` (§3 invariant).
    pub async fn validate(&self, primary_id: Uuid) -> XrefResult<ValidationReport> {
        let mut xref = self
            .store
            .get_cross_reference(primary_id)?
            .ok_or(XrefError::NotFound(primary_id))?;

        // The SQL row is the source of truth for its own existence: if we loaded it,
        // it resolves.
        let sql_resolves = xref.sql_id.is_some();
        let graph_resolves = match &xref.graph_id {
            Some(id) => self.graph.node_exists(id).await.unwrap_or(false),
            None => true,
        };
        let search_resolves = match &xref.search_id {
            Some(id) => self.search.exists(&xref.entity_type, id).await.unwrap_or(false),
            None => true,
        };

        xref.recompute_status(sql_resolves, graph_resolves, search_resolves);
        let has_orphaned_references = xref.status != CrossRefStatus::Active;
        xref.metadata.insert("hasOrphanedReferences".into(), has_orphaned_references.to_string());
        xref.metadata.insert("sqlResolves".into(), sql_resolves.to_string());
        xref.metadata.insert("graphResolves".into(), graph_resolves.to_string());
        xref.metadata.insert("searchResolves".into(), search_resolves.to_string());
        self.store.put_cross_reference(&xref)?;

        Ok(ValidationReport {
            primary_id,
            sql_resolves,
            graph_resolves,
            search_resolves,
            has_orphaned_references,
            cross_reference: xref,
        })
    }

    /// `FindOrphans()` (§4.2): cross-references not currently `Active`.
    pub fn find_orphans(&self) -> XrefResult<Vec<CrossReference>> {
        Ok(self
            .store
            .all_cross_references()?
            .into_iter()
            .filter(|x| x.status != CrossRefStatus::Active)
            .collect())
    }

    /// `CleanupOrphans(list)` (§4.2): reclaims a batch of orphaned cross-references.
    pub async fn cleanup_orphans(&self, ids: &[Uuid]) -> XrefResult<usize> {
        let mut cleaned = 0;
        for id in ids {
            self.delete(*id).await?;
            cleaned += 1;
        }
        Ok(cleaned)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn registry() -> (tempfile::TempDir, CrossReferenceRegistry) {
        let dir = tempfile::tempdir().unwrap();
        let store = crate::state::StateStore::open(dir.path().join("xref.db")).unwrap().shared();
        (dir, CrossReferenceRegistry::with_stubs(store))
    }

    #[tokio::test]
    async fn create_populates_all_three_ids() {
        let (_dir, registry) = registry();
        let xref = registry.create("CodeUnit", &json!({"name": "UserController"})).await.unwrap();
        assert!(xref.sql_id.is_some());
        assert!(xref.graph_id.is_some());
        assert!(xref.search_id.is_some());
        assert!(xref.verify_hash());
        assert_eq!(xref.status, CrossRefStatus::Active);
    }

    #[tokio::test]
    async fn validate_reports_active_when_everything_resolves() {
        let (_dir, registry) = registry();
        let xref = registry.create("CodeUnit", &json!({"name": "X"})).await.unwrap();
        let report = registry.validate(xref.primary_id).await.unwrap();
        assert!(!report.has_orphaned_references);
        assert!(report.sql_resolves && report.graph_resolves && report.search_resolves);
    }

    #[tokio::test]
    async fn validate_detects_orphaned_graph_node() {
        let (_dir, registry) = registry();
        let xref = registry.create("CodeUnit", &json!({"name": "X"})).await.unwrap();
        registry.graph.delete_node(xref.graph_id.as_ref().unwrap()).await.unwrap();
        let report = registry.validate(xref.primary_id).await.unwrap();
        assert!(report.has_orphaned_references);
        assert!(!report.graph_resolves);
        assert_eq!(report.cross_reference.status, CrossRefStatus::PartiallyOrphaned);
    }

    #[tokio::test]
    async fn delete_removes_the_row() {
        let (_dir, registry) = registry();
        let xref = registry.create("CodeUnit", &json!({"name": "X"})).await.unwrap();
        registry.delete(xref.primary_id).await.unwrap();
        assert!(registry.get(xref.primary_id).unwrap().is_none());
    }

    #[tokio::test]
    async fn find_orphans_only_returns_non_active() {
        let (_dir, registry) = registry();
        let healthy = registry.create("CodeUnit", &json!({"name": "Healthy"})).await.unwrap();
        let orphan = registry.create("CodeUnit", &json!({"name": "Orphan"})).await.unwrap();
        registry.search.delete(&orphan.entity_type, orphan.search_id.as_ref().unwrap()).await.unwrap();
        registry.validate(orphan.primary_id).await.unwrap();
        registry.validate(healthy.primary_id).await.unwrap();

        let orphans = registry.find_orphans().unwrap();
        assert_eq!(orphans.len(), 1);
        assert_eq!(orphans[0].primary_id, orphan.primary_id);
    }
}
