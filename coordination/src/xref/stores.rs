//! Graph-store and search-index contracts (§6) plus the in-memory stub
//! implementations used for tests and default wiring (§9 design note: "The Neo4j/
//! Elasticsearch implementations in the source are stubs; the spec defines their
//! contract but not their internal schema").

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use serde_json::Value;
use uuid::Uuid;

use super::error::XrefResult;

/// `CreateNode(type, data, primaryId) -> externalId`, plus relationship/query ops (§6).
#[async_trait]
pub trait GraphStore: Send + Sync {
    async fn create_node(&self, entity_type: &str, data: &Value, primary_id: Uuid) -> XrefResult<String>;
    async fn delete_node(&self, id: &str) -> XrefResult<()>;
    async fn node_exists(&self, id: &str) -> XrefResult<bool>;
    async fn create_relationship(
        &self,
        from: &str,
        to: &str,
        relationship_type: &str,
        props: Option<Value>,
    ) -> XrefResult<()>;
    async fn query_nodes(&self, entity_type: &str, filters: Option<Value>) -> XrefResult<Vec<Value>>;
}

/// `Index(type, doc, primaryId) -> externalId`, `Search(...) -> {docs, total}` (§6).
#[async_trait]
pub trait SearchIndex: Send + Sync {
    async fn index(&self, entity_type: &str, doc: &Value, primary_id: Uuid) -> XrefResult<String>;
    async fn delete(&self, entity_type: &str, id: &str) -> XrefResult<()>;
    async fn exists(&self, entity_type: &str, id: &str) -> XrefResult<bool>;
    async fn search(
        &self,
        entity_type: &str,
        query: &str,
        filters: Option<Value>,
        from: usize,
        size: usize,
    ) -> XrefResult<SearchResults>;
}

#[derive(Debug, Clone, Default)]
pub struct SearchResults {
    pub docs: Vec<Value>,
    pub total: usize,
}

/// In-memory stand-in for a Neo4j-like graph store.
#[derive(Default)]
pub struct StubGraphStore {
    nodes: RwLock<HashMap<String, (String, Value)>>,
    relationships: RwLock<Vec<(String, String, String)>>,
}

impl StubGraphStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl GraphStore for StubGraphStore {
    async fn create_node(&self, entity_type: &str, data: &Value, primary_id: Uuid) -> XrefResult<String> {
        let external_id = format!("graph:{primary_id}");
        self.nodes
            .write()
            .expect("graph lock poisoned")
            .insert(external_id.clone(), (entity_type.to_string(), data.clone()));
        Ok(external_id)
    }

    async fn delete_node(&self, id: &str) -> XrefResult<()> {
        self.nodes.write().expect("graph lock poisoned").remove(id);
        Ok(())
    }

    async fn node_exists(&self, id: &str) -> XrefResult<bool> {
        Ok(self.nodes.read().expect("graph lock poisoned").contains_key(id))
    }

    async fn create_relationship(
        &self,
        from: &str,
        to: &str,
        relationship_type: &str,
        _props: Option<Value>,
    ) -> XrefResult<()> {
        self.relationships
            .write()
            .expect("graph lock poisoned")
            .push((from.to_string(), to.to_string(), relationship_type.to_string()));
        Ok(())
    }

    async fn query_nodes(&self, entity_type: &str, _filters: Option<Value>) -> XrefResult<Vec<Value>> {
        Ok(self
            .nodes
            .read()
            .expect("graph lock poisoned")
            .values()
            .filter(|(t, _)| t == entity_type)
            .map(|(_, v)| v.clone())
            .collect())
    }
}

/// In-memory stand-in for an Elasticsearch-like search index.
#[derive(Default)]
pub struct StubSearchIndex {
    docs: RwLock<HashMap<String, (String, Value)>>,
}

impl StubSearchIndex {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SearchIndex for StubSearchIndex {
    async fn index(&self, entity_type: &str, doc: &Value, primary_id: Uuid) -> XrefResult<String> {
        let external_id = format!("search:{primary_id}");
        self.docs
            .write()
            .expect("search lock poisoned")
            .insert(external_id.clone(), (entity_type.to_string(), doc.clone()));
        Ok(external_id)
    }

    async fn delete(&self, _entity_type: &str, id: &str) -> XrefResult<()> {
        self.docs.write().expect("search lock poisoned").remove(id);
        Ok(())
    }

    async fn exists(&self, _entity_type: &str, id: &str) -> XrefResult<bool> {
        Ok(self.docs.read().expect("search lock poisoned").contains_key(id))
    }

    async fn search(
        &self,
        entity_type: &str,
        query: &str,
        _filters: Option<Value>,
        from: usize,
        size: usize,
    ) -> XrefResult<SearchResults> {
        let matches: Vec<Value> = self
            .docs
            .read()
            .expect("search lock poisoned")
            .values()
            .filter(|(t, doc)| t == entity_type && doc.to_string().contains(query))
            .map(|(_, doc)| doc.clone())
            .collect();
        let total = matches.len();
        let docs = matches.into_iter().skip(from).take(size).collect();
        Ok(SearchResults { docs, total })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn stub_graph_store_roundtrips_a_node() {
        let store = StubGraphStore::new();
        let id = Uuid::new_v4();
        let external = store.create_node("CodeUnit", &json!({"name": "X"}), id).await.unwrap();
        assert!(store.node_exists(&external).await.unwrap());
        store.delete_node(&external).await.unwrap();
        assert!(!store.node_exists(&external).await.unwrap());
    }

    #[tokio::test]
    async fn stub_search_index_finds_matching_docs() {
        let index = StubSearchIndex::new();
        let id = Uuid::new_v4();
        index.index("CodeUnit", &json!({"name": "UserController"}), id).await.unwrap();
        let results = index.search("CodeUnit", "UserController", None, 0, 10).await.unwrap();
        assert_eq!(results.total, 1);
    }
}
