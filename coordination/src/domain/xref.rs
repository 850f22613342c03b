use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum CrossRefStatus {
    Active,
    PartiallyOrphaned,
    Orphaned,
    PendingDeletion,
}

/// The tuple of ids linking one logical entity across SQL, graph, and search stores.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrossReference {
    pub primary_id: Uuid,
    pub entity_type: String,
    pub sql_id: Option<String>,
    pub graph_id: Option<String>,
    pub search_id: Option<String>,
    pub status: CrossRefStatus,
    pub integrity_hash: String,
    pub metadata: HashMap<String, String>,
}

impl CrossReference {
    pub fn new(entity_type: impl Into<String>) -> Self {
        let primary_id = Uuid::new_v4();
        let entity_type = entity_type.into();
        let mut xref = Self {
            primary_id,
            entity_type,
            sql_id: None,
            graph_id: None,
            search_id: None,
            status: CrossRefStatus::Active,
            integrity_hash: String::new(),
            metadata: HashMap::new(),
        };
        xref.recompute_hash();
        xref
    }

    /// `integrityHash = sha256(primaryId | entityType | sqlId | graphId | searchId)`,
    /// recomputed on every id update (§3 invariant).
    pub fn compute_hash(
        primary_id: Uuid,
        entity_type: &str,
        sql_id: Option<&str>,
        graph_id: Option<&str>,
        search_id: Option<&str>,
    ) -> String {
        let mut hasher = Sha256::new();
        hasher.update(primary_id.as_bytes());
        hasher.update(b"|");
        hasher.update(entity_type.as_bytes());
        hasher.update(b"|");
        hasher.update(sql_id.unwrap_or("").as_bytes());
        hasher.update(b"|");
        hasher.update(graph_id.unwrap_or("").as_bytes());
        hasher.update(b"|");
        hasher.update(search_id.unwrap_or("").as_bytes());
        let digest = hasher.finalize();
        hex_encode(&digest)
    }

    pub fn recompute_hash(&mut self) {
        self.integrity_hash = Self::compute_hash(
            self.primary_id,
            &self.entity_type,
            self.sql_id.as_deref(),
            self.graph_id.as_deref(),
            self.search_id.as_deref(),
        );
    }

    /// Recompute `status` from which external ids are present (§3 invariant): `Active`
    /// iff every non-null external id still resolves, `PartiallyOrphaned` if some are
    /// missing, `Orphaned` if all are missing.
    pub fn recompute_status(&mut self, sql_resolves: bool, graph_resolves: bool, search_resolves: bool) {
        let expected = [self.sql_id.is_some(), self.graph_id.is_some(), self.search_id.is_some()];
        let resolves = [sql_resolves, graph_resolves, search_resolves];
        let total_expected = expected.iter().filter(|x| **x).count();
        let total_resolved = expected
            .iter()
            .zip(resolves.iter())
            .filter(|(exp, res)| **exp && **res)
            .count();
        self.status = if total_expected == 0 || total_resolved == total_expected {
            CrossRefStatus::Active
        } else if total_resolved == 0 {
            CrossRefStatus::Orphaned
        } else {
            CrossRefStatus::PartiallyOrphaned
        };
    }

    pub fn verify_hash(&self) -> bool {
        self.integrity_hash
            == Self::compute_hash(
                self.primary_id,
                &self.entity_type,
                self.sql_id.as_deref(),
                self.graph_id.as_deref(),
                self.search_id.as_deref(),
            )
    }
}

fn hex_encode(bytes: &[u8]) -> String {
    let mut s = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        s.push_str(&format!("{:02x}", b));
    }
    s
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_changes_when_any_id_changes() {
        let mut xref = CrossReference::new("CodeUnit");
        let h0 = xref.integrity_hash.clone();
        xref.sql_id = Some("row-1".into());
        xref.recompute_hash();
        assert_ne!(h0, xref.integrity_hash);
        assert!(xref.verify_hash());
    }

    #[test]
    fn status_all_present_is_active() {
        let mut xref = CrossReference::new("CodeUnit");
        xref.sql_id = Some("s".into());
        xref.graph_id = Some("g".into());
        xref.search_id = Some("x".into());
        xref.recompute_status(true, true, true);
        assert_eq!(xref.status, CrossRefStatus::Active);
    }

    #[test]
    fn status_partial_missing_is_partially_orphaned() {
        let mut xref = CrossReference::new("CodeUnit");
        xref.sql_id = Some("s".into());
        xref.graph_id = Some("g".into());
        xref.recompute_status(true, false, true);
        assert_eq!(xref.status, CrossRefStatus::PartiallyOrphaned);
    }

    #[test]
    fn status_all_missing_is_orphaned() {
        let mut xref = CrossReference::new("CodeUnit");
        xref.sql_id = Some("s".into());
        xref.graph_id = Some("g".into());
        xref.recompute_status(false, false, true);
        assert_eq!(xref.status, CrossRefStatus::Orphaned);
    }

    #[test]
    fn deterministic_for_same_inputs() {
        let id = Uuid::new_v4();
        let a = CrossReference::compute_hash(id, "CodeUnit", Some("s"), None, None);
        let b = CrossReference::compute_hash(id, "CodeUnit", Some("s"), None, None);
        assert_eq!(a, b);
    }
}
