use chrono::{DateTime, Utc};
use lyra_core::{DomainCategory, NliRelation};
use sqlx::FromRow;
use uuid::Uuid;

use crate::error::{Result, StoreError};
use crate::pool::EvidenceStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgeKind {
    FragmentClaim,
    PageCites,
}

impl EdgeKind {
    fn as_str(self) -> &'static str {
        match self {
            EdgeKind::FragmentClaim => "fragment_claim",
            EdgeKind::PageCites => "page_cites",
        }
    }
}

#[derive(Debug, Clone)]
pub struct Edge {
    pub id: Uuid,
    pub source_id: Uuid,
    pub target_id: Uuid,
    /// Raw relation string: `supports`/`refutes`/`neutral` for
    /// `fragment_claim` edges, `cites` for `page_cites` edges. Use
    /// [`Edge::nli_relation`] when `edge_kind` is `FragmentClaim`.
    pub relation: String,
    pub edge_kind: EdgeKind,
    pub nli_label: Option<String>,
    pub nli_confidence: f32,
    pub source_domain_category: Option<DomainCategory>,
    pub target_domain_category: Option<DomainCategory>,
    pub citation_source: Option<String>,
    pub edge_human_corrected: bool,
    pub edge_correction_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Edge {
    pub fn nli_relation(&self) -> Option<NliRelation> {
        match self.relation.as_str() {
            "supports" => Some(NliRelation::Supports),
            "refutes" => Some(NliRelation::Refutes),
            "neutral" => Some(NliRelation::Neutral),
            _ => None,
        }
    }
}

fn relation_str(relation: NliRelation) -> &'static str {
    match relation {
        NliRelation::Supports => "supports",
        NliRelation::Refutes => "refutes",
        NliRelation::Neutral => "neutral",
    }
}

fn category_str(category: DomainCategory) -> &'static str {
    match category {
        DomainCategory::Government => "government",
        DomainCategory::Academic => "academic",
        DomainCategory::News => "news",
        DomainCategory::Commercial => "commercial",
        DomainCategory::Unverified => "unverified",
    }
}

fn parse_category(raw: &str) -> DomainCategory {
    match raw {
        "government" => DomainCategory::Government,
        "academic" => DomainCategory::Academic,
        "news" => DomainCategory::News,
        "commercial" => DomainCategory::Commercial,
        _ => DomainCategory::Unverified,
    }
}

#[derive(FromRow)]
struct EdgeRow {
    id: String,
    source_id: String,
    target_id: String,
    relation: String,
    edge_kind: String,
    nli_label: Option<String>,
    nli_confidence: f64,
    source_domain_category: Option<String>,
    target_domain_category: Option<String>,
    citation_source: Option<String>,
    edge_human_corrected: i64,
    edge_correction_reason: Option<String>,
    created_at: String,
    updated_at: String,
}

impl EdgeRow {
    fn into_edge(self) -> Result<Edge> {
        Ok(Edge {
            id: Uuid::parse_str(&self.id).map_err(|_| StoreError::CorruptJson("edges.id".into()))?,
            source_id: Uuid::parse_str(&self.source_id)
                .map_err(|_| StoreError::CorruptJson("edges.source_id".into()))?,
            target_id: Uuid::parse_str(&self.target_id)
                .map_err(|_| StoreError::CorruptJson("edges.target_id".into()))?,
            relation: self.relation,
            edge_kind: if self.edge_kind == "page_cites" {
                EdgeKind::PageCites
            } else {
                EdgeKind::FragmentClaim
            },
            nli_label: self.nli_label,
            nli_confidence: self.nli_confidence as f32,
            source_domain_category: self.source_domain_category.as_deref().map(parse_category),
            target_domain_category: self.target_domain_category.as_deref().map(parse_category),
            citation_source: self.citation_source,
            edge_human_corrected: self.edge_human_corrected != 0,
            edge_correction_reason: self.edge_correction_reason,
            created_at: DateTime::parse_from_rfc3339(&self.created_at)
                .map_err(|_| StoreError::CorruptJson("edges.created_at".into()))?
                .with_timezone(&Utc),
            updated_at: DateTime::parse_from_rfc3339(&self.updated_at)
                .map_err(|_| StoreError::CorruptJson("edges.updated_at".into()))?
                .with_timezone(&Utc),
        })
    }
}

const EDGE_COLUMNS: &str = "id, source_id, target_id, relation, edge_kind, nli_label, nli_confidence, \
     source_domain_category, target_domain_category, citation_source, edge_human_corrected, \
     edge_correction_reason, created_at, updated_at";

impl EvidenceStore {
    /// Inserts a fragment -> claim stance edge. Dedup key is
    /// `(source_id, target_id, relation)`; a repeat automatic observation
    /// of the same key is a no-op — only `correct_edge` (human feedback)
    /// is allowed to change confidence on an existing edge (spec section 3
    /// invariant).
    #[allow(clippy::too_many_arguments)]
    pub async fn insert_nli_edge(
        &self,
        fragment_id: Uuid,
        claim_id: Uuid,
        relation: NliRelation,
        nli_label: &str,
        nli_confidence: f32,
        source_domain_category: DomainCategory,
        target_domain_category: DomainCategory,
    ) -> Result<Edge> {
        let id = lyra_core::new_id();
        let now = lyra_core::now();

        sqlx::query(
            "INSERT INTO edges (id, source_id, target_id, relation, edge_kind, nli_label, nli_confidence, \
             source_domain_category, target_domain_category, edge_human_corrected, created_at, updated_at) \
             VALUES (?, ?, ?, ?, 'fragment_claim', ?, ?, ?, ?, 0, ?, ?) \
             ON CONFLICT(source_id, target_id, relation) DO NOTHING",
        )
        .bind(id.to_string())
        .bind(fragment_id.to_string())
        .bind(claim_id.to_string())
        .bind(relation_str(relation))
        .bind(nli_label)
        .bind(nli_confidence as f64)
        .bind(category_str(source_domain_category))
        .bind(category_str(target_domain_category))
        .bind(now.to_rfc3339())
        .bind(now.to_rfc3339())
        .execute(self.pool())
        .await?;

        self.get_edge_by_key(fragment_id, claim_id, relation_str(relation))
            .await?
            .ok_or_else(|| StoreError::NotFound("edge", id))
    }

    /// Inserts a page `cites` edge. On a repeat observation from a
    /// different source, `citation_source` is upgraded to
    /// `semantic_scholar` if it was not already (spec 4.11: "prefer
    /// semantic_scholar").
    pub async fn insert_citation_edge(
        &self,
        citing_page_id: Uuid,
        cited_page_id: Uuid,
        citation_source: &str,
    ) -> Result<Edge> {
        let id = lyra_core::new_id();
        let now = lyra_core::now();

        sqlx::query(
            "INSERT INTO edges (id, source_id, target_id, relation, edge_kind, citation_source, edge_human_corrected, created_at, updated_at) \
             VALUES (?, ?, ?, 'cites', 'page_cites', ?, 0, ?, ?) \
             ON CONFLICT(source_id, target_id, relation) DO UPDATE SET \
                citation_source = CASE \
                    WHEN excluded.citation_source = 'semantic_scholar' AND edges.citation_source != 'semantic_scholar' \
                    THEN excluded.citation_source ELSE edges.citation_source END",
        )
        .bind(id.to_string())
        .bind(citing_page_id.to_string())
        .bind(cited_page_id.to_string())
        .bind(citation_source)
        .bind(now.to_rfc3339())
        .bind(now.to_rfc3339())
        .execute(self.pool())
        .await?;

        self.get_edge_by_key(citing_page_id, cited_page_id, "cites")
            .await?
            .ok_or_else(|| StoreError::NotFound("edge", id))
    }

    async fn get_edge_by_key(
        &self,
        source_id: Uuid,
        target_id: Uuid,
        relation: &str,
    ) -> Result<Option<Edge>> {
        let row = sqlx::query_as::<_, EdgeRow>(&format!(
            "SELECT {EDGE_COLUMNS} FROM edges WHERE source_id = ? AND target_id = ? AND relation = ?"
        ))
        .bind(source_id.to_string())
        .bind(target_id.to_string())
        .bind(relation)
        .fetch_optional(self.pool())
        .await?;
        row.map(EdgeRow::into_edge).transpose()
    }

    pub async fn get_edge(&self, id: Uuid) -> Result<Option<Edge>> {
        let row = sqlx::query_as::<_, EdgeRow>(&format!("SELECT {EDGE_COLUMNS} FROM edges WHERE id = ?"))
            .bind(id.to_string())
            .fetch_optional(self.pool())
            .await?;
        row.map(EdgeRow::into_edge).transpose()
    }

    pub async fn edges_into_claim(&self, claim_id: Uuid) -> Result<Vec<Edge>> {
        let rows = sqlx::query_as::<_, EdgeRow>(&format!(
            "SELECT {EDGE_COLUMNS} FROM edges WHERE target_id = ? AND edge_kind = 'fragment_claim'"
        ))
        .bind(claim_id.to_string())
        .fetch_all(self.pool())
        .await?;
        rows.into_iter().map(EdgeRow::into_edge).collect()
    }

    /// `feedback(action=edge_correct)`. Forces `nli_confidence = 1.0` and
    /// sets the human-corrected flag, per spec section 3's invariant, and
    /// writes an audit row to `nli_corrections` so the correction is both
    /// durable and available to offline calibration (spec 4.13 glossary:
    /// "Human feedback -> input, not a side channel").
    pub async fn correct_edge(
        &self,
        edge_id: Uuid,
        correct_relation: NliRelation,
        reason: Option<&str>,
    ) -> Result<Edge> {
        let existing = self
            .get_edge(edge_id)
            .await?
            .ok_or(StoreError::NotFound("edge", edge_id))?;

        sqlx::query(
            "UPDATE edges SET relation = ?, nli_confidence = 1.0, edge_human_corrected = 1, \
             edge_correction_reason = ?, updated_at = ? WHERE id = ?",
        )
        .bind(relation_str(correct_relation))
        .bind(reason)
        .bind(lyra_core::now().to_rfc3339())
        .bind(edge_id.to_string())
        .execute(self.pool())
        .await?;

        if existing.edge_kind == EdgeKind::FragmentClaim {
            let (premise, hypothesis) = self
                .fragment_claim_texts(existing.source_id, existing.target_id)
                .await?;
            sqlx::query(
                "INSERT INTO nli_corrections (id, edge_id, premise, hypothesis, predicted_label, predicted_confidence, correct_label, reason, corrected_at) \
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(lyra_core::new_id().to_string())
            .bind(edge_id.to_string())
            .bind(premise)
            .bind(hypothesis)
            .bind(&existing.relation)
            .bind(existing.nli_confidence as f64)
            .bind(relation_str(correct_relation))
            .bind(reason)
            .bind(lyra_core::now().to_rfc3339())
            .execute(self.pool())
            .await?;
        }

        self.get_edge(edge_id)
            .await?
            .ok_or(StoreError::NotFound("edge", edge_id))
    }

    async fn fragment_claim_texts(&self, fragment_id: Uuid, claim_id: Uuid) -> Result<(String, String)> {
        let fragment: Option<(String,)> = sqlx::query_as("SELECT text_content FROM fragments WHERE id = ?")
            .bind(fragment_id.to_string())
            .fetch_optional(self.pool())
            .await?;
        let claim: Option<(String,)> = sqlx::query_as("SELECT claim_text FROM claims WHERE id = ?")
            .bind(claim_id.to_string())
            .fetch_optional(self.pool())
            .await?;
        Ok((
            fragment.map(|(t,)| t).unwrap_or_default(),
            claim.map(|(t,)| t).unwrap_or_default(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pages::NewPage;

    async fn setup(store: &EvidenceStore) -> (Uuid, Uuid) {
        let task = store.create_task("H1", 10, &[], None).await.unwrap();
        let page = store
            .upsert_page(NewPage {
                url: "https://example.com/a".to_string(),
                doi: None,
                domain: "example.com".to_string(),
                title: None,
                metadata: serde_json::json!({}),
                warc_path: None,
                har_path: None,
                screenshot_path: None,
            })
            .await
            .unwrap();
        let fragment = store
            .insert_fragment(
                page.id,
                "Water boils at 100C at sea level.",
                "hash-1",
                (0, 33),
                crate::fragments::FragmentKind::Body,
            )
            .await
            .unwrap();
        let claim = store.insert_claim(task.id, "Water boils at 100C").await.unwrap();
        (fragment.id, claim.id)
    }

    #[tokio::test]
    async fn repeat_automatic_observation_does_not_change_confidence() {
        let store = EvidenceStore::in_memory().await.unwrap();
        let (fragment_id, claim_id) = setup(&store).await;
        store
            .insert_nli_edge(
                fragment_id,
                claim_id,
                NliRelation::Supports,
                "entailment",
                0.9,
                DomainCategory::Unverified,
                DomainCategory::Unverified,
            )
            .await
            .unwrap();
        let second = store
            .insert_nli_edge(
                fragment_id,
                claim_id,
                NliRelation::Supports,
                "entailment",
                0.2,
                DomainCategory::Unverified,
                DomainCategory::Unverified,
            )
            .await
            .unwrap();
        assert_eq!(second.nli_confidence, 0.9);
        assert_eq!(store.edges_into_claim(claim_id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn correct_edge_forces_full_confidence_and_writes_audit_row() {
        let store = EvidenceStore::in_memory().await.unwrap();
        let (fragment_id, claim_id) = setup(&store).await;
        let edge = store
            .insert_nli_edge(
                fragment_id,
                claim_id,
                NliRelation::Refutes,
                "contradiction",
                0.6,
                DomainCategory::Unverified,
                DomainCategory::Unverified,
            )
            .await
            .unwrap();

        let corrected = store
            .correct_edge(edge.id, NliRelation::Supports, Some("reviewer disagreed"))
            .await
            .unwrap();
        assert_eq!(corrected.nli_relation(), Some(NliRelation::Supports));
        assert_eq!(corrected.nli_confidence, 1.0);
        assert!(corrected.edge_human_corrected);

        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM nli_corrections WHERE edge_id = ?")
            .bind(edge.id.to_string())
            .fetch_one(store.pool())
            .await
            .unwrap();
        assert_eq!(count.0, 1);
    }

    #[tokio::test]
    async fn citation_edge_upgrades_source_to_semantic_scholar() {
        let store = EvidenceStore::in_memory().await.unwrap();
        let page_a = store
            .upsert_page(NewPage {
                url: "https://a.example/paper".to_string(),
                doi: None,
                domain: "a.example".to_string(),
                title: None,
                metadata: serde_json::json!({}),
                warc_path: None,
                har_path: None,
                screenshot_path: None,
            })
            .await
            .unwrap();
        let page_b = store
            .upsert_page(NewPage {
                url: "https://b.example/paper".to_string(),
                doi: None,
                domain: "b.example".to_string(),
                title: None,
                metadata: serde_json::json!({}),
                warc_path: None,
                har_path: None,
                screenshot_path: None,
            })
            .await
            .unwrap();

        store.insert_citation_edge(page_a.id, page_b.id, "extraction").await.unwrap();
        let upgraded = store
            .insert_citation_edge(page_a.id, page_b.id, "semantic_scholar")
            .await
            .unwrap();
        assert_eq!(upgraded.citation_source.as_deref(), Some("semantic_scholar"));
    }
}
