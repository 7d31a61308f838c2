use uuid::Uuid;

use crate::embeddings::TargetType;
use crate::error::{Result, StoreError};
use crate::pool::EvidenceStore;

#[derive(Debug, Clone)]
pub struct VectorResult {
    pub target_id: Uuid,
    pub text_preview: String,
    pub similarity: f32,
}

const PREVIEW_CHARS: usize = 200;

fn preview(text: &str) -> String {
    match text.char_indices().nth(PREVIEW_CHARS) {
        Some((byte_index, _)) => format!("{}…", &text[..byte_index]),
        None => text.to_string(),
    }
}

/// Vectors are assumed L2-normalized at write time, so cosine similarity
/// reduces to a plain dot product (spec 4.14).
fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

fn from_bytes(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(4)
        .map(|chunk| f32::from_le_bytes(chunk.try_into().expect("chunks_exact(4) guarantees length")))
        .collect()
}

impl EvidenceStore {
    /// `vector_search`: brute-force cosine (dot-product) similarity over
    /// the candidate set, task-scoped per spec 4.14 — claims scope
    /// directly via their `task_id` column; fragments have no direct
    /// task_id, so scoping walks `edges -> claims` instead. Acceptable up
    /// to ~10k rows per the spec's own sizing note; an ANN index would
    /// slot in behind the same `vector_search` signature later.
    pub async fn vector_search(
        &self,
        query_embedding: &[f32],
        target_type: TargetType,
        task_id: Option<Uuid>,
        top_k: usize,
        min_similarity: f32,
    ) -> Result<Vec<VectorResult>> {
        let candidates = match target_type {
            TargetType::Claim => self.claim_embedding_candidates(task_id).await?,
            TargetType::Fragment => self.fragment_embedding_candidates(task_id).await?,
        };

        let mut scored: Vec<VectorResult> = candidates
            .into_iter()
            .map(|(id, text, blob)| VectorResult {
                target_id: id,
                text_preview: preview(&text),
                similarity: dot(query_embedding, &from_bytes(&blob)),
            })
            .filter(|result| result.similarity >= min_similarity)
            .collect();

        scored.sort_by(|a, b| b.similarity.partial_cmp(&a.similarity).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(top_k);
        Ok(scored)
    }

    async fn claim_embedding_candidates(&self, task_id: Option<Uuid>) -> Result<Vec<(Uuid, String, Vec<u8>)>> {
        let rows: Vec<(String, String, Vec<u8>)> = if let Some(task_id) = task_id {
            sqlx::query_as(
                "SELECT c.id, c.claim_text, e.blob FROM embeddings e \
                 JOIN claims c ON c.id = e.target_id \
                 WHERE e.target_type = 'claim' AND c.task_id = ?",
            )
            .bind(task_id.to_string())
            .fetch_all(self.pool())
            .await?
        } else {
            sqlx::query_as(
                "SELECT c.id, c.claim_text, e.blob FROM embeddings e \
                 JOIN claims c ON c.id = e.target_id \
                 WHERE e.target_type = 'claim'",
            )
            .fetch_all(self.pool())
            .await?
        };
        rows.into_iter()
            .map(|(id, text, blob)| {
                Ok((Uuid::parse_str(&id).map_err(|_| StoreError::CorruptJson("claims.id".into()))?, text, blob))
            })
            .collect()
    }

    async fn fragment_embedding_candidates(&self, task_id: Option<Uuid>) -> Result<Vec<(Uuid, String, Vec<u8>)>> {
        let rows: Vec<(String, String, Vec<u8>)> = if let Some(task_id) = task_id {
            sqlx::query_as(
                "WITH task_fragments AS ( \
                    SELECT DISTINCT e.source_id AS fragment_id FROM edges e \
                    JOIN claims c ON c.id = e.target_id \
                    WHERE e.edge_kind = 'fragment_claim' AND c.task_id = ? \
                 ) \
                 SELECT f.id, f.text_content, emb.blob FROM embeddings emb \
                 JOIN fragments f ON f.id = emb.target_id \
                 JOIN task_fragments tf ON tf.fragment_id = f.id \
                 WHERE emb.target_type = 'fragment'",
            )
            .bind(task_id.to_string())
            .fetch_all(self.pool())
            .await?
        } else {
            sqlx::query_as(
                "SELECT f.id, f.text_content, emb.blob FROM embeddings emb \
                 JOIN fragments f ON f.id = emb.target_id \
                 WHERE emb.target_type = 'fragment'",
            )
            .fetch_all(self.pool())
            .await?
        };
        rows.into_iter()
            .map(|(id, text, blob)| {
                Ok((Uuid::parse_str(&id).map_err(|_| StoreError::CorruptJson("fragments.id".into()))?, text, blob))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fragments::FragmentKind;
    use crate::pages::NewPage;
    use lyra_core::{DomainCategory, NliRelation};

    #[tokio::test]
    async fn claim_search_is_scoped_to_the_requesting_task() {
        let store = EvidenceStore::in_memory().await.unwrap();
        let task_a = store.create_task("H1", 10, &[], None).await.unwrap();
        let task_b = store.create_task("H2", 10, &[], None).await.unwrap();
        let claim_a = store.insert_claim(task_a.id, "claim in task a").await.unwrap();
        let claim_b = store.insert_claim(task_b.id, "claim in task b").await.unwrap();

        store.put_embedding(TargetType::Claim, claim_a.id, "m1", &[1.0, 0.0]).await.unwrap();
        store.put_embedding(TargetType::Claim, claim_b.id, "m1", &[1.0, 0.0]).await.unwrap();

        let results = store
            .vector_search(&[1.0, 0.0], TargetType::Claim, Some(task_a.id), 10, 0.0)
            .await
            .unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].target_id, claim_a.id);
    }

    #[tokio::test]
    async fn fragment_search_scopes_through_edges_to_claims() {
        let store = EvidenceStore::in_memory().await.unwrap();
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
        let linked_fragment = store
            .insert_fragment(page.id, "linked fragment", "h1", (0, 16), FragmentKind::Body)
            .await
            .unwrap();
        let orphan_fragment = store
            .insert_fragment(page.id, "orphan fragment", "h2", (0, 16), FragmentKind::Body)
            .await
            .unwrap();
        let claim = store.insert_claim(task.id, "claim text").await.unwrap();
        store
            .insert_nli_edge(
                linked_fragment.id,
                claim.id,
                NliRelation::Supports,
                "entailment",
                0.8,
                DomainCategory::Unverified,
                DomainCategory::Unverified,
            )
            .await
            .unwrap();

        store.put_embedding(TargetType::Fragment, linked_fragment.id, "m1", &[1.0, 0.0]).await.unwrap();
        store.put_embedding(TargetType::Fragment, orphan_fragment.id, "m1", &[1.0, 0.0]).await.unwrap();

        let results = store
            .vector_search(&[1.0, 0.0], TargetType::Fragment, Some(task.id), 10, 0.0)
            .await
            .unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].target_id, linked_fragment.id);
    }

    #[tokio::test]
    async fn min_similarity_filters_out_weak_matches() {
        let store = EvidenceStore::in_memory().await.unwrap();
        let task = store.create_task("H1", 10, &[], None).await.unwrap();
        let claim = store.insert_claim(task.id, "claim text").await.unwrap();
        store.put_embedding(TargetType::Claim, claim.id, "m1", &[0.0, 1.0]).await.unwrap();

        let results = store
            .vector_search(&[1.0, 0.0], TargetType::Claim, None, 10, 0.5)
            .await
            .unwrap();
        assert!(results.is_empty());
    }
}
