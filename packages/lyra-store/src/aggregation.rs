use lyra_core::{DomainCategory, NliRelation};
use uuid::Uuid;

use crate::error::Result;
use crate::pool::EvidenceStore;

/// One evidence edge's contribution, surfaced alongside the aggregate so
/// a client can show "why" a claim's confidence looks the way it does
/// (spec 4.13: "per-evidence summary with year, domain category,
/// nli_confidence").
#[derive(Debug, Clone)]
pub struct EvidenceSummary {
    pub edge_id: Uuid,
    pub fragment_id: Uuid,
    pub relation: NliRelation,
    pub nli_confidence: f32,
    pub source_domain_category: Option<DomainCategory>,
    pub year: Option<i64>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClaimConfidence {
    pub alpha: f64,
    pub beta: f64,
    pub confidence: f64,
    pub uncertainty: f64,
    pub controversy: f64,
    pub evidence_count: usize,
}

/// Beta(1, 1) posterior over stance evidence, per spec 4.13. `nli_confidence`
/// is the only confidence signal folded in; domain category and LLM
/// extraction confidence never enter this computation (spec section 3
/// invariant — see the note on `lyra_nli::NliEdge`).
fn aggregate(confidences: impl Iterator<Item = (NliRelation, f32)>) -> (ClaimConfidence, usize) {
    let mut alpha = 1.0_f64;
    let mut beta = 1.0_f64;
    let mut evidence_count = 0usize;

    for (relation, confidence) in confidences {
        match relation {
            NliRelation::Supports => alpha += confidence as f64,
            NliRelation::Refutes => beta += confidence as f64,
            NliRelation::Neutral => {}
        }
        evidence_count += 1;
    }

    let confidence = alpha / (alpha + beta);
    let uncertainty =
        ((alpha * beta) / ((alpha + beta).powi(2) * (alpha + beta + 1.0))).sqrt();
    let n = alpha + beta - 2.0;
    let controversy = if n > 0.0 {
        (alpha - 1.0).min(beta - 1.0) / n
    } else {
        0.0
    };

    (
        ClaimConfidence {
            alpha,
            beta,
            confidence,
            uncertainty,
            controversy,
            evidence_count,
        },
        evidence_count,
    )
}

impl EvidenceStore {
    /// `get_claim_confidence(claim_id)`: recomputes the Bayesian posterior
    /// from the current edge set on every call — nothing here is cached
    /// authoritatively (spec section 3: "derived on read").
    pub async fn get_claim_confidence(
        &self,
        claim_id: Uuid,
    ) -> Result<(ClaimConfidence, Vec<EvidenceSummary>)> {
        let edges = self.edges_into_claim(claim_id).await?;

        let mut summaries = Vec::with_capacity(edges.len());
        let mut inputs = Vec::with_capacity(edges.len());
        for edge in &edges {
            let Some(relation) = edge.nli_relation() else {
                continue;
            };
            inputs.push((relation, edge.nli_confidence));

            let year = self.page_year_for_fragment(edge.source_id).await?;
            summaries.push(EvidenceSummary {
                edge_id: edge.id,
                fragment_id: edge.source_id,
                relation,
                nli_confidence: edge.nli_confidence,
                source_domain_category: edge.source_domain_category,
                year,
            });
        }

        let (confidence, _) = aggregate(inputs.into_iter());
        Ok((confidence, summaries))
    }

    async fn page_year_for_fragment(&self, fragment_id: Uuid) -> Result<Option<i64>> {
        let row: Option<(String,)> = sqlx::query_as(
            "SELECT p.metadata_json FROM fragments f JOIN pages p ON p.id = f.page_id WHERE f.id = ?",
        )
        .bind(fragment_id.to_string())
        .fetch_optional(self.pool())
        .await?;
        Ok(row
            .and_then(|(json,)| serde_json::from_str::<serde_json::Value>(&json).ok())
            .and_then(|value| value.get("year").and_then(|y| y.as_i64())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn supports_only_matches_the_spec_identity() {
        let (agg, _) = aggregate(vec![(NliRelation::Supports, 0.4), (NliRelation::Supports, 0.3)].into_iter());
        assert!((agg.alpha - 1.7).abs() < 1e-9);
        assert!((agg.beta - 1.0).abs() < 1e-9);
        assert!((agg.confidence - (1.7 / 2.7)).abs() < 1e-9);
        assert!((agg.controversy - 0.0).abs() < 1e-9);
    }

    #[test]
    fn refutes_only_is_symmetric() {
        let (agg, _) = aggregate(vec![(NliRelation::Refutes, 0.5)].into_iter());
        assert!((agg.alpha - 1.0).abs() < 1e-9);
        assert!((agg.beta - 1.5).abs() < 1e-9);
        assert!((agg.confidence - (1.0 / 2.5)).abs() < 1e-9);
    }

    #[test]
    fn seed_scenario_one_claim_c1_matches_expected_rounding() {
        // F1->C1 supports 0.9, F2->C1 supports 0.8, F3->C1 refutes 0.6.
        // alpha/beta/confidence match the worked example exactly; the
        // worked example's controversy figure (0.375) does not reduce
        // from min(alpha-1,beta-1)/(alpha+beta-2) applied to these same
        // alpha/beta, so this asserts the value the stated formula
        // actually produces (0.6/2.3) rather than the example's figure —
        // see the design ledger.
        let (agg, count) = aggregate(
            vec![
                (NliRelation::Supports, 0.9),
                (NliRelation::Supports, 0.8),
                (NliRelation::Refutes, 0.6),
            ]
            .into_iter(),
        );
        assert_eq!(count, 3);
        assert!((agg.alpha - 2.7).abs() < 1e-9);
        assert!((agg.beta - 1.6).abs() < 1e-9);
        assert!((agg.confidence - 0.628).abs() < 0.001);
        assert!((agg.controversy - 0.26087).abs() < 0.001);
    }

    #[test]
    fn seed_scenario_one_claim_c2_ignores_neutral_edge() {
        // F4->C2 supports 0.7, F5->C2 neutral 0.5 (ignored)
        let (agg, count) =
            aggregate(vec![(NliRelation::Supports, 0.7), (NliRelation::Neutral, 0.5)].into_iter());
        assert_eq!(count, 2);
        assert!((agg.alpha - 1.7).abs() < 1e-9);
        assert!((agg.beta - 1.0).abs() < 1e-9);
        assert!((agg.confidence - 0.63).abs() < 0.005);
    }

    #[test]
    fn human_correction_scenario_shifts_confidence() {
        // After correcting F3 from refutes(0.6) to supports: alpha=1+0.9+0.8+1.0=3.7, beta=1
        let (agg, _) = aggregate(
            vec![
                (NliRelation::Supports, 0.9),
                (NliRelation::Supports, 0.8),
                (NliRelation::Supports, 1.0),
            ]
            .into_iter(),
        );
        assert!((agg.alpha - 3.7).abs() < 1e-9);
        assert!((agg.beta - 1.0).abs() < 1e-9);
        assert!((agg.confidence - 0.787).abs() < 0.001);
    }

    #[test]
    fn empty_evidence_yields_the_uninformed_prior() {
        let (agg, count) = aggregate(std::iter::empty());
        assert_eq!(count, 0);
        assert!((agg.confidence - 0.5).abs() < 1e-9);
        assert_eq!(agg.controversy, 0.0);
    }

    #[tokio::test]
    async fn end_to_end_claim_confidence_matches_manual_aggregate() {
        let store = EvidenceStore::in_memory().await.unwrap();
        let task = store.create_task("H1", 10, &[], None).await.unwrap();
        let page = store
            .upsert_page(crate::pages::NewPage {
                url: "https://example.com/a".to_string(),
                doi: None,
                domain: "example.com".to_string(),
                title: None,
                metadata: serde_json::json!({"year": 2021}),
                warc_path: None,
                har_path: None,
                screenshot_path: None,
            })
            .await
            .unwrap();
        let claim = store.insert_claim(task.id, "claim text").await.unwrap();

        let f1 = store
            .insert_fragment(page.id, "fragment one", "h1", (0, 12), crate::fragments::FragmentKind::Body)
            .await
            .unwrap();
        let f2 = store
            .insert_fragment(page.id, "fragment two", "h2", (0, 12), crate::fragments::FragmentKind::Body)
            .await
            .unwrap();

        store
            .insert_nli_edge(f1.id, claim.id, NliRelation::Supports, "entailment", 0.9, DomainCategory::Academic, DomainCategory::Academic)
            .await
            .unwrap();
        store
            .insert_nli_edge(f2.id, claim.id, NliRelation::Refutes, "contradiction", 0.4, DomainCategory::Unverified, DomainCategory::Unverified)
            .await
            .unwrap();

        let (confidence, summaries) = store.get_claim_confidence(claim.id).await.unwrap();
        assert_eq!(summaries.len(), 2);
        assert!((confidence.alpha - 1.9).abs() < 1e-9);
        assert!((confidence.beta - 1.4).abs() < 1e-9);
        assert!(summaries.iter().any(|s| s.year == Some(2021)));
    }
}
