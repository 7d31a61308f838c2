use lyra_core::{DomainCategory, NliRelation};
use uuid::Uuid;

/// A persisted (fragment, claim) stance edge. `source_domain_category`
/// and `target_domain_category` are carried purely as informational
/// metadata for the client (spec 4.12: "never use these in Bayesian
/// aggregation") — nothing in this crate or in `lyra-store`'s
/// aggregation reads them.
#[derive(Debug, Clone)]
pub struct NliEdge {
    pub fragment_id: Uuid,
    pub claim_id: Uuid,
    pub relation: NliRelation,
    pub confidence: f32,
    pub source_domain_category: DomainCategory,
    pub target_domain_category: DomainCategory,
}

impl NliEdge {
    /// Dedup key per spec 4.12: "(src, tgt, relation)".
    pub fn dedup_key(&self) -> (Uuid, Uuid, NliRelation) {
        (self.fragment_id, self.claim_id, self.relation)
    }
}

/// Filters out edges whose (fragment, claim, relation) key already
/// appears in `existing_keys`, keeping the first occurrence of each
/// new key within `candidates` itself too.
pub fn dedup_new_edges(
    candidates: Vec<NliEdge>,
    existing_keys: &std::collections::HashSet<(Uuid, Uuid, NliRelation)>,
) -> Vec<NliEdge> {
    let mut seen_in_batch = std::collections::HashSet::new();
    candidates
        .into_iter()
        .filter(|edge| {
            let key = edge.dedup_key();
            !existing_keys.contains(&key) && seen_in_batch.insert(key)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn edge(fragment: Uuid, claim: Uuid, relation: NliRelation) -> NliEdge {
        NliEdge {
            fragment_id: fragment,
            claim_id: claim,
            relation,
            confidence: 0.8,
            source_domain_category: DomainCategory::Unverified,
            target_domain_category: DomainCategory::Unverified,
        }
    }

    #[test]
    fn drops_edges_already_persisted() {
        let fragment = Uuid::new_v4();
        let claim = Uuid::new_v4();
        let mut existing = std::collections::HashSet::new();
        existing.insert((fragment, claim, NliRelation::Supports));

        let candidates = vec![edge(fragment, claim, NliRelation::Supports)];
        assert!(dedup_new_edges(candidates, &existing).is_empty());
    }

    #[test]
    fn drops_duplicate_edges_within_the_same_batch() {
        let fragment = Uuid::new_v4();
        let claim = Uuid::new_v4();
        let existing = std::collections::HashSet::new();
        let candidates = vec![
            edge(fragment, claim, NliRelation::Supports),
            edge(fragment, claim, NliRelation::Supports),
        ];
        assert_eq!(dedup_new_edges(candidates, &existing).len(), 1);
    }

    #[test]
    fn different_relation_is_a_distinct_edge() {
        let fragment = Uuid::new_v4();
        let claim = Uuid::new_v4();
        let existing = std::collections::HashSet::new();
        let candidates = vec![
            edge(fragment, claim, NliRelation::Supports),
            edge(fragment, claim, NliRelation::Refutes),
        ];
        assert_eq!(dedup_new_edges(candidates, &existing).len(), 2);
    }
}
