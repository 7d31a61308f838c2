//! Stage orchestration: BM25 pre-filter, dense composite scoring, then
//! Kneedle truncation (spec 4.10).

use crate::bm25;
use crate::embed::embed_scores;
use crate::kneedle::kneedle_cutoff;

const BM25_WEIGHT: f32 = 0.3;
const EMBED_WEIGHT: f32 = 0.7;

#[derive(Debug, Clone)]
pub struct Candidate<T> {
    pub text: String,
    pub embedding: Option<Vec<f32>>,
    pub item: T,
}

#[derive(Debug, Clone)]
pub struct RankConfig {
    pub bm25_top_k: usize,
    pub min_results: usize,
    pub max_results: usize,
    pub kneedle_sensitivity: f32,
}

impl Default for RankConfig {
    fn default() -> Self {
        Self {
            bm25_top_k: 50,
            min_results: 1,
            max_results: 20,
            kneedle_sensitivity: 1.0,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RankedItem<T> {
    pub item: T,
    pub bm25_score: f32,
    pub embed_score: f32,
    pub composite_score: f32,
}

/// Runs the two-stage ranking pipeline: BM25 narrows `candidates` to
/// `bm25_top_k`, dense cosine similarity scores the survivors against
/// `query_embedding`, then Kneedle picks how many of the composite-sorted
/// results to keep.
pub fn rank<T: Clone>(
    query: &str,
    query_embedding: &[f32],
    candidates: Vec<Candidate<T>>,
    config: &RankConfig,
) -> Vec<RankedItem<T>> {
    if candidates.is_empty() {
        return Vec::new();
    }

    let texts: Vec<String> = candidates.iter().map(|c| c.text.clone()).collect();
    let bm25_raw = bm25::bm25_score(query, &texts);

    let mut by_bm25: Vec<(usize, f32)> = bm25_raw.into_iter().enumerate().collect();
    by_bm25.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
    by_bm25.truncate(config.bm25_top_k.max(1));

    let survivor_indices: Vec<usize> = by_bm25.iter().map(|(i, _)| *i).collect();
    let bm25_scores_norm = bm25::normalize(&by_bm25.iter().map(|(_, s)| *s).collect::<Vec<_>>());

    let embeddings: Vec<Option<Vec<f32>>> = survivor_indices
        .iter()
        .map(|&i| candidates[i].embedding.clone())
        .collect();
    let embed_scores_raw = embed_scores(query_embedding, &embeddings);

    let mut scored: Vec<RankedItem<T>> = survivor_indices
        .iter()
        .enumerate()
        .map(|(rank_pos, &orig_idx)| {
            let bm25_score = bm25_scores_norm[rank_pos];
            let embed_score = embed_scores_raw[rank_pos];
            RankedItem {
                item: candidates[orig_idx].item.clone(),
                bm25_score,
                embed_score,
                composite_score: BM25_WEIGHT * bm25_score + EMBED_WEIGHT * embed_score,
            }
        })
        .collect();

    scored.sort_by(|a, b| {
        b.composite_score
            .partial_cmp(&a.composite_score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let composite_scores: Vec<f32> = scored.iter().map(|r| r.composite_score).collect();
    let keep = kneedle_cutoff(
        &composite_scores,
        config.min_results,
        config.max_results,
        config.kneedle_sensitivity,
    );
    scored.truncate(keep);
    scored
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(text: &str, embedding: Vec<f32>, item: &str) -> Candidate<String> {
        Candidate {
            text: text.to_string(),
            embedding: Some(embedding),
            item: item.to_string(),
        }
    }

    #[test]
    fn ranks_by_composite_and_caps_at_max_results() {
        let candidates = vec![
            candidate("rust memory safety ownership", vec![1.0, 0.0, 0.0], "a"),
            candidate("cooking pasta recipes", vec![0.0, 1.0, 0.0], "b"),
            candidate("rust ownership and borrowing rules", vec![0.9, 0.1, 0.0], "c"),
        ];
        let config = RankConfig {
            bm25_top_k: 10,
            min_results: 1,
            max_results: 2,
            kneedle_sensitivity: 1.0,
        };
        let ranked = rank("rust ownership", &[1.0, 0.0, 0.0], candidates, &config);
        assert!(ranked.len() <= 2);
        assert_eq!(ranked[0].item, "a");
    }

    #[test]
    fn empty_candidates_yields_empty_ranking() {
        let config = RankConfig::default();
        let ranked: Vec<RankedItem<String>> = rank("query", &[1.0], Vec::new(), &config);
        assert!(ranked.is_empty());
    }
}
