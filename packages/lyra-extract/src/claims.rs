use lyra_rank::embed::cosine_similarity;

#[derive(Debug, Clone)]
pub struct ExtractedClaim {
    pub text: String,
    pub embedding: Vec<f32>,
}

/// Similarity above which two claims are considered the same claim
/// worded differently.
const DUPLICATE_SIMILARITY_THRESHOLD: f32 = 0.92;

/// Merges near-duplicate claims from a batch (spec 4.11: "duplicates
/// are merged using embedding similarity + exact-text fallback").
/// Exact text matches (case/whitespace-normalized) always merge
/// regardless of embedding quality; everything else merges only above
/// the similarity threshold. The first-seen wording of a merged group
/// is kept.
pub fn merge_duplicate_claims(claims: Vec<ExtractedClaim>) -> Vec<ExtractedClaim> {
    let mut kept: Vec<ExtractedClaim> = Vec::new();

    'outer: for claim in claims {
        let normalized = normalize(&claim.text);
        for existing in &kept {
            if normalize(&existing.text) == normalized {
                continue 'outer;
            }
            if cosine_similarity(&claim.embedding, &existing.embedding) >= DUPLICATE_SIMILARITY_THRESHOLD {
                continue 'outer;
            }
        }
        kept.push(claim);
    }
    kept
}

fn normalize(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn claim(text: &str, embedding: Vec<f32>) -> ExtractedClaim {
        ExtractedClaim {
            text: text.to_string(),
            embedding,
        }
    }

    #[test]
    fn exact_text_duplicates_merge_regardless_of_embedding() {
        let claims = vec![
            claim("Water boils at 100C", vec![1.0, 0.0]),
            claim("  water boils at 100C  ", vec![0.0, 1.0]),
        ];
        let merged = merge_duplicate_claims(claims);
        assert_eq!(merged.len(), 1);
    }

    #[test]
    fn semantically_similar_claims_merge() {
        let claims = vec![
            claim("The sky is blue", vec![1.0, 0.0, 0.0]),
            claim("The sky appears blue", vec![0.99, 0.01, 0.0]),
        ];
        let merged = merge_duplicate_claims(claims);
        assert_eq!(merged.len(), 1);
    }

    #[test]
    fn distinct_claims_are_both_kept() {
        let claims = vec![
            claim("The sky is blue", vec![1.0, 0.0, 0.0]),
            claim("Water boils at 100C", vec![0.0, 1.0, 0.0]),
        ];
        let merged = merge_duplicate_claims(claims);
        assert_eq!(merged.len(), 2);
    }
}
