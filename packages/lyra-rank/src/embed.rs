//! Dense stage: cosine similarity of a query embedding against each
//! candidate's embedding (spec 4.10 stage 2).

/// Ported from the same formula used throughout the evidence store for
/// vector-search scoring; kept here too so ranking has no dependency
/// on storage.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

/// Scores every candidate embedding against `query_embedding`. A
/// missing candidate embedding scores 0.0 rather than being dropped,
/// so the caller's candidate list and score list stay index-aligned.
pub fn embed_scores(query_embedding: &[f32], candidates: &[Option<Vec<f32>>]) -> Vec<f32> {
    candidates
        .iter()
        .map(|c| match c {
            Some(v) => cosine_similarity(query_embedding, v),
            None => 0.0,
        })
        .collect()
}
