//! BM25-style lexical scoring over a small, locally-held candidate set
//! (spec 4.10 stage 1: "lexical (BM25-style) on concatenated
//! title+snippet+leading body").
//!
//! Corpus statistics (average document length, per-term document
//! frequency) are derived from the candidate set itself rather than a
//! persistent index, since ranking operates over one page of search
//! results or one task's recalled fragments at a time.

const K1: f32 = 1.2;
const B: f32 = 0.75;

fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(|w| w.to_lowercase())
        .collect()
}

/// Scores `documents` against `query`, returning one BM25 score per
/// document in input order.
pub fn bm25_score(query: &str, documents: &[String]) -> Vec<f32> {
    let query_terms = tokenize(query);
    if query_terms.is_empty() || documents.is_empty() {
        return vec![0.0; documents.len()];
    }

    let tokenized: Vec<Vec<String>> = documents.iter().map(|d| tokenize(d)).collect();
    let doc_lens: Vec<f32> = tokenized.iter().map(|t| t.len() as f32).collect();
    let avg_len = doc_lens.iter().sum::<f32>() / doc_lens.len() as f32;
    let n = tokenized.len() as f32;

    let mut scores = vec![0.0f32; documents.len()];
    for term in &query_terms {
        let doc_freq = tokenized.iter().filter(|d| d.contains(term)).count() as f32;
        if doc_freq == 0.0 {
            continue;
        }
        // BM25 idf with the +1 floor so a term present in every document
        // still contributes a small positive weight.
        let idf = ((n - doc_freq + 0.5) / (doc_freq + 0.5) + 1.0).ln();

        for (i, doc) in tokenized.iter().enumerate() {
            let term_freq = doc.iter().filter(|w| *w == term).count() as f32;
            if term_freq == 0.0 {
                continue;
            }
            let len_norm = 1.0 - B + B * (doc_lens[i] / avg_len.max(1.0));
            let numerator = term_freq * (K1 + 1.0);
            let denominator = term_freq + K1 * len_norm;
            scores[i] += idf * (numerator / denominator);
        }
    }
    scores
}

/// Min-max normalizes scores into `[0, 1]`. A flat input (all equal)
/// normalizes to all zeros.
pub fn normalize(scores: &[f32]) -> Vec<f32> {
    let max = scores.iter().cloned().fold(f32::MIN, f32::max);
    let min = scores.iter().cloned().fold(f32::MAX, f32::min);
    let range = max - min;
    if range <= f32::EPSILON {
        return vec![0.0; scores.len()];
    }
    scores.iter().map(|s| (s - min) / range).collect()
}
