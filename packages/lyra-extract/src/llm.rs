use async_trait::async_trait;

use crate::error::Result;

/// Abstracts the LLM calls the extraction pipeline needs (spec 4.11:
/// "an LLM call returns a list of normalized claim strings"; "a
/// separate prompt determines whether a link in text constitutes a
/// citation"). Mirrors the teacher's `AI` trait shape so a real
/// provider implementation and a test double can both satisfy it.
#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn extract_claims(&self, fragment_text: &str) -> Result<Vec<String>>;
    async fn is_citation(&self, anchor_text: &str, surrounding_context: &str, target_url: &str) -> Result<bool>;
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;
}

/// Deterministic stand-in used by tests and by any caller that has not
/// yet wired a real provider. Embeddings are a toy bag-of-characters
/// hash so cosine similarity behaves sensibly on near-duplicate
/// strings without needing a real model.
pub struct DeterministicTestLlmClient;

#[async_trait]
impl LlmClient for DeterministicTestLlmClient {
    async fn extract_claims(&self, fragment_text: &str) -> Result<Vec<String>> {
        Ok(fragment_text
            .split('.')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect())
    }

    async fn is_citation(&self, _anchor_text: &str, surrounding_context: &str, _target_url: &str) -> Result<bool> {
        let lowered = surrounding_context.to_lowercase();
        Ok(lowered.contains("see ") || lowered.contains("according to") || lowered.contains("cited"))
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        const DIM: usize = 32;
        let mut v = vec![0.0f32; DIM];
        for (i, byte) in text.as_bytes().iter().enumerate() {
            v[i % DIM] += *byte as f32;
        }
        Ok(v)
    }
}
