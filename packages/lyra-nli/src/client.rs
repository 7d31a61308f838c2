use async_trait::async_trait;
use lyra_core::NliRelation;
use serde::{Deserialize, Serialize};

use crate::error::{NliError, Result};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NliPrediction {
    pub label: NliRelation,
    pub confidence: f32,
}

/// Calls the NLI service with `premise=fragment_text,
/// hypothesis=claim_text` (spec 4.12).
#[async_trait]
pub trait NliClient: Send + Sync {
    async fn classify(&self, premise: &str, hypothesis: &str) -> Result<NliPrediction>;
}

#[derive(Serialize)]
struct NliRequest<'a> {
    premise: &'a str,
    hypothesis: &'a str,
}

#[derive(Deserialize)]
struct NliResponse {
    label: String,
    confidence: f32,
}

pub struct HttpNliClient {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpNliClient {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: endpoint.into(),
        }
    }
}

#[async_trait]
impl NliClient for HttpNliClient {
    async fn classify(&self, premise: &str, hypothesis: &str) -> Result<NliPrediction> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(&NliRequest { premise, hypothesis })
            .send()
            .await?
            .json::<NliResponse>()
            .await?;

        let label = match response.label.to_lowercase().as_str() {
            "entailment" | "supports" => NliRelation::Supports,
            "contradiction" | "refutes" => NliRelation::Refutes,
            "neutral" => NliRelation::Neutral,
            other => return Err(NliError::UnknownLabel(other.to_string())),
        };
        Ok(NliPrediction {
            label,
            confidence: response.confidence,
        })
    }
}

/// Deterministic stand-in for tests: a fragment "supports" a claim
/// when the claim text is a substring of the fragment, "refutes" when
/// the fragment contains an explicit negation of the claim, and is
/// otherwise "neutral".
pub struct DeterministicTestNliClient;

#[async_trait]
impl NliClient for DeterministicTestNliClient {
    async fn classify(&self, premise: &str, hypothesis: &str) -> Result<NliPrediction> {
        let premise_lower = premise.to_lowercase();
        let hypothesis_lower = hypothesis.to_lowercase();
        if premise_lower.contains(&format!("not {hypothesis_lower}"))
            || premise_lower.contains("false")
        {
            return Ok(NliPrediction {
                label: NliRelation::Refutes,
                confidence: 0.9,
            });
        }
        if premise_lower.contains(&hypothesis_lower) {
            return Ok(NliPrediction {
                label: NliRelation::Supports,
                confidence: 0.85,
            });
        }
        Ok(NliPrediction {
            label: NliRelation::Neutral,
            confidence: 0.5,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn substring_match_supports() {
        let client = DeterministicTestNliClient;
        let pred = client
            .classify("Water boils at 100 degrees celsius at sea level.", "water boils at 100 degrees celsius")
            .await
            .unwrap();
        assert_eq!(pred.label, NliRelation::Supports);
    }

    #[tokio::test]
    async fn negation_refutes() {
        let client = DeterministicTestNliClient;
        let pred = client
            .classify("It is false that water boils at 50 degrees.", "water boils at 50 degrees")
            .await
            .unwrap();
        assert_eq!(pred.label, NliRelation::Refutes);
    }

    #[tokio::test]
    async fn unrelated_text_is_neutral() {
        let client = DeterministicTestNliClient;
        let pred = client.classify("The cat sat on the mat.", "water boils at 100 degrees").await.unwrap();
        assert_eq!(pred.label, NliRelation::Neutral);
    }
}
