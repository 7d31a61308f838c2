//! HTTP-backed implementation of `lyra_extract::LlmClient`, the one
//! concrete provider this binary wires in. Mirrors `lyra-nli`'s
//! `HttpNliClient`: a thin `reqwest` client posting JSON against a
//! configured base URL, with request/response shapes private to this
//! module.

use async_trait::async_trait;
use lyra_extract::{ExtractError, LlmClient, Result};
use serde::{Deserialize, Serialize};

pub struct HttpLlmClient {
    client: reqwest::Client,
    base_url: String,
}

impl HttpLlmClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
        }
    }
}

#[derive(Serialize)]
struct ExtractClaimsRequest<'a> {
    fragment_text: &'a str,
}

#[derive(Deserialize)]
struct ExtractClaimsResponse {
    claims: Vec<String>,
}

#[derive(Serialize)]
struct IsCitationRequest<'a> {
    anchor_text: &'a str,
    surrounding_context: &'a str,
    target_url: &'a str,
}

#[derive(Deserialize)]
struct IsCitationResponse {
    is_citation: bool,
}

#[derive(Serialize)]
struct EmbedRequest<'a> {
    text: &'a str,
}

#[derive(Deserialize)]
struct EmbedResponse {
    embedding: Vec<f32>,
}

fn map_err(err: reqwest::Error) -> ExtractError {
    ExtractError::Llm(err.to_string())
}

#[async_trait]
impl LlmClient for HttpLlmClient {
    async fn extract_claims(&self, fragment_text: &str) -> Result<Vec<String>> {
        let response: ExtractClaimsResponse = self
            .client
            .post(format!("{}/extract_claims", self.base_url))
            .json(&ExtractClaimsRequest { fragment_text })
            .send()
            .await
            .map_err(map_err)?
            .json()
            .await
            .map_err(map_err)?;
        Ok(response.claims)
    }

    async fn is_citation(&self, anchor_text: &str, surrounding_context: &str, target_url: &str) -> Result<bool> {
        let response: IsCitationResponse = self
            .client
            .post(format!("{}/is_citation", self.base_url))
            .json(&IsCitationRequest {
                anchor_text,
                surrounding_context,
                target_url,
            })
            .send()
            .await
            .map_err(map_err)?
            .json()
            .await
            .map_err(map_err)?;
        Ok(response.is_citation)
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let response: EmbedResponse = self
            .client
            .post(format!("{}/embed", self.base_url))
            .json(&EmbedRequest { text })
            .send()
            .await
            .map_err(map_err)?
            .json()
            .await
            .map_err(map_err)?;
        Ok(response.embedding)
    }
}
