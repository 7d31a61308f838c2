use std::collections::HashMap;

use async_trait::async_trait;
use serde::Deserialize;

use crate::error::{ExtractError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CitationSource {
    Extraction,
    SemanticScholar,
    OpenAlex,
}

#[derive(Debug, Clone)]
pub struct CitationEdge {
    pub citing_url: String,
    pub cited_url: String,
    pub source: CitationSource,
}

/// Academic citation-graph lookups (spec 4.11: "Academic API
/// integrations (Semantic Scholar, OpenAlex) provide citation_source
/// edges").
#[async_trait]
pub trait AcademicCitationApi: Send + Sync {
    fn source(&self) -> CitationSource;
    async fn citations_for(&self, url: &str) -> Result<Vec<String>>;
}

#[derive(Deserialize)]
struct SemanticScholarResponse {
    #[serde(default)]
    citations: Vec<SemanticScholarCitation>,
}

#[derive(Deserialize)]
struct SemanticScholarCitation {
    url: Option<String>,
}

pub struct SemanticScholarClient {
    client: reqwest::Client,
    base_url: String,
}

impl SemanticScholarClient {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: "https://api.semanticscholar.org/graph/v1/paper".to_string(),
        }
    }
}

impl Default for SemanticScholarClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AcademicCitationApi for SemanticScholarClient {
    fn source(&self) -> CitationSource {
        CitationSource::SemanticScholar
    }

    async fn citations_for(&self, url: &str) -> Result<Vec<String>> {
        let endpoint = format!("{}/URL:{}/citations", self.base_url, url);
        let response = self
            .client
            .get(&endpoint)
            .send()
            .await
            .map_err(ExtractError::AcademicApi)?;
        if !response.status().is_success() {
            return Ok(Vec::new());
        }
        let parsed: SemanticScholarResponse = response.json().await.map_err(ExtractError::AcademicApi)?;
        Ok(parsed.citations.into_iter().filter_map(|c| c.url).collect())
    }
}

#[derive(Deserialize)]
struct OpenAlexResponse {
    #[serde(default)]
    results: Vec<OpenAlexWork>,
}

#[derive(Deserialize)]
struct OpenAlexWork {
    id: Option<String>,
}

pub struct OpenAlexClient {
    client: reqwest::Client,
    base_url: String,
}

impl OpenAlexClient {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: "https://api.openalex.org/works".to_string(),
        }
    }
}

impl Default for OpenAlexClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AcademicCitationApi for OpenAlexClient {
    fn source(&self) -> CitationSource {
        CitationSource::OpenAlex
    }

    async fn citations_for(&self, url: &str) -> Result<Vec<String>> {
        let endpoint = format!("{}?filter=cites:{}", self.base_url, url);
        let response = self
            .client
            .get(&endpoint)
            .send()
            .await
            .map_err(ExtractError::AcademicApi)?;
        if !response.status().is_success() {
            return Ok(Vec::new());
        }
        let parsed: OpenAlexResponse = response.json().await.map_err(ExtractError::AcademicApi)?;
        Ok(parsed.results.into_iter().filter_map(|w| w.id).collect())
    }
}

/// Merges edges observed from multiple citation sources for the same
/// (citing, cited) pair: `semantic_scholar` wins when both observed it,
/// first-observed otherwise wins outright (spec 4.11: "when the same
/// citing→cited pair is observed from both, prefer semantic_scholar
/// (first observed)").
pub fn merge_citation_edges(edges: Vec<CitationEdge>) -> Vec<CitationEdge> {
    let mut by_pair: HashMap<(String, String), CitationEdge> = HashMap::new();
    for edge in edges {
        let key = (edge.citing_url.clone(), edge.cited_url.clone());
        match by_pair.get(&key) {
            None => {
                by_pair.insert(key, edge);
            }
            Some(existing) => {
                if existing.source != CitationSource::SemanticScholar && edge.source == CitationSource::SemanticScholar
                {
                    by_pair.insert(key, edge);
                }
                // Otherwise keep whichever was observed first.
            }
        }
    }
    by_pair.into_values().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn edge(citing: &str, cited: &str, source: CitationSource) -> CitationEdge {
        CitationEdge {
            citing_url: citing.to_string(),
            cited_url: cited.to_string(),
            source,
        }
    }

    #[test]
    fn prefers_semantic_scholar_when_both_sources_observe_pair() {
        let edges = vec![
            edge("a", "b", CitationSource::OpenAlex),
            edge("a", "b", CitationSource::SemanticScholar),
        ];
        let merged = merge_citation_edges(edges);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].source, CitationSource::SemanticScholar);
    }

    #[test]
    fn distinct_pairs_are_both_kept() {
        let edges = vec![
            edge("a", "b", CitationSource::OpenAlex),
            edge("a", "c", CitationSource::OpenAlex),
        ];
        assert_eq!(merge_citation_edges(edges).len(), 2);
    }

    #[test]
    fn first_observed_wins_when_neither_is_semantic_scholar() {
        let edges = vec![
            edge("a", "b", CitationSource::OpenAlex),
            edge("a", "b", CitationSource::Extraction),
        ];
        let merged = merge_citation_edges(edges);
        assert_eq!(merged[0].source, CitationSource::OpenAlex);
    }
}
