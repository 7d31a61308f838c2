use std::sync::Arc;

use lyra_breaker::BreakerRegistry;
use lyra_fetch::{FetchOptions, FetchOutcome, Fetcher};
use lyra_intervention::{InterventionItem, InterventionQueue, InterventionType};
use lyra_policy::PolicyResolver;
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::EngineRegistry;
use crate::engine_select::select_engine;
use crate::error::{Result, SearchError};
use crate::novelty::{should_continue, NoveltyTracker};
use crate::parser::{detect_captcha, parse_results};
use crate::tabpool::SingleTabPool;
use crate::types::{EngineConfig, PaginationInfo, PaginationStyle, SearchItem, SearchOptions, SearchOutcome};

/// Builds the templated SERP URL for `page` (1-indexed) against
/// `engine`'s declared pagination style.
fn build_url(engine: &EngineConfig, query: &str, page: usize) -> String {
    let encoded_query = urlencoding_lite(query);
    let offset = match engine.pagination_style {
        PaginationStyle::Offset => (page - 1) * engine.results_per_page,
        PaginationStyle::Page => page,
    };
    engine
        .url_template
        .replace("{query}", &encoded_query)
        .replace("{offset}", &offset.to_string())
}

/// Minimal percent-encoding for query terms; full RFC 3986 encoding is
/// left to whatever HTTP client ultimately sends the request, but the
/// template substitution itself must not leave raw spaces in the URL.
fn urlencoding_lite(s: &str) -> String {
    s.chars()
        .map(|c| match c {
            ' ' => "+".to_string(),
            '"' => "%22".to_string(),
            '&' => "%26".to_string(),
            c => c.to_string(),
        })
        .collect()
}

pub struct SearchProvider {
    registry: EngineRegistry,
    policy: Arc<PolicyResolver>,
    breakers: Arc<BreakerRegistry>,
    fetcher: Arc<Fetcher>,
    interventions: Arc<dyn InterventionQueue>,
    tab_pool: SingleTabPool,
}

impl SearchProvider {
    pub fn new(
        registry: EngineRegistry,
        policy: Arc<PolicyResolver>,
        breakers: Arc<BreakerRegistry>,
        fetcher: Arc<Fetcher>,
        interventions: Arc<dyn InterventionQueue>,
    ) -> Self {
        Self {
            registry,
            policy,
            breakers,
            fetcher,
            interventions,
            tab_pool: SingleTabPool::new(),
        }
    }

    /// Fetches and parses a single SERP page for the named engine
    /// (spec 4.5: `search(query, engine, serp_page, options)`).
    pub async fn search(
        &self,
        task_id: Uuid,
        query: &str,
        engine_name: &str,
        serp_page: usize,
    ) -> Result<SearchOutcome> {
        let engine = self.registry.get(engine_name)?;
        let url = build_url(engine, query, serp_page);

        // Every SERP navigation serializes on the single logical tab,
        // regardless of whether this particular fetch ends up taking
        // the HTTP or headful path (spec 4.5 single-tab-pool rule).
        let _tab = self.tab_pool.acquire().await;

        let outcome = self
            .fetcher
            .fetch(&url, task_id, &FetchOptions::new())
            .await?;

        let body = match outcome {
            FetchOutcome::Success(result) => result.body,
            FetchOutcome::Blocked(blocked) => {
                warn!(engine = engine_name, "serp fetch blocked upstream of engine-level captcha check");
                return Ok(SearchOutcome::CaptchaDetected {
                    engine: engine_name.to_string(),
                    provider_hint: format!("{:?}", blocked.challenge),
                    intervention_id: blocked.intervention_id,
                });
            }
        };

        if let Some(provider_hint) = detect_captcha(engine, &body) {
            let item = InterventionItem::new(
                task_id,
                engine_name,
                &url,
                InterventionType::Captcha,
                format!("captcha signature matched for engine {engine_name}: {provider_hint}"),
            );
            let item = self
                .interventions
                .enqueue(item)
                .await
                .map_err(|e| SearchError::Intervention(e.to_string()))?;
            return Ok(SearchOutcome::CaptchaDetected {
                engine: engine_name.to_string(),
                provider_hint: provider_hint.to_string(),
                intervention_id: item.id,
            });
        }

        let items = parse_results(engine, &body)?;
        Ok(SearchOutcome::Results {
            items,
            pagination: PaginationInfo {
                page: serp_page,
                has_more: !items.is_empty(),
                novelty_rate: 1.0,
            },
        })
    }

    /// Picks the next engine for `query` via the weighted, health-aware
    /// draw (spec 4.5).
    pub fn choose_engine(&self) -> Result<String> {
        select_engine(&self.registry, &self.policy, &self.breakers).map(|e| e.name.clone())
    }

    /// Traverses multiple SERP pages for one engine, stopping at
    /// `options.serp_max_pages` or when the novelty rate collapses.
    pub async fn search_paginated(
        &self,
        task_id: Uuid,
        query: &str,
        engine_name: &str,
        options: &SearchOptions,
    ) -> Result<Vec<SearchItem>> {
        let mut tracker = NoveltyTracker::new();
        let mut novelty_rates = Vec::new();
        let mut all_items = Vec::new();
        let mut page = 1;

        loop {
            let outcome = self.search(task_id, query, engine_name, page).await?;
            let items = match outcome {
                SearchOutcome::Results { items, .. } => items,
                SearchOutcome::CaptchaDetected { .. } => return Ok(all_items),
            };
            if items.is_empty() {
                break;
            }
            let rate = tracker.observe(&items);
            novelty_rates.push(rate);
            info!(engine = engine_name, page, novelty_rate = rate, "serp page traversed");
            all_items.extend(items);

            if page >= options.budget_pages {
                break;
            }
            if !should_continue(&novelty_rates, page, options.serp_max_pages) {
                break;
            }
            page += 1;
        }
        Ok(all_items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{PaginationStyle, SerpSelectors};

    fn engine() -> EngineConfig {
        EngineConfig {
            name: "duckduckgo".to_string(),
            url_template: "https://duckduckgo.com/html/?q={query}&s={offset}".to_string(),
            results_per_page: 10,
            pagination_style: PaginationStyle::Offset,
            selectors: SerpSelectors {
                result_container: "div.result".to_string(),
                title: "a".to_string(),
                url: "a".to_string(),
                snippet: "p".to_string(),
                diagnostic: None,
            },
            captcha_signatures: vec![],
            base_weight: 1.0,
        }
    }

    #[test]
    fn builds_offset_url_for_page_two() {
        let url = build_url(&engine(), "rust ownership", 2);
        assert_eq!(url, "https://duckduckgo.com/html/?q=rust+ownership&s=10");
    }

    #[test]
    fn builds_offset_url_for_page_one() {
        let url = build_url(&engine(), "rust", 1);
        assert_eq!(url, "https://duckduckgo.com/html/?q=rust&s=0");
    }
}
