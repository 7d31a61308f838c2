use serde::Deserialize;

/// How a subsequent SERP page is requested: an `offset` query param
/// counting results, or a `page` query param counting pages (spec 4.5).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaginationStyle {
    Offset,
    Page,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SerpSelectors {
    pub result_container: String,
    pub title: String,
    pub url: String,
    pub snippet: String,
    #[serde(default)]
    pub diagnostic: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CaptchaSignature {
    /// Case-sensitive substring or CSS selector match (selector wins
    /// when it compiles; otherwise treated as a raw body substring).
    pub pattern: String,
    pub provider_hint: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EngineConfig {
    pub name: String,
    pub url_template: String,
    pub results_per_page: usize,
    pub pagination_style: PaginationStyle,
    pub selectors: SerpSelectors,
    #[serde(default)]
    pub captcha_signatures: Vec<CaptchaSignature>,
    /// Relative draw weight before policy/breaker adjustment (spec 4.5:
    /// "engine weights come from policy and breaker health").
    #[serde(default = "default_weight")]
    pub base_weight: f64,
}

fn default_weight() -> f64 {
    1.0
}

#[derive(Debug, Clone)]
pub struct SearchItem {
    pub title: String,
    pub url: String,
    pub snippet: String,
    pub rank: usize,
}

#[derive(Debug, Clone)]
pub struct PaginationInfo {
    pub page: usize,
    pub has_more: bool,
    pub novelty_rate: f32,
}

#[derive(Debug, Clone)]
pub struct SearchOptions {
    pub time_range: Option<String>,
    pub region: Option<String>,
    pub serp_max_pages: usize,
    pub budget_pages: usize,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            time_range: None,
            region: None,
            serp_max_pages: 3,
            budget_pages: 10,
        }
    }
}

#[derive(Debug, Clone)]
pub enum SearchOutcome {
    Results {
        items: Vec<SearchItem>,
        pagination: PaginationInfo,
    },
    CaptchaDetected {
        engine: String,
        provider_hint: String,
        intervention_id: uuid::Uuid,
    },
}
