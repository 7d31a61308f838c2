//! Per-engine SERP search with declared selectors, weighted engine
//! draw, single-tab-pool discipline, CAPTCHA routing, and
//! novelty-rate-bounded pagination (C5).

pub mod config;
pub mod engine_select;
pub mod error;
pub mod novelty;
pub mod parser;
pub mod search;
pub mod tabpool;
pub mod types;

pub use config::EngineRegistry;
pub use error::{Result, SearchError};
pub use search::SearchProvider;
pub use types::{
    CaptchaSignature, EngineConfig, PaginationInfo, PaginationStyle, SearchItem, SearchOptions,
    SearchOutcome, SerpSelectors,
};
