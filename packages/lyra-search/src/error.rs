use thiserror::Error;

#[derive(Debug, Error)]
pub enum SearchError {
    #[error("unknown search engine: {0}")]
    UnknownEngine(String),
    #[error("engine config for {0} failed to parse: {1}")]
    ConfigParse(String, String),
    #[error("selector {selector:?} on engine {engine} failed to compile: {reason}")]
    BadSelector {
        engine: String,
        selector: String,
        reason: String,
    },
    #[error("no engines are currently usable (policy/breaker exhausted)")]
    NoUsableEngines,
    #[error("fetch of SERP page failed: {0}")]
    Fetch(#[from] lyra_fetch::FetchError),
    #[error("intervention enqueue failed: {0}")]
    Intervention(String),
}

pub type Result<T> = std::result::Result<T, SearchError>;
