use thiserror::Error;

use crate::challenge::ChallengeKind;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("domain policy denied fetch of {0}")]
    PolicyDenied(String),

    #[error("circuit breaker open for {0}")]
    BreakerOpen(String),

    #[error("challenge detected: {0:?}")]
    ChallengeDetected(ChallengeKind),

    #[error("url blocked by SSRF guard: {0}")]
    Blocked(String),

    #[error("url parse error: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("transient fetch failure for {url}: {source}")]
    Transient {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("permanent fetch failure for {url}: status {status}")]
    Permanent { url: String, status: u16 },

    #[error("headful fetch backend not configured")]
    HeadfulUnavailable,

    #[error("archive write failed: {0}")]
    Archive(String),
}

pub type Result<T> = std::result::Result<T, FetchError>;
