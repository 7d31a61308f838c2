use thiserror::Error;

#[derive(Debug, Error)]
pub enum NliError {
    #[error("nli service request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("nli service returned an unexpected label: {0}")]
    UnknownLabel(String),
}

pub type Result<T> = std::result::Result<T, NliError>;
