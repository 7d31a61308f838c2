use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("pdf extraction failed: {0}")]
    Pdf(String),
    #[error("llm call failed: {0}")]
    Llm(String),
    #[error("academic api call failed: {0}")]
    AcademicApi(#[from] reqwest::Error),
}

pub type Result<T> = std::result::Result<T, ExtractError>;
