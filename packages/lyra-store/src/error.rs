use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("invalid stored json in column: {0}")]
    CorruptJson(String),

    #[error("{0} {1} not found")]
    NotFound(&'static str, Uuid),

    #[error("domain pattern is invalid: {0}")]
    InvalidPattern(String),
}

pub type Result<T> = std::result::Result<T, StoreError>;
