use thiserror::Error;

#[derive(Debug, Error)]
pub enum SqlError {
    #[error("statement denied: {0}")]
    Forbidden(String),

    #[error("input must be a single statement")]
    MultiStatement,

    #[error("query exceeded its execution budget")]
    Timeout,

    #[error("unknown view {0:?}")]
    UnknownView(String),

    #[error("missing required view parameter {0:?}")]
    MissingParam(String),

    #[error("database error: {0}")]
    Database(String),

    #[error("engine worker channel closed")]
    ChannelClosed,
}

pub type Result<T> = std::result::Result<T, SqlError>;
