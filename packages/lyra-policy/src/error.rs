use thiserror::Error;

#[derive(Debug, Error)]
pub enum PolicyError {
    #[error("invalid override pattern '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: &'static str },

    #[error("domain '{0}' is denied by policy")]
    Denied(String),
}

pub type Result<T> = std::result::Result<T, PolicyError>;
