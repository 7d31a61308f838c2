use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum InterventionError {
    #[error("intervention item {0} not found")]
    NotFound(Uuid),

    #[error("intervention item {0} is not pending or in progress")]
    NotResolvable(Uuid),
}

pub type Result<T> = std::result::Result<T, InterventionError>;
