use thiserror::Error;

#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("store error: {0}")]
    Store(#[from] lyra_store::StoreError),

    #[error("no handler registered for job kind {0:?}")]
    NoHandler(lyra_core::JobKind),

    #[error("job {0} not found")]
    JobNotFound(uuid::Uuid),
}

pub type Result<T> = std::result::Result<T, SchedulerError>;
