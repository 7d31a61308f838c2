use thiserror::Error;
use uuid::Uuid;

/// Internal failure kinds. Never crosses the tool boundary directly —
/// [`ErrorBody::from_error`] replaces it with a generic message plus an
/// `error_id` indexing the full detail in the trace log (spec 4.16:
/// "exception messages are replaced with generic error bodies carrying an
/// error_id that indexes a secure internal log").
#[derive(Debug, Error)]
pub enum ToolError {
    #[error("unknown task {0}")]
    UnknownTask(Uuid),

    #[error("unknown view {0:?}")]
    UnknownView(String),

    #[error("unknown intervention item {0}")]
    UnknownInterventionItem(Uuid),

    #[error("unknown calibration version {0}")]
    UnknownCalibrationVersion(i64),

    #[error("unrecognized feedback action {0:?}")]
    UnrecognizedFeedbackAction(String),

    #[error(transparent)]
    Scheduler(#[from] lyra_scheduler::SchedulerError),

    #[error(transparent)]
    Store(#[from] lyra_store::StoreError),

    #[error(transparent)]
    Sql(#[from] lyra_sql::SqlError),

    #[error(transparent)]
    Intervention(#[from] lyra_intervention::InterventionError),
}

pub type Result<T> = std::result::Result<T, ToolError>;

/// What a tool response carries in place of an exception (spec 4.16 /
/// section 7: "user-visible failures are surfaced only via tool responses
/// with bounded detail; internal tracebacks are never emitted across the
/// tool boundary").
#[derive(Debug, Clone, serde::Serialize)]
pub struct ErrorBody {
    pub error_id: Uuid,
    pub message: &'static str,
}

impl ErrorBody {
    /// Logs the real error under `error_id` via `tracing::error!` and
    /// returns only a generic, kind-classified message. The two are
    /// correlated solely by `error_id` — the client never sees `detail`.
    pub fn from_error(err: &ToolError) -> Self {
        let error_id = lyra_core::new_id();
        tracing::error!(%error_id, detail = %err, "tool call failed");

        let message = match err {
            ToolError::UnknownTask(_) => "no such task",
            ToolError::UnknownView(_) => "no such view",
            ToolError::UnknownInterventionItem(_) => "no such intervention item",
            ToolError::UnknownCalibrationVersion(_) => "no such calibration version",
            ToolError::UnrecognizedFeedbackAction(_) => "unrecognized feedback action",
            ToolError::Sql(lyra_sql::SqlError::Forbidden(_)) => "statement denied",
            ToolError::Sql(lyra_sql::SqlError::MultiStatement) => "input must be a single statement",
            ToolError::Sql(lyra_sql::SqlError::Timeout) => "timeout",
            ToolError::Sql(lyra_sql::SqlError::UnknownView(_)) => "no such view",
            ToolError::Sql(lyra_sql::SqlError::MissingParam(_)) => "missing required parameter",
            _ => "internal error",
        };

        Self { error_id, message }
    }
}
