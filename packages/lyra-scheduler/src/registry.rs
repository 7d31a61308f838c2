use std::sync::Arc;

use dashmap::DashMap;
use futures::future::BoxFuture;
use lyra_core::JobKind;
use lyra_store::Job;
use tokio_util::sync::CancellationToken;

/// What a job handler produced. `AwaitingAuth` lets a handler escalate to a
/// human-intervention wait without the scheduler needing to know why (spec
/// 4.8: "`awaiting_auth` does not hold a slot; it is re-queued on
/// intervention resolution").
#[derive(Debug, Clone)]
pub enum JobOutcome {
    Done(serde_json::Value),
    AwaitingAuth,
}

pub type JobResult = anyhow::Result<JobOutcome>;

/// Executes one job. Handlers are supplied by the binary that wires up
/// fetch/search/extract/etc. — this crate only knows how to schedule them.
pub type JobHandler = Arc<dyn Fn(Job, CancellationToken) -> BoxFuture<'static, JobResult> + Send + Sync>;

/// Maps a [`JobKind`] to the handler that executes it. Mirrors the
/// job-type-to-deserializer registry shape used elsewhere in this codebase,
/// specialized to dispatch rather than deserialize.
#[derive(Default)]
pub struct HandlerRegistry {
    handlers: DashMap<JobKind, JobHandler>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, kind: JobKind, handler: JobHandler) {
        self.handlers.insert(kind, handler);
    }

    pub fn get(&self, kind: JobKind) -> Option<JobHandler> {
        self.handlers.get(&kind).map(|entry| entry.value().clone())
    }
}
