use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use lyra_core::{JobKind, StopMode};
use lyra_intervention::{DomainResolved, ResolveAction};
use lyra_store::{EvidenceStore, Job, JobState};
use tokio::sync::{broadcast, Notify};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::{Result, SchedulerError};
use crate::queue::{QueuedJob, ReadyQueue};
use crate::registry::{HandlerRegistry, JobHandler, JobOutcome};
use crate::slots::Slots;

const OVERALL_CONCURRENCY: usize = 4;
const DISPATCH_IDLE_POLL: Duration = Duration::from_millis(250);

fn domain_of(input: &serde_json::Value) -> Option<String> {
    input.get("domain").and_then(|v| v.as_str()).map(str::to_string)
}

fn to_queued(job: &Job) -> QueuedJob {
    QueuedJob {
        id: job.id,
        kind: job.kind,
        priority: job.priority,
        enqueued_at: job.enqueued_at,
        domain: domain_of(&job.input),
        task_id: job.task_id,
    }
}

/// Sole coordinator of job execution (spec 4.8: "the scheduler is the sole
/// coordinator; direct spawning from components is forbidden"). Jobs live
/// durably in `EvidenceStore`; this struct holds only the working state
/// needed to dispatch them — the ready-to-run heap, concurrency slots, and
/// per-job cancellation handles.
pub struct Scheduler {
    store: EvidenceStore,
    registry: HandlerRegistry,
    slots: Slots,
    ready: ReadyQueue,
    cancel_tokens: DashMap<Uuid, CancellationToken>,
    stopped_tasks: DashMap<Uuid, StopMode>,
    notify: Notify,
}

impl Scheduler {
    pub fn new(store: EvidenceStore) -> Arc<Self> {
        Arc::new(Self {
            store,
            registry: HandlerRegistry::new(),
            slots: Slots::new(OVERALL_CONCURRENCY),
            ready: ReadyQueue::new(),
            cancel_tokens: DashMap::new(),
            stopped_tasks: DashMap::new(),
            notify: Notify::new(),
        })
    }

    pub fn register_handler(&self, kind: JobKind, handler: JobHandler) {
        self.registry.register(kind, handler);
    }

    /// Rebuilds the in-memory ready queue from durably `queued` jobs. Call
    /// once at startup so a restart picks up where it left off, rather than
    /// depending on enqueue() having been called this process's lifetime.
    pub async fn recover(&self) -> Result<usize> {
        let queued = self.store.jobs_in_state(JobState::Queued).await?;
        let count = queued.len();
        for job in &queued {
            self.ready.push(to_queued(job));
        }
        Ok(count)
    }

    pub async fn enqueue(
        &self,
        kind: JobKind,
        input: serde_json::Value,
        parent_id: Option<Uuid>,
        task_id: Option<Uuid>,
    ) -> Result<Job> {
        let job = self.store.insert_job(kind, kind.priority(), input, parent_id, task_id).await?;
        self.ready.push(to_queued(&job));
        self.notify.notify_one();
        Ok(job)
    }

    /// `stop_task(mode)` (spec 4.8). `graceful` only stops accepting new
    /// dispatch for the task's jobs; `immediate` additionally cancels its
    /// running jobs; `full` additionally drops its still-queued jobs.
    pub async fn stop_task(&self, task_id: Uuid, mode: StopMode) -> Result<()> {
        self.stopped_tasks.insert(task_id, mode);
        self.store.stop_task(task_id).await?;

        if matches!(mode, StopMode::Immediate | StopMode::Full) {
            for job in self.store.jobs_for_task(task_id).await? {
                if job.state == JobState::Running {
                    if let Some(token) = self.cancel_tokens.get(&job.id) {
                        token.cancel();
                    }
                }
            }
        }

        if mode == StopMode::Full {
            for stale in self.ready.remove_for_task(task_id) {
                self.store.delete_queued_job(stale.id).await?;
            }
            for job in self.store.jobs_for_task(task_id).await? {
                if job.state == JobState::Queued {
                    self.store.delete_queued_job(job.id).await?;
                }
            }
        }

        Ok(())
    }

    fn task_accepts_new_jobs(&self, task_id: Option<Uuid>) -> bool {
        match task_id {
            Some(id) => !self.stopped_tasks.contains_key(&id),
            None => true,
        }
    }

    /// One dispatch pass: pops ready jobs and starts every one for which a
    /// slot is available, re-queuing the rest. Lower-priority jobs can start
    /// ahead of a higher-priority one that's blocked on domain or group
    /// contention, as long as an overall slot remains.
    async fn dispatch_ready(self: &Arc<Self>) {
        let mut held = Vec::new();
        while let Some(queued) = self.ready.pop() {
            if !self.task_accepts_new_jobs(queued.task_id) {
                debug!(job_id = %queued.id, "dropping job for stopped task");
                continue;
            }

            let group = queued.kind.exclusion_group();
            match self.slots.try_acquire(queued.domain.as_deref(), group) {
                Some(guard) => {
                    let scheduler = Arc::clone(self);
                    let job_id = queued.id;
                    tokio::spawn(async move {
                        scheduler.run_job(job_id, guard).await;
                    });
                }
                None => held.push(queued),
            }
        }
        for queued in held {
            self.ready.push(queued);
        }
    }

    async fn run_job(self: Arc<Self>, job_id: Uuid, guard: crate::slots::SlotGuard) {
        let job = match self.store.get_job(job_id).await {
            Ok(Some(job)) => job,
            Ok(None) => {
                warn!(%job_id, "job vanished before it could run");
                return;
            }
            Err(err) => {
                warn!(%job_id, %err, "failed to load job for execution");
                return;
            }
        };

        let handler = match self.registry.get(job.kind) {
            Some(handler) => handler,
            None => {
                warn!(?job.kind, %job_id, "no handler registered, failing job");
                let _ = self
                    .store
                    .set_job_state(job_id, JobState::Failed, Some(serde_json::json!({"error": SchedulerError::NoHandler(job.kind).to_string()})))
                    .await;
                return;
            }
        };

        let token = CancellationToken::new();
        self.cancel_tokens.insert(job_id, token.clone());
        let _ = self.store.set_job_state(job_id, JobState::Running, None).await;

        let timeout = Duration::from_secs(job.kind.timeout_secs());
        let outcome = tokio::select! {
            result = handler(job.clone(), token.clone()) => result,
            _ = tokio::time::sleep(timeout) => Err(anyhow::anyhow!("job timed out after {}s", job.kind.timeout_secs())),
        };

        self.cancel_tokens.remove(&job_id);
        let was_cancelled = token.is_cancelled();
        drop(guard);

        match outcome {
            Ok(JobOutcome::Done(output)) => {
                let _ = self.store.set_job_state(job_id, JobState::Done, Some(output)).await;
            }
            Ok(JobOutcome::AwaitingAuth) => {
                let _ = self.store.set_job_state(job_id, JobState::AwaitingAuth, None).await;
            }
            Err(err) if was_cancelled => {
                debug!(%job_id, %err, "job cancelled");
                let _ = self.store.set_job_state(job_id, JobState::Cancelled, None).await;
            }
            Err(err) => {
                let _ = self
                    .store
                    .set_job_state(job_id, JobState::Failed, Some(serde_json::json!({"error": err.to_string()})))
                    .await;
            }
        }

        self.notify.notify_one();
    }

    /// Main loop: spawn as a background task. Wakes on enqueue, job
    /// completion, or a short idle poll (to notice jobs another process
    /// enqueued directly against the store).
    pub async fn run(self: Arc<Self>) {
        loop {
            tokio::select! {
                _ = self.notify.notified() => {}
                _ = tokio::time::sleep(DISPATCH_IDLE_POLL) => {}
            }
            self.dispatch_ready().await;
        }
    }

    /// Drains a domain-resolution broadcast (spec 4.6/4.8: "re-queued on
    /// intervention resolution"). `Solved` re-queues that domain's
    /// `awaiting_auth` jobs; `Skipped`/`Expired` fail them instead, since no
    /// usable session was captured.
    pub async fn run_resolution_listener(self: Arc<Self>, mut resolutions: broadcast::Receiver<DomainResolved>) {
        loop {
            let event = match resolutions.recv().await {
                Ok(event) => event,
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, "domain resolution listener lagged, some events dropped");
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => return,
            };

            let waiting = match self.store.jobs_in_state(JobState::AwaitingAuth).await {
                Ok(jobs) => jobs,
                Err(err) => {
                    warn!(%err, "failed to list awaiting_auth jobs for resolution");
                    continue;
                }
            };

            for job in waiting {
                if domain_of(&job.input).as_deref() != Some(event.domain.as_str()) {
                    continue;
                }
                match event.action {
                    ResolveAction::Solved => {
                        if self.store.set_job_state(job.id, JobState::Queued, None).await.is_ok() {
                            self.ready.push(to_queued(&job));
                            self.notify.notify_one();
                            info!(job_id = %job.id, domain = %event.domain, "re-queued job after domain resolution");
                        }
                    }
                    ResolveAction::Skipped | ResolveAction::Expired => {
                        let _ = self
                            .store
                            .set_job_state(job.id, JobState::Failed, Some(serde_json::json!({"error": "domain intervention was not solved"})))
                            .await;
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lyra_store::EvidenceStore;

    fn done_handler() -> JobHandler {
        Arc::new(|_job, _token| Box::pin(async { Ok(JobOutcome::Done(serde_json::json!({"ok": true}))) }))
    }

    fn awaiting_auth_handler() -> JobHandler {
        Arc::new(|_job, _token| Box::pin(async { Ok(JobOutcome::AwaitingAuth) }))
    }

    #[tokio::test]
    async fn enqueue_then_run_completes_the_job() {
        let store = EvidenceStore::in_memory().await.unwrap();
        let scheduler = Scheduler::new(store);
        scheduler.register_handler(JobKind::Fetch, done_handler());

        let job = scheduler.enqueue(JobKind::Fetch, serde_json::json!({}), None, None).await.unwrap();
        scheduler.dispatch_ready().await;

        tokio::time::sleep(Duration::from_millis(50)).await;
        let stored = scheduler.store.get_job(job.id).await.unwrap().unwrap();
        assert_eq!(stored.state, JobState::Done);
    }

    #[tokio::test]
    async fn missing_handler_fails_the_job() {
        let store = EvidenceStore::in_memory().await.unwrap();
        let scheduler = Scheduler::new(store);

        let job = scheduler.enqueue(JobKind::Nli, serde_json::json!({}), None, None).await.unwrap();
        scheduler.dispatch_ready().await;

        tokio::time::sleep(Duration::from_millis(50)).await;
        let stored = scheduler.store.get_job(job.id).await.unwrap().unwrap();
        assert_eq!(stored.state, JobState::Failed);
    }

    #[tokio::test]
    async fn awaiting_auth_outcome_does_not_hold_a_slot() {
        let store = EvidenceStore::in_memory().await.unwrap();
        let scheduler = Scheduler::new(store);
        scheduler.register_handler(JobKind::Serp, awaiting_auth_handler());

        let job = scheduler.enqueue(JobKind::Serp, serde_json::json!({}), None, None).await.unwrap();
        scheduler.dispatch_ready().await;
        tokio::time::sleep(Duration::from_millis(50)).await;

        let stored = scheduler.store.get_job(job.id).await.unwrap().unwrap();
        assert_eq!(stored.state, JobState::AwaitingAuth);
        assert!(scheduler.slots.try_acquire(None, Some("browser_headful")).is_some());
    }

    #[tokio::test]
    async fn stop_task_full_drops_queued_jobs() {
        let store = EvidenceStore::in_memory().await.unwrap();
        let scheduler = Scheduler::new(store);
        let task_id = lyra_core::new_id();

        let job = scheduler.enqueue(JobKind::Fetch, serde_json::json!({}), None, Some(task_id)).await.unwrap();
        scheduler.stop_task(task_id, StopMode::Full).await.unwrap();

        assert!(scheduler.store.get_job(job.id).await.unwrap().is_none());
        assert_eq!(scheduler.ready.len(), 0);
    }

    #[tokio::test]
    async fn stop_task_graceful_skips_dispatch_but_keeps_the_row() {
        let store = EvidenceStore::in_memory().await.unwrap();
        let scheduler = Scheduler::new(store);
        scheduler.register_handler(JobKind::Fetch, done_handler());
        let task_id = lyra_core::new_id();

        let job = scheduler.enqueue(JobKind::Fetch, serde_json::json!({}), None, Some(task_id)).await.unwrap();
        scheduler.stop_task(task_id, StopMode::Graceful).await.unwrap();
        scheduler.dispatch_ready().await;
        tokio::time::sleep(Duration::from_millis(20)).await;

        let stored = scheduler.store.get_job(job.id).await.unwrap().unwrap();
        assert_eq!(stored.state, JobState::Queued);
    }
}
