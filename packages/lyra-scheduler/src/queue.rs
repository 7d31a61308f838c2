use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use lyra_core::JobKind;
use uuid::Uuid;

/// The subset of a persisted job needed to order and dispatch it. Kept
/// separate from `lyra_store::Job` so the in-memory queue doesn't carry a
/// job's full input/output payload around while it waits for a slot.
#[derive(Debug, Clone)]
pub struct QueuedJob {
    pub id: Uuid,
    pub kind: JobKind,
    pub priority: u32,
    pub enqueued_at: DateTime<Utc>,
    pub domain: Option<String>,
    pub task_id: Option<Uuid>,
}

impl PartialEq for QueuedJob {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}
impl Eq for QueuedJob {}

impl Ord for QueuedJob {
    /// Higher priority wins; within a priority tier, the earlier-enqueued
    /// job sorts greater so it pops first (spec 4.8: "stable FIFO within
    /// priority").
    fn cmp(&self, other: &Self) -> Ordering {
        self.priority.cmp(&other.priority).then_with(|| other.enqueued_at.cmp(&self.enqueued_at))
    }
}
impl PartialOrd for QueuedJob {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// In-memory mirror of the `queued` jobs in the store, ordered for
/// dispatch. The store remains the durable source of truth; this is just
/// the scheduler's working set so picking the next job doesn't require a
/// database round-trip.
#[derive(Default)]
pub struct ReadyQueue {
    heap: Mutex<BinaryHeap<QueuedJob>>,
}

impl ReadyQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, job: QueuedJob) {
        self.heap.lock().expect("ready queue lock poisoned").push(job);
    }

    pub fn pop(&self) -> Option<QueuedJob> {
        self.heap.lock().expect("ready queue lock poisoned").pop()
    }

    /// Removes and returns every queued job belonging to `task_id`, used by
    /// `stop_task(full)` to drop them before they can be dispatched.
    pub fn remove_for_task(&self, task_id: Uuid) -> Vec<QueuedJob> {
        let mut heap = self.heap.lock().expect("ready queue lock poisoned");
        let (matching, rest): (Vec<_>, Vec<_>) =
            std::mem::take(&mut *heap).into_vec().into_iter().partition(|job| job.task_id == Some(task_id));
        *heap = rest.into_iter().collect();
        matching
    }

    pub fn len(&self) -> usize {
        self.heap.lock().expect("ready queue lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn job(id: Uuid, priority: u32, enqueued_at: DateTime<Utc>) -> QueuedJob {
        QueuedJob { id, kind: JobKind::Fetch, priority, enqueued_at, domain: None, task_id: None }
    }

    #[test]
    fn higher_priority_pops_first() {
        let queue = ReadyQueue::new();
        let now = Utc::now();
        queue.push(job(Uuid::new_v4(), 50, now));
        let high = job(Uuid::new_v4(), 90, now);
        queue.push(high.clone());

        assert_eq!(queue.pop().unwrap().id, high.id);
    }

    #[test]
    fn equal_priority_is_fifo() {
        let queue = ReadyQueue::new();
        let earlier = job(Uuid::new_v4(), 50, Utc::now());
        std::thread::sleep(std::time::Duration::from_millis(2));
        let later = job(Uuid::new_v4(), 50, Utc::now());
        queue.push(later);
        queue.push(earlier.clone());

        assert_eq!(queue.pop().unwrap().id, earlier.id);
    }

    #[test]
    fn remove_for_task_extracts_only_matching_jobs() {
        let queue = ReadyQueue::new();
        let task_a = Uuid::new_v4();
        let mut a = job(Uuid::new_v4(), 50, Utc::now());
        a.task_id = Some(task_a);
        let b = job(Uuid::new_v4(), 50, Utc::now());
        queue.push(a.clone());
        queue.push(b.clone());

        let removed = queue.remove_for_task(task_a);
        assert_eq!(removed.len(), 1);
        assert_eq!(removed[0].id, a.id);
        assert_eq!(queue.len(), 1);
        assert_eq!(queue.pop().unwrap().id, b.id);
    }
}
