use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// Held for the lifetime of a running job; releases the overall permit and
/// any domain/group lock it took on drop, regardless of how the job ends
/// (success, failure, timeout, or cancellation).
pub struct SlotGuard {
    _permit: OwnedSemaphorePermit,
    domain: Option<String>,
    group: Option<&'static str>,
    domains: Arc<DashMap<String, ()>>,
    groups: Arc<DashMap<&'static str, ()>>,
}

impl Drop for SlotGuard {
    fn drop(&mut self) {
        if let Some(domain) = &self.domain {
            self.domains.remove(domain);
        }
        if let Some(group) = self.group {
            self.groups.remove(&group);
        }
    }
}

/// Concurrency gates from spec 4.8: an overall cap, at most one running job
/// per domain, and at most one running job per mutual-exclusion group
/// (`gpu`, `browser_headful`). `DashMap::insert`'s return value doubles as a
/// test-and-set: `None` means the key was free and is now held by us,
/// `Some` means somebody already holds it.
pub struct Slots {
    overall: Arc<Semaphore>,
    domains: Arc<DashMap<String, ()>>,
    groups: Arc<DashMap<&'static str, ()>>,
}

impl Slots {
    pub fn new(overall_capacity: usize) -> Self {
        Self {
            overall: Arc::new(Semaphore::new(overall_capacity)),
            domains: Arc::new(DashMap::new()),
            groups: Arc::new(DashMap::new()),
        }
    }

    /// Attempts to reserve a slot for a job, returning `None` if any of the
    /// overall/domain/group gates are currently exhausted. Never blocks.
    pub fn try_acquire(&self, domain: Option<&str>, group: Option<&'static str>) -> Option<SlotGuard> {
        let permit = self.overall.clone().try_acquire_owned().ok()?;

        if let Some(domain) = domain {
            if self.domains.insert(domain.to_string(), ()).is_some() {
                return None;
            }
        }
        if let Some(group) = group {
            if self.groups.insert(group, ()).is_some() {
                if let Some(domain) = domain {
                    self.domains.remove(domain);
                }
                return None;
            }
        }

        Some(SlotGuard {
            _permit: permit,
            domain: domain.map(str::to_string),
            group,
            domains: self.domains.clone(),
            groups: self.groups.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overall_capacity_is_enforced() {
        let slots = Slots::new(1);
        let first = slots.try_acquire(None, None);
        assert!(first.is_some());
        let second = slots.try_acquire(None, None);
        assert!(second.is_none());
    }

    #[test]
    fn same_domain_cannot_run_twice_concurrently() {
        let slots = Slots::new(4);
        let first = slots.try_acquire(Some("example.com"), None);
        assert!(first.is_some());
        let second = slots.try_acquire(Some("example.com"), None);
        assert!(second.is_none());
        let other_domain = slots.try_acquire(Some("other.com"), None);
        assert!(other_domain.is_some());
    }

    #[test]
    fn same_group_cannot_run_twice_concurrently() {
        let slots = Slots::new(4);
        let first = slots.try_acquire(None, Some("gpu"));
        assert!(first.is_some());
        let second = slots.try_acquire(None, Some("gpu"));
        assert!(second.is_none());
    }

    #[test]
    fn dropping_a_guard_frees_its_slots() {
        let slots = Slots::new(1);
        let guard = slots.try_acquire(Some("example.com"), Some("gpu")).unwrap();
        assert!(slots.try_acquire(None, None).is_none());
        drop(guard);
        assert!(slots.try_acquire(Some("example.com"), Some("gpu")).is_some());
    }
}
