use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use lyra_session::SessionState;
use tokio::sync::broadcast;
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::{InterventionError, Result};
use crate::types::{InterventionItem, InterventionStatus, InterventionType, ResolveAction};

/// Emitted whenever a domain's pending items are resolved, so the
/// scheduler can re-queue jobs left in `awaiting_auth` for that domain
/// (spec 4.6: "On resolution, the scheduler re-queues jobs in
/// awaiting_auth that were blocked by this domain").
#[derive(Debug, Clone)]
pub struct DomainResolved {
    pub domain: String,
    pub action: ResolveAction,
}

#[async_trait]
pub trait InterventionQueue: Send + Sync {
    async fn enqueue(&self, item: InterventionItem) -> Result<InterventionItem>;
    async fn list_pending(&self, task_id: Option<Uuid>) -> Result<Vec<InterventionItem>>;
    async fn start_session(&self, id: Uuid) -> Result<String>;
    async fn complete(
        &self,
        id: Uuid,
        action: ResolveAction,
        session_data: Option<SessionState>,
    ) -> Result<InterventionItem>;
    async fn complete_domain(
        &self,
        domain: &str,
        action: ResolveAction,
        session_data: Option<SessionState>,
    ) -> Result<Vec<InterventionItem>>;
    async fn get_session_for_domain(&self, domain: &str) -> Option<SessionState>;
}

/// Reference in-memory implementation. `lyra-store` provides a
/// SQLite-backed one with the same semantics for durability across
/// process restarts.
pub struct InMemoryInterventionQueue {
    items: Mutex<HashMap<Uuid, InterventionItem>>,
    resolutions: broadcast::Sender<DomainResolved>,
}

impl InMemoryInterventionQueue {
    pub fn new() -> Self {
        let (resolutions, _rx) = broadcast::channel(256);
        Self {
            items: Mutex::new(HashMap::new()),
            resolutions,
        }
    }

    pub fn subscribe_resolutions(&self) -> broadcast::Receiver<DomainResolved> {
        self.resolutions.subscribe()
    }
}

impl Default for InMemoryInterventionQueue {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl InterventionQueue for InMemoryInterventionQueue {
    async fn enqueue(&self, mut item: InterventionItem) -> Result<InterventionItem> {
        let mut items = self.items.lock().expect("intervention queue lock poisoned");
        if let Some(existing) = items.values_mut().find(|existing| {
            existing.task_id == item.task_id
                && existing.domain == item.domain
                && existing.intervention_type == item.intervention_type
                && existing.status == InterventionStatus::Pending
        }) {
            existing.severity += 1;
            info!(
                domain = %existing.domain,
                severity = existing.severity,
                "coalesced duplicate intervention item"
            );
            return Ok(existing.clone());
        }
        info!(domain = %item.domain, kind = ?item.intervention_type, "intervention item enqueued");
        item.status = InterventionStatus::Pending;
        items.insert(item.id, item.clone());
        Ok(item)
    }

    async fn list_pending(&self, task_id: Option<Uuid>) -> Result<Vec<InterventionItem>> {
        let items = self.items.lock().expect("intervention queue lock poisoned");
        let mut pending: Vec<InterventionItem> = items
            .values()
            .filter(|item| {
                matches!(
                    item.status,
                    InterventionStatus::Pending | InterventionStatus::InProgress
                ) && task_id.map(|id| id == item.task_id).unwrap_or(true)
            })
            .cloned()
            .collect();
        pending.sort_by_key(|item| item.created_at);
        Ok(pending)
    }

    async fn start_session(&self, id: Uuid) -> Result<String> {
        let mut items = self.items.lock().expect("intervention queue lock poisoned");
        let item = items.get_mut(&id).ok_or(InterventionError::NotFound(id))?;
        item.status = InterventionStatus::InProgress;
        Ok(item.url.clone())
    }

    async fn complete(
        &self,
        id: Uuid,
        action: ResolveAction,
        session_data: Option<SessionState>,
    ) -> Result<InterventionItem> {
        let resolved_item = {
            let mut items = self.items.lock().expect("intervention queue lock poisoned");
            let item = items.get_mut(&id).ok_or(InterventionError::NotFound(id))?;
            if !matches!(
                item.status,
                InterventionStatus::Pending | InterventionStatus::InProgress
            ) {
                return Err(InterventionError::NotResolvable(id));
            }
            item.status = match action {
                ResolveAction::Solved => InterventionStatus::Solved,
                ResolveAction::Skipped => InterventionStatus::Skipped,
                ResolveAction::Expired => InterventionStatus::Expired,
            };
            item.resolved_at = Some(chrono::Utc::now());
            if action == ResolveAction::Solved {
                item.session_data = session_data;
            }
            item.clone()
        };
        let _ = self.resolutions.send(DomainResolved {
            domain: resolved_item.domain.clone(),
            action,
        });
        Ok(resolved_item)
    }

    /// Resolves every pending/in-progress item for `domain` in one pass
    /// (spec 4.6: "domain-based single-unlock"). `session_data` is applied
    /// once to all matched items.
    async fn complete_domain(
        &self,
        domain: &str,
        action: ResolveAction,
        session_data: Option<SessionState>,
    ) -> Result<Vec<InterventionItem>> {
        let resolved = {
            let mut items = self.items.lock().expect("intervention queue lock poisoned");
            let mut resolved = Vec::new();
            for item in items.values_mut() {
                if item.domain != domain {
                    continue;
                }
                if !matches!(
                    item.status,
                    InterventionStatus::Pending | InterventionStatus::InProgress
                ) {
                    continue;
                }
                item.status = match action {
                    ResolveAction::Solved => InterventionStatus::Solved,
                    ResolveAction::Skipped => InterventionStatus::Skipped,
                    ResolveAction::Expired => InterventionStatus::Expired,
                };
                item.resolved_at = Some(chrono::Utc::now());
                if action == ResolveAction::Solved {
                    item.session_data = session_data.clone();
                }
                resolved.push(item.clone());
            }
            resolved
        };
        if resolved.is_empty() {
            warn!(domain, "complete_domain matched no pending items");
        }
        let _ = self.resolutions.send(DomainResolved {
            domain: domain.to_string(),
            action,
        });
        Ok(resolved)
    }

    async fn get_session_for_domain(&self, domain: &str) -> Option<SessionState> {
        let items = self.items.lock().expect("intervention queue lock poisoned");
        items
            .values()
            .filter(|item| item.domain == domain && item.session_data.is_some())
            .max_by_key(|item| item.resolved_at)
            .and_then(|item| item.session_data.clone())
    }
}
