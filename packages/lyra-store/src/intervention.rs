use async_trait::async_trait;
use chrono::{DateTime, Utc};
use lyra_intervention::{
    DomainResolved, InterventionError, InterventionItem, InterventionQueue, InterventionStatus, InterventionType,
    ResolveAction,
};
use lyra_session::SessionState;
use sqlx::FromRow;
use tokio::sync::broadcast;
use tracing::{info, warn};
use uuid::Uuid;

use crate::pool::EvidenceStore;

fn type_str(kind: InterventionType) -> &'static str {
    match kind {
        InterventionType::Captcha => "captcha",
        InterventionType::Login => "login",
        InterventionType::DomainBlocked => "domain_blocked",
    }
}

fn parse_type(raw: &str) -> InterventionType {
    match raw {
        "login" => InterventionType::Login,
        "domain_blocked" => InterventionType::DomainBlocked,
        _ => InterventionType::Captcha,
    }
}

fn status_str(status: InterventionStatus) -> &'static str {
    match status {
        InterventionStatus::Pending => "pending",
        InterventionStatus::InProgress => "in_progress",
        InterventionStatus::Solved => "solved",
        InterventionStatus::Skipped => "skipped",
        InterventionStatus::Expired => "expired",
    }
}

fn parse_status(raw: &str) -> InterventionStatus {
    match raw {
        "in_progress" => InterventionStatus::InProgress,
        "solved" => InterventionStatus::Solved,
        "skipped" => InterventionStatus::Skipped,
        "expired" => InterventionStatus::Expired,
        _ => InterventionStatus::Pending,
    }
}

fn resolved_status(action: ResolveAction) -> InterventionStatus {
    match action {
        ResolveAction::Solved => InterventionStatus::Solved,
        ResolveAction::Skipped => InterventionStatus::Skipped,
        ResolveAction::Expired => InterventionStatus::Expired,
    }
}

#[derive(FromRow)]
struct ItemRow {
    id: String,
    task_id: String,
    domain: String,
    url: String,
    intervention_type: String,
    status: String,
    created_at: String,
    resolved_at: Option<String>,
    session_data_json: Option<String>,
    diagnostic: String,
    severity: i64,
}

impl ItemRow {
    fn into_item(self) -> lyra_intervention::Result<InterventionItem> {
        Ok(InterventionItem {
            id: Uuid::parse_str(&self.id).map_err(|_| InterventionError::NotFound(Uuid::nil()))?,
            task_id: Uuid::parse_str(&self.task_id).map_err(|_| InterventionError::NotFound(Uuid::nil()))?,
            domain: self.domain,
            url: self.url,
            intervention_type: parse_type(&self.intervention_type),
            status: parse_status(&self.status),
            created_at: parse_timestamp(&self.created_at),
            resolved_at: self.resolved_at.as_deref().map(parse_timestamp),
            session_data: self.session_data_json.and_then(|json| serde_json::from_str(&json).ok()),
            diagnostic: self.diagnostic,
            severity: self.severity.max(0) as u32,
        })
    }
}

fn parse_timestamp(raw: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(raw).map(|dt| dt.with_timezone(&Utc)).unwrap_or_else(|_| Utc::now())
}

/// SQLite-backed `InterventionQueue`: same coalesce/single-unlock
/// semantics as `InMemoryInterventionQueue`, durable across process
/// restarts (spec 4.6). The domain-resolution broadcast used by the
/// scheduler to re-queue `awaiting_auth` jobs is process-local only —
/// restart durability of pending items is what the database buys;
/// delivering the wakeup itself doesn't need to survive a restart,
/// since the scheduler re-derives `awaiting_auth` state from `jobs` on
/// startup anyway.
pub struct SqliteInterventionQueue {
    store: EvidenceStore,
    resolutions: broadcast::Sender<DomainResolved>,
}

impl SqliteInterventionQueue {
    pub fn new(store: EvidenceStore) -> Self {
        let (resolutions, _rx) = broadcast::channel(256);
        Self { store, resolutions }
    }

    pub fn subscribe_resolutions(&self) -> broadcast::Receiver<DomainResolved> {
        self.resolutions.subscribe()
    }

    async fn find_pending_duplicate(&self, item: &InterventionItem) -> lyra_intervention::Result<Option<InterventionItem>> {
        let rows = sqlx::query_as::<_, ItemRow>(
            "SELECT id, task_id, domain, url, intervention_type, status, created_at, resolved_at, \
             session_data_json, diagnostic, severity FROM intervention_items \
             WHERE task_id = ? AND domain = ? AND intervention_type = ? AND status = 'pending'",
        )
        .bind(item.task_id.to_string())
        .bind(&item.domain)
        .bind(type_str(item.intervention_type))
        .fetch_optional(self.store.pool())
        .await
        .map_err(|_| InterventionError::NotFound(item.id))?;
        rows.map(ItemRow::into_item).transpose()
    }
}

#[async_trait]
impl InterventionQueue for SqliteInterventionQueue {
    async fn enqueue(&self, item: InterventionItem) -> lyra_intervention::Result<InterventionItem> {
        if let Some(existing) = self.find_pending_duplicate(&item).await? {
            let severity = existing.severity + 1;
            sqlx::query("UPDATE intervention_items SET severity = ? WHERE id = ?")
                .bind(severity as i64)
                .bind(existing.id.to_string())
                .execute(self.store.pool())
                .await
                .map_err(|_| InterventionError::NotFound(existing.id))?;
            info!(domain = %existing.domain, severity, "coalesced duplicate intervention item");
            return Ok(InterventionItem { severity, ..existing });
        }

        sqlx::query(
            "INSERT INTO intervention_items (id, task_id, domain, url, intervention_type, status, created_at, diagnostic, severity) \
             VALUES (?, ?, ?, ?, ?, 'pending', ?, ?, 1)",
        )
        .bind(item.id.to_string())
        .bind(item.task_id.to_string())
        .bind(&item.domain)
        .bind(&item.url)
        .bind(type_str(item.intervention_type))
        .bind(item.created_at.to_rfc3339())
        .bind(&item.diagnostic)
        .execute(self.store.pool())
        .await
        .map_err(|_| InterventionError::NotFound(item.id))?;

        info!(domain = %item.domain, kind = ?item.intervention_type, "intervention item enqueued");
        Ok(InterventionItem { status: InterventionStatus::Pending, severity: 1, ..item })
    }

    async fn list_pending(&self, task_id: Option<Uuid>) -> lyra_intervention::Result<Vec<InterventionItem>> {
        let rows = if let Some(task_id) = task_id {
            sqlx::query_as::<_, ItemRow>(
                "SELECT id, task_id, domain, url, intervention_type, status, created_at, resolved_at, \
                 session_data_json, diagnostic, severity FROM intervention_items \
                 WHERE task_id = ? AND status IN ('pending', 'in_progress') ORDER BY created_at ASC",
            )
            .bind(task_id.to_string())
            .fetch_all(self.store.pool())
            .await
        } else {
            sqlx::query_as::<_, ItemRow>(
                "SELECT id, task_id, domain, url, intervention_type, status, created_at, resolved_at, \
                 session_data_json, diagnostic, severity FROM intervention_items \
                 WHERE status IN ('pending', 'in_progress') ORDER BY created_at ASC",
            )
            .fetch_all(self.store.pool())
            .await
        }
        .map_err(|_| InterventionError::NotFound(Uuid::nil()))?;

        rows.into_iter().map(ItemRow::into_item).collect()
    }

    async fn start_session(&self, id: Uuid) -> lyra_intervention::Result<String> {
        let row = sqlx::query_as::<_, ItemRow>(
            "SELECT id, task_id, domain, url, intervention_type, status, created_at, resolved_at, \
             session_data_json, diagnostic, severity FROM intervention_items WHERE id = ?",
        )
        .bind(id.to_string())
        .fetch_optional(self.store.pool())
        .await
        .map_err(|_| InterventionError::NotFound(id))?
        .ok_or(InterventionError::NotFound(id))?;

        sqlx::query("UPDATE intervention_items SET status = 'in_progress' WHERE id = ?")
            .bind(id.to_string())
            .execute(self.store.pool())
            .await
            .map_err(|_| InterventionError::NotFound(id))?;

        Ok(row.url)
    }

    async fn complete(
        &self,
        id: Uuid,
        action: ResolveAction,
        session_data: Option<SessionState>,
    ) -> lyra_intervention::Result<InterventionItem> {
        let row = sqlx::query_as::<_, ItemRow>(
            "SELECT id, task_id, domain, url, intervention_type, status, created_at, resolved_at, \
             session_data_json, diagnostic, severity FROM intervention_items WHERE id = ?",
        )
        .bind(id.to_string())
        .fetch_optional(self.store.pool())
        .await
        .map_err(|_| InterventionError::NotFound(id))?
        .ok_or(InterventionError::NotFound(id))?
        .into_item()?;

        if !matches!(row.status, InterventionStatus::Pending | InterventionStatus::InProgress) {
            return Err(InterventionError::NotResolvable(id));
        }

        let session_json = if action == ResolveAction::Solved {
            session_data.as_ref().map(|s| serde_json::to_string(s)).transpose().ok().flatten()
        } else {
            None
        };

        sqlx::query("UPDATE intervention_items SET status = ?, resolved_at = ?, session_data_json = COALESCE(?, session_data_json) WHERE id = ?")
            .bind(status_str(resolved_status(action)))
            .bind(Utc::now().to_rfc3339())
            .bind(session_json)
            .bind(id.to_string())
            .execute(self.store.pool())
            .await
            .map_err(|_| InterventionError::NotFound(id))?;

        let _ = self.resolutions.send(DomainResolved { domain: row.domain.clone(), action });

        Ok(InterventionItem {
            status: resolved_status(action),
            resolved_at: Some(Utc::now()),
            session_data: if action == ResolveAction::Solved { session_data } else { row.session_data },
            ..row
        })
    }

    async fn complete_domain(
        &self,
        domain: &str,
        action: ResolveAction,
        session_data: Option<SessionState>,
    ) -> lyra_intervention::Result<Vec<InterventionItem>> {
        let rows = sqlx::query_as::<_, ItemRow>(
            "SELECT id, task_id, domain, url, intervention_type, status, created_at, resolved_at, \
             session_data_json, diagnostic, severity FROM intervention_items \
             WHERE domain = ? AND status IN ('pending', 'in_progress')",
        )
        .bind(domain)
        .fetch_all(self.store.pool())
        .await
        .map_err(|_| InterventionError::NotFound(Uuid::nil()))?;

        let session_json = if action == ResolveAction::Solved {
            session_data.as_ref().map(|s| serde_json::to_string(s)).transpose().ok().flatten()
        } else {
            None
        };

        sqlx::query(
            "UPDATE intervention_items SET status = ?, resolved_at = ?, session_data_json = COALESCE(?, session_data_json) \
             WHERE domain = ? AND status IN ('pending', 'in_progress')",
        )
        .bind(status_str(resolved_status(action)))
        .bind(Utc::now().to_rfc3339())
        .bind(&session_json)
        .bind(domain)
        .execute(self.store.pool())
        .await
        .map_err(|_| InterventionError::NotFound(Uuid::nil()))?;

        if rows.is_empty() {
            warn!(domain, "complete_domain matched no pending items");
        }
        let _ = self.resolutions.send(DomainResolved { domain: domain.to_string(), action });

        rows.into_iter()
            .map(ItemRow::into_item)
            .map(|item| {
                item.map(|item| InterventionItem {
                    status: resolved_status(action),
                    resolved_at: Some(Utc::now()),
                    session_data: if action == ResolveAction::Solved { session_data.clone() } else { item.session_data.clone() },
                    ..item
                })
            })
            .collect()
    }

    async fn get_session_for_domain(&self, domain: &str) -> Option<SessionState> {
        let row: Option<(Option<String>,)> = sqlx::query_as(
            "SELECT session_data_json FROM intervention_items \
             WHERE domain = ? AND session_data_json IS NOT NULL ORDER BY resolved_at DESC LIMIT 1",
        )
        .bind(domain)
        .fetch_optional(self.store.pool())
        .await
        .ok()
        .flatten();
        row.and_then(|(json,)| json).and_then(|json| serde_json::from_str(&json).ok())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_item(task_id: Uuid, domain: &str) -> InterventionItem {
        InterventionItem::new(task_id, domain, format!("https://{domain}/page"), InterventionType::Captcha, "captcha on SERP page 1")
    }

    #[tokio::test]
    async fn duplicate_pending_items_coalesce() {
        let store = EvidenceStore::in_memory().await.unwrap();
        let queue = SqliteInterventionQueue::new(store);
        let task_id = Uuid::new_v4();
        let first = queue.enqueue(sample_item(task_id, "a.example")).await.unwrap();
        let second = queue.enqueue(sample_item(task_id, "a.example")).await.unwrap();
        assert_eq!(first.id, second.id);
        assert_eq!(second.severity, 2);
        assert_eq!(queue.list_pending(None).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn resolve_single_item() {
        let store = EvidenceStore::in_memory().await.unwrap();
        let queue = SqliteInterventionQueue::new(store);
        let task_id = Uuid::new_v4();
        let item = queue.enqueue(sample_item(task_id, "a.example")).await.unwrap();

        let resolved = queue.complete(item.id, ResolveAction::Solved, Some(SessionState::default())).await.unwrap();
        assert_eq!(resolved.status, InterventionStatus::Solved);
        assert!(queue.list_pending(None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn domain_single_unlock_resolves_all_pending_items_and_captures_session_once() {
        let store = EvidenceStore::in_memory().await.unwrap();
        let queue = SqliteInterventionQueue::new(store);
        let task_id = Uuid::new_v4();
        let mut item_a = sample_item(task_id, "shared.example");
        item_a.url = "https://shared.example/a".into();
        let mut item_b = sample_item(task_id, "shared.example");
        item_b.url = "https://shared.example/b".into();
        item_b.intervention_type = InterventionType::Login;

        queue.enqueue(item_a).await.unwrap();
        queue.enqueue(item_b).await.unwrap();

        let mut session = SessionState::default();
        session.cookies.push(("sid".into(), "xyz".into()));
        let resolved = queue.complete_domain("shared.example", ResolveAction::Solved, Some(session.clone())).await.unwrap();
        assert_eq!(resolved.len(), 2);
        assert!(queue.list_pending(None).await.unwrap().is_empty());

        let fetched = queue.get_session_for_domain("shared.example").await.unwrap();
        assert_eq!(fetched.cookies, session.cookies);
    }

    #[tokio::test]
    async fn resolution_emits_broadcast_event() {
        let store = EvidenceStore::in_memory().await.unwrap();
        let queue = SqliteInterventionQueue::new(store);
        let mut rx = queue.subscribe_resolutions();
        let task_id = Uuid::new_v4();
        let item = queue.enqueue(sample_item(task_id, "a.example")).await.unwrap();
        queue.complete(item.id, ResolveAction::Solved, None).await.unwrap();
        let event = rx.try_recv().unwrap();
        assert_eq!(event.domain, "a.example");
    }

    #[tokio::test]
    async fn resolving_unknown_id_errors() {
        let store = EvidenceStore::in_memory().await.unwrap();
        let queue = SqliteInterventionQueue::new(store);
        let result = queue.complete(Uuid::new_v4(), ResolveAction::Solved, None).await;
        assert!(matches!(result, Err(InterventionError::NotFound(_))));
    }
}
