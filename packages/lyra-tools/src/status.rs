//! `get_status` long-polling (spec 4.16 / 4.4). Rather than threading a new
//! wakeup channel through the scheduler, this polls [`EvidenceStore`]
//! directly and compares a cheap fingerprint of task state against the
//! client's `since` token — the scheduler's own `Notify` stays private,
//! since nothing here needs scheduler-level wakeup semantics.

use std::time::Duration;

use lyra_store::{ClaimAdoptionStatus, EvidenceStore, JobState, SqliteOverrideLookup};
use tokio::time::sleep;
use uuid::Uuid;

use crate::error::{Result, ToolError};
use crate::types::{
    BlockedDomainView, DomainOverrideView, EvidenceSummaryView, GetStatusResponse, ProgressCounters,
};

const POLL_INTERVAL: Duration = Duration::from_millis(250);
const MAX_WAIT_SECONDS: u64 = 30;

/// Cheap, order-independent summary of everything `get_status` reports.
/// Changes to any counted field change the fingerprint; this is compared
/// against the caller's `since` token rather than exposing row versions.
fn fingerprint(progress: &ProgressCounters, auth_queue_len: usize, blocked_len: usize, override_len: usize) -> String {
    format!(
        "{}:{}:{}:{}:{}:{}:{}",
        progress.queued, progress.running, progress.awaiting_auth, progress.done, progress.failed,
        auth_queue_len, blocked_len + override_len,
    )
}

async fn snapshot(
    store: &EvidenceStore,
    override_lookup: &SqliteOverrideLookup,
    task_id: Uuid,
) -> Result<(GetStatusResponse, String)> {
    let task = store.get_task(task_id).await?.ok_or(ToolError::UnknownTask(task_id))?;

    let jobs = store.jobs_for_task(task_id).await?;
    let mut progress = ProgressCounters { queued: 0, running: 0, awaiting_auth: 0, done: 0, failed: 0 };
    for job in &jobs {
        match job.state {
            JobState::Queued => progress.queued += 1,
            JobState::Running => progress.running += 1,
            JobState::AwaitingAuth => progress.awaiting_auth += 1,
            JobState::Done => progress.done += 1,
            JobState::Failed | JobState::Cancelled => progress.failed += 1,
        }
    }

    let auth_queue: Vec<Uuid> = jobs
        .iter()
        .filter(|job| job.state == JobState::AwaitingAuth)
        .map(|job| job.id)
        .collect();

    let blocked_domains: Vec<BlockedDomainView> = store
        .blocked_domains(override_lookup)
        .await?
        .into_iter()
        .map(|domain| BlockedDomainView {
            domain: domain.domain,
            blocked_at: domain.blocked_at,
            domain_block_reason: domain.domain_block_reason,
            domain_unblock_risk: domain.domain_unblock_risk,
            r#override: domain.r#override,
        })
        .collect();

    let domain_overrides: Vec<DomainOverrideView> = store
        .active_override_rules()
        .await?
        .into_iter()
        .map(|rule| DomainOverrideView {
            rule_id: rule.id,
            domain_pattern: rule.domain_pattern,
            decision: rule.decision,
            reason: rule.reason,
            updated_at: rule.updated_at,
        })
        .collect();

    let evidence_summary = if matches!(task.status, lyra_core::TaskStatus::Stopped) || progress.queued + progress.running + progress.awaiting_auth == 0 {
        let claims = store.claims_for_task(task_id).await?;
        let claims_rejected = claims.iter().filter(|claim| claim.adoption_status == ClaimAdoptionStatus::NotAdopted).count() as u64;
        let claims_adopted = claims.len() as u64 - claims_rejected;
        Some(EvidenceSummaryView { claims_adopted, claims_rejected })
    } else {
        None
    };

    let fp = fingerprint(&progress, auth_queue.len(), blocked_domains.len(), domain_overrides.len());
    let response = GetStatusResponse {
        task_id,
        since: fp.clone(),
        progress,
        auth_queue,
        blocked_domains,
        domain_overrides,
        evidence_summary,
    };
    Ok((response, fp))
}

/// Returns immediately if the fingerprint differs from `since`, otherwise
/// polls up to `wait_seconds` (clamped to [`MAX_WAIT_SECONDS`]) before
/// returning the latest snapshot regardless of change.
pub async fn poll_status(
    store: &EvidenceStore,
    override_lookup: &SqliteOverrideLookup,
    task_id: Uuid,
    since: Option<String>,
    wait_seconds: Option<u64>,
) -> Result<GetStatusResponse> {
    let (response, fp) = snapshot(store, override_lookup, task_id).await?;
    let unchanged = since.as_deref() == Some(fp.as_str());
    if !unchanged {
        return Ok(response);
    }

    let bound = Duration::from_secs(wait_seconds.unwrap_or(0).min(MAX_WAIT_SECONDS));
    let deadline = tokio::time::Instant::now() + bound;
    loop {
        if tokio::time::Instant::now() >= deadline {
            let (response, _) = snapshot(store, override_lookup, task_id).await?;
            return Ok(response);
        }
        sleep(POLL_INTERVAL).await;
        let (response, fp2) = snapshot(store, override_lookup, task_id).await?;
        if Some(fp2.as_str()) != since.as_deref() {
            return Ok(response);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn returns_immediately_when_since_does_not_match() {
        let store = EvidenceStore::in_memory().await.unwrap();
        let lookup = SqliteOverrideLookup::new();
        let task = store.create_task("H1", 10, &[], None).await.unwrap();

        let started = tokio::time::Instant::now();
        let response = poll_status(&store, &lookup, task.id, Some("stale-token".to_string()), Some(5)).await.unwrap();
        assert!(started.elapsed() < Duration::from_millis(500));
        assert_eq!(response.task_id, task.id);
    }

    #[tokio::test]
    async fn unknown_task_is_rejected() {
        let store = EvidenceStore::in_memory().await.unwrap();
        let lookup = SqliteOverrideLookup::new();
        let result = poll_status(&store, &lookup, Uuid::new_v4(), None, None).await;
        assert!(matches!(result, Err(ToolError::UnknownTask(_))));
    }

    #[tokio::test]
    async fn fresh_task_with_no_jobs_reports_an_empty_evidence_summary() {
        let store = EvidenceStore::in_memory().await.unwrap();
        let lookup = SqliteOverrideLookup::new();
        let task = store.create_task("H1", 10, &[], None).await.unwrap();
        let response = poll_status(&store, &lookup, task.id, None, None).await.unwrap();
        let summary = response.evidence_summary.expect("no jobs in flight means evidence is already final");
        assert_eq!(summary.claims_adopted, 0);
        assert_eq!(summary.claims_rejected, 0);
    }
}
