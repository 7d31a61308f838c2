use chrono::{DateTime, Utc};
use lyra_core::JobKind;
use sqlx::FromRow;
use uuid::Uuid;

use crate::error::{Result, StoreError};
use crate::pool::EvidenceStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    Queued,
    Running,
    AwaitingAuth,
    Done,
    Failed,
    Cancelled,
}

fn state_str(state: JobState) -> &'static str {
    match state {
        JobState::Queued => "queued",
        JobState::Running => "running",
        JobState::AwaitingAuth => "awaiting_auth",
        JobState::Done => "done",
        JobState::Failed => "failed",
        JobState::Cancelled => "cancelled",
    }
}

fn parse_state(raw: &str) -> JobState {
    match raw {
        "running" => JobState::Running,
        "awaiting_auth" => JobState::AwaitingAuth,
        "done" => JobState::Done,
        "failed" => JobState::Failed,
        "cancelled" => JobState::Cancelled,
        _ => JobState::Queued,
    }
}

fn kind_str(kind: JobKind) -> &'static str {
    match kind {
        JobKind::Serp => "serp",
        JobKind::Fetch => "fetch",
        JobKind::Extract => "extract",
        JobKind::Embed => "embed",
        JobKind::Rank => "rank",
        JobKind::LlmExtract => "llm_extract",
        JobKind::Nli => "nli",
        JobKind::Compose => "compose",
    }
}

fn parse_kind(raw: &str) -> Option<JobKind> {
    Some(match raw {
        "serp" => JobKind::Serp,
        "fetch" => JobKind::Fetch,
        "extract" => JobKind::Extract,
        "embed" => JobKind::Embed,
        "rank" => JobKind::Rank,
        "llm_extract" => JobKind::LlmExtract,
        "nli" => JobKind::Nli,
        "compose" => JobKind::Compose,
        _ => return None,
    })
}

#[derive(Debug, Clone)]
pub struct Job {
    pub id: Uuid,
    pub kind: JobKind,
    pub priority: u32,
    pub input: serde_json::Value,
    pub state: JobState,
    pub enqueued_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub output: Option<serde_json::Value>,
    pub cause_id: Option<String>,
    pub parent_id: Option<Uuid>,
    pub task_id: Option<Uuid>,
}

#[derive(FromRow)]
struct JobRow {
    id: String,
    kind: String,
    priority: i64,
    input_json: String,
    state: String,
    enqueued_at: String,
    started_at: Option<String>,
    output_json: Option<String>,
    cause_id: Option<String>,
    parent_id: Option<String>,
    task_id: Option<String>,
}

const JOB_COLUMNS: &str =
    "id, kind, priority, input_json, state, enqueued_at, started_at, output_json, cause_id, parent_id, task_id";

impl JobRow {
    fn into_job(self) -> Result<Job> {
        Ok(Job {
            id: Uuid::parse_str(&self.id).map_err(|_| StoreError::CorruptJson("jobs.id".into()))?,
            kind: parse_kind(&self.kind).ok_or_else(|| StoreError::CorruptJson("jobs.kind".into()))?,
            priority: self.priority.max(0) as u32,
            input: serde_json::from_str(&self.input_json).unwrap_or(serde_json::Value::Null),
            state: parse_state(&self.state),
            enqueued_at: DateTime::parse_from_rfc3339(&self.enqueued_at)
                .map(|dt| dt.with_timezone(&Utc))
                .map_err(|_| StoreError::CorruptJson("jobs.enqueued_at".into()))?,
            started_at: self
                .started_at
                .as_deref()
                .and_then(|raw| DateTime::parse_from_rfc3339(raw).ok())
                .map(|dt| dt.with_timezone(&Utc)),
            output: self.output_json.and_then(|json| serde_json::from_str(&json).ok()),
            cause_id: self.cause_id,
            parent_id: self.parent_id.as_deref().and_then(|raw| Uuid::parse_str(raw).ok()),
            task_id: self.task_id.as_deref().and_then(|raw| Uuid::parse_str(raw).ok()),
        })
    }
}

impl EvidenceStore {
    /// Persists a newly scheduled job. Priority defaults to the kind's
    /// static table (spec 4.8) unless the caller overrides it (sub-jobs
    /// inherit their parent task's `priority_domains` weighting upstream
    /// of this call).
    pub async fn insert_job(
        &self,
        kind: JobKind,
        priority: u32,
        input: serde_json::Value,
        parent_id: Option<Uuid>,
        task_id: Option<Uuid>,
    ) -> Result<Job> {
        let job = Job {
            id: lyra_core::new_id(),
            kind,
            priority,
            input,
            state: JobState::Queued,
            enqueued_at: lyra_core::now(),
            started_at: None,
            output: None,
            cause_id: None,
            parent_id,
            task_id,
        };

        sqlx::query(
            "INSERT INTO jobs (id, kind, priority, input_json, state, enqueued_at, parent_id, task_id) \
             VALUES (?, ?, ?, ?, 'queued', ?, ?, ?)",
        )
        .bind(job.id.to_string())
        .bind(kind_str(kind))
        .bind(job.priority as i64)
        .bind(job.input.to_string())
        .bind(job.enqueued_at.to_rfc3339())
        .bind(job.parent_id.map(|id| id.to_string()))
        .bind(job.task_id.map(|id| id.to_string()))
        .execute(self.pool())
        .await?;

        Ok(job)
    }

    pub async fn get_job(&self, job_id: Uuid) -> Result<Option<Job>> {
        let row = sqlx::query_as::<_, JobRow>(&format!("SELECT {JOB_COLUMNS} FROM jobs WHERE id = ?"))
            .bind(job_id.to_string())
            .fetch_optional(self.pool())
            .await?;
        row.map(JobRow::into_job).transpose()
    }

    /// Transitions a job's state. `started_at` is stamped the first time a
    /// job moves into `running`; `awaiting_auth` re-queues keep their
    /// original `enqueued_at`/priority untouched (spec 5: "`awaiting_auth`
    /// jobs ... re-queue with their original priority and enqueue
    /// timestamp preserved").
    pub async fn set_job_state(&self, job_id: Uuid, state: JobState, output: Option<serde_json::Value>) -> Result<()> {
        let started_at = if state == JobState::Running { Some(lyra_core::now().to_rfc3339()) } else { None };
        sqlx::query(
            "UPDATE jobs SET state = ?, started_at = COALESCE(?, started_at), output_json = COALESCE(?, output_json) WHERE id = ?",
        )
        .bind(state_str(state))
        .bind(started_at)
        .bind(output.map(|value| value.to_string()))
        .bind(job_id.to_string())
        .execute(self.pool())
        .await?;
        Ok(())
    }

    pub async fn set_job_cause(&self, job_id: Uuid, cause_id: &str) -> Result<()> {
        sqlx::query("UPDATE jobs SET cause_id = ? WHERE id = ?")
            .bind(cause_id)
            .bind(job_id.to_string())
            .execute(self.pool())
            .await?;
        Ok(())
    }

    pub async fn jobs_for_parent(&self, parent_id: Uuid) -> Result<Vec<Job>> {
        let rows = sqlx::query_as::<_, JobRow>(&format!("SELECT {JOB_COLUMNS} FROM jobs WHERE parent_id = ?"))
            .bind(parent_id.to_string())
            .fetch_all(self.pool())
            .await?;
        rows.into_iter().map(JobRow::into_job).collect()
    }

    pub async fn jobs_in_state(&self, state: JobState) -> Result<Vec<Job>> {
        let rows = sqlx::query_as::<_, JobRow>(&format!("SELECT {JOB_COLUMNS} FROM jobs WHERE state = ?"))
            .bind(state_str(state))
            .fetch_all(self.pool())
            .await?;
        rows.into_iter().map(JobRow::into_job).collect()
    }

    /// All jobs belonging to a task, used by `stop_task` to find running and
    /// queued work to cancel or drop.
    pub async fn jobs_for_task(&self, task_id: Uuid) -> Result<Vec<Job>> {
        let rows = sqlx::query_as::<_, JobRow>(&format!("SELECT {JOB_COLUMNS} FROM jobs WHERE task_id = ?"))
            .bind(task_id.to_string())
            .fetch_all(self.pool())
            .await?;
        rows.into_iter().map(JobRow::into_job).collect()
    }

    /// Deletes a still-queued job outright (spec 4.8 `stop_task(full)`:
    /// "remove queued jobs"). No-op if the job is no longer queued.
    pub async fn delete_queued_job(&self, job_id: Uuid) -> Result<()> {
        sqlx::query("DELETE FROM jobs WHERE id = ? AND state = 'queued'")
            .bind(job_id.to_string())
            .execute(self.pool())
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn insert_then_transition_job_state() {
        let store = EvidenceStore::in_memory().await.unwrap();
        let job = store.insert_job(JobKind::Serp, JobKind::Serp.priority(), serde_json::json!({"query": "q1"}), None, None).await.unwrap();
        assert_eq!(job.state, JobState::Queued);

        store.set_job_state(job.id, JobState::Running, None).await.unwrap();
        let running = store.get_job(job.id).await.unwrap().unwrap();
        assert_eq!(running.state, JobState::Running);
        assert!(running.started_at.is_some());

        store.set_job_state(job.id, JobState::Done, Some(serde_json::json!({"items": 3}))).await.unwrap();
        let done = store.get_job(job.id).await.unwrap().unwrap();
        assert_eq!(done.state, JobState::Done);
        assert_eq!(done.output, Some(serde_json::json!({"items": 3})));
    }

    #[tokio::test]
    async fn child_jobs_are_queryable_by_parent() {
        let store = EvidenceStore::in_memory().await.unwrap();
        let parent = store.insert_job(JobKind::Serp, 100, serde_json::json!({}), None, None).await.unwrap();
        store.insert_job(JobKind::Fetch, 90, serde_json::json!({}), Some(parent.id), None).await.unwrap();
        store.insert_job(JobKind::Fetch, 90, serde_json::json!({}), Some(parent.id), None).await.unwrap();

        let children = store.jobs_for_parent(parent.id).await.unwrap();
        assert_eq!(children.len(), 2);
    }

    #[tokio::test]
    async fn awaiting_auth_jobs_are_listable_for_resolution_requeue() {
        let store = EvidenceStore::in_memory().await.unwrap();
        let job = store.insert_job(JobKind::Serp, 100, serde_json::json!({}), None, None).await.unwrap();
        store.set_job_state(job.id, JobState::AwaitingAuth, None).await.unwrap();

        let waiting = store.jobs_in_state(JobState::AwaitingAuth).await.unwrap();
        assert_eq!(waiting.len(), 1);
        assert_eq!(waiting[0].id, job.id);
        assert_eq!(waiting[0].priority, 100);
    }

    #[tokio::test]
    async fn jobs_for_task_scopes_across_kinds() {
        let store = EvidenceStore::in_memory().await.unwrap();
        let task_id = lyra_core::new_id();
        store.insert_job(JobKind::Serp, 100, serde_json::json!({}), None, Some(task_id)).await.unwrap();
        store.insert_job(JobKind::Fetch, 90, serde_json::json!({}), None, Some(task_id)).await.unwrap();
        store.insert_job(JobKind::Serp, 100, serde_json::json!({}), None, None).await.unwrap();

        let jobs = store.jobs_for_task(task_id).await.unwrap();
        assert_eq!(jobs.len(), 2);
    }

    #[tokio::test]
    async fn delete_queued_job_leaves_running_jobs_alone() {
        let store = EvidenceStore::in_memory().await.unwrap();
        let queued = store.insert_job(JobKind::Fetch, 90, serde_json::json!({}), None, None).await.unwrap();
        let running = store.insert_job(JobKind::Fetch, 90, serde_json::json!({}), None, None).await.unwrap();
        store.set_job_state(running.id, JobState::Running, None).await.unwrap();

        store.delete_queued_job(queued.id).await.unwrap();
        store.delete_queued_job(running.id).await.unwrap();

        assert!(store.get_job(queued.id).await.unwrap().is_none());
        assert!(store.get_job(running.id).await.unwrap().is_some());
    }
}
