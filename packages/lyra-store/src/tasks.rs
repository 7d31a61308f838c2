use chrono::{DateTime, Utc};
use lyra_core::TaskStatus;
use sqlx::FromRow;
use uuid::Uuid;

use crate::error::{Result, StoreError};
use crate::pool::EvidenceStore;

#[derive(Debug, Clone)]
pub struct Task {
    pub id: Uuid,
    pub hypothesis: String,
    pub budget_pages: u32,
    pub priority_domains: Vec<String>,
    pub status: TaskStatus,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct Search {
    pub id: Uuid,
    pub task_id: Uuid,
    pub query_text: String,
    pub engine: Option<String>,
    pub options_json: serde_json::Value,
    pub status: String,
    pub harvest_rate: f64,
    pub created_at: DateTime<Utc>,
}

#[derive(FromRow)]
struct TaskRow {
    id: String,
    hypothesis: String,
    budget_pages: i64,
    priority_domains: String,
    status: String,
    created_at: String,
}

impl TaskRow {
    fn into_task(self) -> Result<Task> {
        Ok(Task {
            id: Uuid::parse_str(&self.id).map_err(|_| StoreError::CorruptJson("tasks.id".into()))?,
            hypothesis: self.hypothesis,
            budget_pages: self.budget_pages as u32,
            priority_domains: serde_json::from_str(&self.priority_domains)
                .map_err(|_| StoreError::CorruptJson("tasks.priority_domains".into()))?,
            status: if self.status == "stopped" {
                TaskStatus::Stopped
            } else {
                TaskStatus::Active
            },
            created_at: DateTime::parse_from_rfc3339(&self.created_at)
                .map_err(|_| StoreError::CorruptJson("tasks.created_at".into()))?
                .with_timezone(&Utc),
        })
    }
}

fn status_str(status: TaskStatus) -> &'static str {
    match status {
        TaskStatus::Active => "active",
        TaskStatus::Stopped => "stopped",
    }
}

#[derive(FromRow)]
struct SearchRow {
    id: String,
    task_id: String,
    query_text: String,
    engine: Option<String>,
    options_json: String,
    status: String,
    harvest_rate: f64,
    created_at: String,
}

impl SearchRow {
    fn into_search(self) -> Result<Search> {
        Ok(Search {
            id: Uuid::parse_str(&self.id).map_err(|_| StoreError::CorruptJson("queries.id".into()))?,
            task_id: Uuid::parse_str(&self.task_id).map_err(|_| StoreError::CorruptJson("queries.task_id".into()))?,
            query_text: self.query_text,
            engine: self.engine,
            options_json: serde_json::from_str(&self.options_json).unwrap_or(serde_json::json!({})),
            status: self.status,
            harvest_rate: self.harvest_rate,
            created_at: DateTime::parse_from_rfc3339(&self.created_at)
                .map_err(|_| StoreError::CorruptJson("queries.created_at".into()))?
                .with_timezone(&Utc),
        })
    }
}

impl EvidenceStore {
    /// Creates a task. `idempotency_key`, when supplied, makes repeated
    /// calls with the same hypothesis and key return the original task_id
    /// rather than inserting a second row (spec section 8: "Idempotence").
    pub async fn create_task(
        &self,
        hypothesis: &str,
        budget_pages: u32,
        priority_domains: &[String],
        idempotency_key: Option<&str>,
    ) -> Result<Task> {
        if let Some(key) = idempotency_key {
            if let Some(existing) = sqlx::query_as::<_, TaskRow>(
                "SELECT id, hypothesis, budget_pages, priority_domains, status, created_at \
                 FROM tasks WHERE idempotency_key = ? AND hypothesis = ?",
            )
            .bind(key)
            .bind(hypothesis)
            .fetch_optional(self.pool())
            .await?
            {
                return existing.into_task();
            }
        }

        let task = Task {
            id: lyra_core::new_id(),
            hypothesis: hypothesis.to_string(),
            budget_pages,
            priority_domains: priority_domains.to_vec(),
            status: TaskStatus::Active,
            created_at: lyra_core::now(),
        };

        sqlx::query(
            "INSERT INTO tasks (id, hypothesis, budget_pages, priority_domains, status, idempotency_key, created_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(task.id.to_string())
        .bind(&task.hypothesis)
        .bind(task.budget_pages as i64)
        .bind(serde_json::to_string(&task.priority_domains).unwrap())
        .bind(status_str(task.status))
        .bind(idempotency_key)
        .bind(task.created_at.to_rfc3339())
        .execute(self.pool())
        .await?;

        Ok(task)
    }

    pub async fn get_task(&self, id: Uuid) -> Result<Option<Task>> {
        let row = sqlx::query_as::<_, TaskRow>(
            "SELECT id, hypothesis, budget_pages, priority_domains, status, created_at FROM tasks WHERE id = ?",
        )
        .bind(id.to_string())
        .fetch_optional(self.pool())
        .await?;
        row.map(TaskRow::into_task).transpose()
    }

    /// `stop_task`: marks the task stopped. Job cancellation itself is the
    /// scheduler's responsibility; this only flips the durable status bit.
    pub async fn stop_task(&self, id: Uuid) -> Result<()> {
        sqlx::query("UPDATE tasks SET status = 'stopped' WHERE id = ?")
            .bind(id.to_string())
            .execute(self.pool())
            .await?;
        Ok(())
    }

    pub async fn create_search(
        &self,
        task_id: Uuid,
        query_text: &str,
        engine: Option<&str>,
        options_json: serde_json::Value,
    ) -> Result<Search> {
        let search = Search {
            id: lyra_core::new_id(),
            task_id,
            query_text: query_text.to_string(),
            engine: engine.map(str::to_string),
            options_json,
            status: "queued".to_string(),
            harvest_rate: 0.0,
            created_at: lyra_core::now(),
        };

        sqlx::query(
            "INSERT INTO queries (id, task_id, query_text, engine, options_json, status, harvest_rate, created_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(search.id.to_string())
        .bind(search.task_id.to_string())
        .bind(&search.query_text)
        .bind(&search.engine)
        .bind(search.options_json.to_string())
        .bind(&search.status)
        .bind(search.harvest_rate)
        .bind(search.created_at.to_rfc3339())
        .execute(self.pool())
        .await?;

        Ok(search)
    }

    pub async fn set_search_status(&self, id: Uuid, status: &str, harvest_rate: f64) -> Result<()> {
        sqlx::query("UPDATE queries SET status = ?, harvest_rate = ? WHERE id = ?")
            .bind(status)
            .bind(harvest_rate)
            .bind(id.to_string())
            .execute(self.pool())
            .await?;
        Ok(())
    }

    pub async fn get_search(&self, id: Uuid) -> Result<Option<Search>> {
        let row = sqlx::query_as::<_, SearchRow>(
            "SELECT id, task_id, query_text, engine, options_json, status, harvest_rate, created_at \
             FROM queries WHERE id = ?",
        )
        .bind(id.to_string())
        .fetch_optional(self.pool())
        .await?;
        row.map(SearchRow::into_search).transpose()
    }
}
