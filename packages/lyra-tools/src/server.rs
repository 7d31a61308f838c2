//! `ToolServer`: one async method per entry in the tool protocol table
//! (spec 4.16), each wiring [`EvidenceStore`]/[`Scheduler`]/[`SqlEngine`]/
//! the intervention queue/override lookup together, then sanitizing and
//! scrubbing the result before it crosses the tool boundary.

use std::sync::Arc;

use lyra_core::JobKind;
use lyra_intervention::{InterventionQueue, ResolveAction};
use lyra_policy::OverrideDecision;
use lyra_scheduler::Scheduler;
use lyra_sql::{QueryOptions, QueryResult, SqlEngine};
use lyra_store::{EvidenceStore, SqliteOverrideLookup};
use serde_json::Value;
use uuid::Uuid;

use crate::error::{Result, ToolError};
use crate::scrub::PromptScrubber;
use crate::status;
use crate::types::*;

pub struct ToolServer {
    store: EvidenceStore,
    scheduler: Arc<Scheduler>,
    sql: SqlEngine,
    interventions: Arc<dyn InterventionQueue>,
    overrides: Arc<SqliteOverrideLookup>,
    scrubber: PromptScrubber,
}

impl ToolServer {
    pub fn new(
        store: EvidenceStore,
        scheduler: Arc<Scheduler>,
        sql: SqlEngine,
        interventions: Arc<dyn InterventionQueue>,
        overrides: Arc<SqliteOverrideLookup>,
        system_prompt_text: &str,
    ) -> Self {
        Self { store, scheduler, sql, interventions, overrides, scrubber: PromptScrubber::new(system_prompt_text) }
    }

    pub async fn create_task(&self, request: CreateTaskRequest) -> Result<CreateTaskResponse> {
        let task = self
            .store
            .create_task(
                &request.hypothesis,
                request.config.budget_pages,
                &request.config.priority_domains,
                request.idempotency_key.as_deref(),
            )
            .await?;
        Ok(CreateTaskResponse { task_id: task.id })
    }

    pub async fn queue_searches(&self, request: QueueSearchesRequest) -> Result<QueueSearchesResponse> {
        self.store.get_task(request.task_id).await?.ok_or(ToolError::UnknownTask(request.task_id))?;

        let mut queued_ids = Vec::with_capacity(request.queries.len());
        for query_text in &request.queries {
            let options_json = serde_json::to_value(&request.options).unwrap_or(Value::Null);
            let engine = request.options.engines.first().map(String::as_str);
            let search = self.store.create_search(request.task_id, query_text, engine, options_json).await?;
            self.scheduler
                .enqueue(
                    JobKind::Serp,
                    serde_json::json!({"search_id": search.id, "query": query_text}),
                    None,
                    Some(request.task_id),
                )
                .await?;
            queued_ids.push(search.id);
        }
        Ok(QueueSearchesResponse { queued_ids })
    }

    pub async fn get_status(&self, request: GetStatusRequest) -> Result<GetStatusResponse> {
        status::poll_status(&self.store, &self.overrides, request.task_id, request.since, request.wait_seconds).await
    }

    pub async fn stop_task(&self, request: StopTaskRequest) -> Result<StopTaskResponse> {
        self.store.get_task(request.task_id).await?.ok_or(ToolError::UnknownTask(request.task_id))?;
        self.scheduler.stop_task(request.task_id, request.mode).await?;
        let jobs = self.store.jobs_for_task(request.task_id).await?;
        let jobs_remaining = jobs
            .iter()
            .filter(|job| {
                matches!(
                    job.state,
                    lyra_store::JobState::Queued | lyra_store::JobState::Running | lyra_store::JobState::AwaitingAuth
                )
            })
            .count() as u64;
        Ok(StopTaskResponse { task_id: request.task_id, mode: request.mode, jobs_remaining })
    }

    pub async fn query_sql(&self, request: QuerySqlRequest) -> Result<QueryResultResponse> {
        let options = to_query_options(request.options);
        let result = self.sql.query(&request.sql, options).await?;
        Ok(from_query_result(result))
    }

    pub async fn query_view(&self, request: QueryViewRequest) -> Result<QueryResultResponse> {
        let options = to_query_options(request.options);
        let result = self.sql.query_view(&request.view_name, &request.params, options).await?;
        Ok(from_query_result(result))
    }

    pub async fn list_views(&self) -> Result<ListViewsResponse> {
        let views = self
            .sql
            .list_views()
            .into_iter()
            .map(|view| ViewDescriptor { name: view.name.to_string(), description: view.description.to_string() })
            .collect();
        Ok(ListViewsResponse { views })
    }

    pub async fn vector_search(&self, request: VectorSearchRequest) -> Result<VectorSearchResponse> {
        let target_type = match request.target {
            VectorSearchTarget::Fragments => lyra_store::TargetType::Fragment,
            VectorSearchTarget::Claims => lyra_store::TargetType::Claim,
        };
        let results = self
            .store
            .vector_search(&request.query_embedding, target_type, request.task_id, request.top_k, request.min_similarity)
            .await?;
        Ok(VectorSearchResponse {
            results: results
                .into_iter()
                .map(|result| VectorSearchResultView {
                    id: result.target_id,
                    text_preview: self.scrubber.scrub(&result.text_preview),
                    similarity: result.similarity,
                })
                .collect(),
        })
    }

    pub async fn get_auth_queue(&self, request: GetAuthQueueRequest) -> Result<GetAuthQueueResponse> {
        let items = self.interventions.list_pending(request.task_id).await?;
        Ok(GetAuthQueueResponse {
            items: items
                .into_iter()
                .map(|item| InterventionItemView {
                    id: item.id,
                    task_id: item.task_id,
                    domain: item.domain,
                    url: item.url,
                    intervention_type: item.intervention_type,
                    status: item.status,
                    created_at: item.created_at,
                    severity: item.severity,
                })
                .collect(),
        })
    }

    pub async fn resolve_auth(&self, request: ResolveAuthRequest) -> Result<ResolveAuthResponse> {
        let action = match request.action {
            ResolveAuthAction::Solved => ResolveAction::Solved,
            ResolveAuthAction::Skipped => ResolveAction::Skipped,
        };
        let resolved_count = if let Some(domain) = request.domain.as_deref() {
            self.interventions.complete_domain(domain, action, None).await?.len()
        } else {
            self.interventions.complete(request.queue_id, action, None).await?;
            1
        };
        Ok(ResolveAuthResponse { resolved_count })
    }

    pub async fn feedback(&self, request: FeedbackRequest) -> Result<FeedbackResponse> {
        match request {
            FeedbackRequest::DomainBlock { domain_pattern, reason } => {
                self.store.create_override_rule(&domain_pattern, OverrideDecision::Block, reason.as_deref()).await?;
            }
            FeedbackRequest::DomainUnblock { domain_pattern, reason } => {
                self.store.create_override_rule(&domain_pattern, OverrideDecision::Unblock, reason.as_deref()).await?;
            }
            FeedbackRequest::DomainClearOverride { rule_id } => {
                self.store.clear_override_rule(rule_id).await?;
            }
            FeedbackRequest::ClaimReject { claim_id, reason } => {
                self.store.reject_claim(claim_id, &reason).await?;
            }
            FeedbackRequest::ClaimRestore { claim_id } => {
                self.store.restore_claim(claim_id).await?;
            }
            FeedbackRequest::EdgeCorrect { edge_id, correct_relation, reason } => {
                self.store.correct_edge(edge_id, correct_relation, reason.as_deref()).await?;
            }
        }
        self.overrides.refresh(self.store.pool()).await?;
        Ok(FeedbackResponse { acknowledged: true })
    }

    pub async fn calibration_metrics(&self, request: CalibrationMetricsRequest) -> Result<CalibrationMetricsResponse> {
        let (stats, evaluations) = match request {
            CalibrationMetricsRequest::GetStats => (self.store.calibration_stats().await?, Vec::new()),
            CalibrationMetricsRequest::Evaluate => {
                let evaluation = self.store.record_calibration_evaluation().await?;
                let stats = lyra_store::CalibrationStats {
                    sample_count: evaluation.sample_count,
                    agreement_rate: evaluation.agreement_rate,
                };
                (stats, vec![evaluation])
            }
            CalibrationMetricsRequest::GetEvaluations => {
                (self.store.calibration_stats().await?, self.store.calibration_evaluations().await?)
            }
        };
        Ok(CalibrationMetricsResponse {
            sample_count: stats.sample_count,
            agreement_rate: stats.agreement_rate,
            evaluations: evaluations
                .into_iter()
                .map(|evaluation| CalibrationEvaluationView {
                    version: evaluation.version,
                    evaluated_at: evaluation.evaluated_at,
                    sample_count: evaluation.sample_count,
                    agreement_rate: evaluation.agreement_rate,
                })
                .collect(),
        })
    }

    pub async fn calibration_rollback(&self, request: CalibrationRollbackRequest) -> Result<CalibrationRollbackResponse> {
        let evaluation = self.store.rollback_calibration(request.target_version).await.map_err(|err| match err {
            lyra_store::StoreError::NotFound("calibration_evaluation", _) => {
                ToolError::UnknownCalibrationVersion(request.target_version)
            }
            other => ToolError::Store(other),
        })?;
        Ok(CalibrationRollbackResponse { active_version: evaluation.version })
    }
}

fn to_query_options(request: QueryOptionsRequest) -> QueryOptions {
    let mut options = QueryOptions::default();
    if let Some(limit) = request.limit {
        options.limit = limit;
    }
    if let Some(timeout_ms) = request.timeout_ms {
        options.timeout_ms = timeout_ms;
    }
    if let Some(max_vm_steps) = request.max_vm_steps {
        options.max_vm_steps = max_vm_steps;
    }
    options.include_schema = request.include_schema;
    options.clamped()
}

fn from_query_result(result: QueryResult) -> QueryResultResponse {
    QueryResultResponse {
        columns: result.columns,
        rows: result.rows,
        row_count: result.row_count,
        truncated: result.truncated,
        elapsed_ms: result.elapsed_ms,
        schema: result.schema.map(|tables| {
            tables.into_iter().map(|table| TableSchemaView { name: table.name, sql: table.sql }).collect()
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lyra_intervention::InMemoryInterventionQueue;

    async fn test_server() -> ToolServer {
        let store = EvidenceStore::in_memory().await.unwrap();
        let scheduler = Scheduler::new(store.clone());
        let sql = SqlEngine::open("file::memory:?cache=shared").await.unwrap();
        let interventions: Arc<dyn InterventionQueue> = Arc::new(InMemoryInterventionQueue::new());
        let overrides = SqliteOverrideLookup::new();
        ToolServer::new(store, scheduler, sql, interventions, overrides, "test system prompt text here")
    }

    #[tokio::test]
    async fn create_task_then_get_status_round_trips() {
        let server = test_server().await;
        let created = server
            .create_task(CreateTaskRequest {
                hypothesis: "coffee reduces risk of X".to_string(),
                config: TaskConfig { budget_pages: 25, priority_domains: vec![] },
                idempotency_key: None,
            })
            .await
            .unwrap();

        let status = server
            .get_status(GetStatusRequest { task_id: created.task_id, wait_seconds: None, since: None })
            .await
            .unwrap();
        assert_eq!(status.task_id, created.task_id);
        assert_eq!(status.progress.queued, 0);
    }

    #[tokio::test]
    async fn get_status_for_unknown_task_is_rejected() {
        let server = test_server().await;
        let result = server.get_status(GetStatusRequest { task_id: Uuid::new_v4(), wait_seconds: None, since: None }).await;
        assert!(matches!(result, Err(ToolError::UnknownTask(_))));
    }

    #[tokio::test]
    async fn domain_block_feedback_is_visible_in_status() {
        let server = test_server().await;
        let created = server
            .create_task(CreateTaskRequest {
                hypothesis: "H".to_string(),
                config: TaskConfig { budget_pages: 5, priority_domains: vec![] },
                idempotency_key: None,
            })
            .await
            .unwrap();

        server
            .feedback(FeedbackRequest::DomainBlock { domain_pattern: "spam.example".to_string(), reason: Some("manual block".to_string()) })
            .await
            .unwrap();

        let status = server
            .get_status(GetStatusRequest { task_id: created.task_id, wait_seconds: None, since: None })
            .await
            .unwrap();
        assert_eq!(status.domain_overrides.len(), 1);
        assert_eq!(status.domain_overrides[0].domain_pattern, "spam.example");
    }

    #[tokio::test]
    async fn list_views_returns_the_built_in_catalog() {
        let server = test_server().await;
        let response = server.list_views().await.unwrap();
        assert!(!response.views.is_empty());
    }
}
