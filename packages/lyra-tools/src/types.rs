//! Typed request/response shapes for every tool in the protocol table
//! (spec section 6). Transport-agnostic: these are plain, serde-derived
//! structs with no HTTP/RPC framing baked in.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use lyra_core::{DomainBlockReason, DomainUnblockRisk, StopMode};
use lyra_policy::OverrideDecision;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ---------------------------------------------------------------------
// create_task
// ---------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct TaskConfig {
    pub budget_pages: u32,
    #[serde(default)]
    pub priority_domains: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateTaskRequest {
    pub hypothesis: String,
    pub config: TaskConfig,
    #[serde(default)]
    pub idempotency_key: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CreateTaskResponse {
    pub task_id: Uuid,
}

pub const CREATE_TASK_FIELDS: &[&str] = &["task_id"];

// ---------------------------------------------------------------------
// queue_searches
// ---------------------------------------------------------------------

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchOptions {
    pub time_range: Option<String>,
    pub region: Option<String>,
    #[serde(default)]
    pub engines: Vec<String>,
    pub serp_max_pages: Option<u32>,
    pub budget_pages: Option<u32>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct QueueSearchesRequest {
    pub task_id: Uuid,
    pub queries: Vec<String>,
    #[serde(default)]
    pub options: SearchOptions,
}

#[derive(Debug, Clone, Serialize)]
pub struct QueueSearchesResponse {
    pub queued_ids: Vec<Uuid>,
}

pub const QUEUE_SEARCHES_FIELDS: &[&str] = &["queued_ids"];

// ---------------------------------------------------------------------
// get_status
// ---------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct GetStatusRequest {
    pub task_id: Uuid,
    #[serde(default)]
    pub wait_seconds: Option<u64>,
    #[serde(default)]
    pub since: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProgressCounters {
    pub queued: u64,
    pub running: u64,
    pub awaiting_auth: u64,
    pub done: u64,
    pub failed: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct BlockedDomainView {
    pub domain: String,
    pub blocked_at: Option<DateTime<Utc>>,
    pub domain_block_reason: DomainBlockReason,
    pub domain_unblock_risk: DomainUnblockRisk,
    pub r#override: Option<OverrideDecision>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DomainOverrideView {
    pub rule_id: Uuid,
    pub domain_pattern: String,
    pub decision: OverrideDecision,
    pub reason: Option<String>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct EvidenceSummaryView {
    pub claims_adopted: u64,
    pub claims_rejected: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct GetStatusResponse {
    pub task_id: Uuid,
    pub since: String,
    pub progress: ProgressCounters,
    pub auth_queue: Vec<Uuid>,
    pub blocked_domains: Vec<BlockedDomainView>,
    pub domain_overrides: Vec<DomainOverrideView>,
    pub evidence_summary: Option<EvidenceSummaryView>,
}

pub const GET_STATUS_FIELDS: &[&str] = &[
    "task_id",
    "since",
    "progress",
    "auth_queue",
    "blocked_domains",
    "domain_overrides",
    "evidence_summary",
];

// ---------------------------------------------------------------------
// stop_task
// ---------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct StopTaskRequest {
    pub task_id: Uuid,
    pub mode: StopMode,
}

#[derive(Debug, Clone, Serialize)]
pub struct StopTaskResponse {
    pub task_id: Uuid,
    pub mode: StopMode,
    pub jobs_remaining: u64,
}

pub const STOP_TASK_FIELDS: &[&str] = &["task_id", "mode", "jobs_remaining"];

// ---------------------------------------------------------------------
// query_sql / query_view
// ---------------------------------------------------------------------

#[derive(Debug, Clone, Default, Deserialize)]
pub struct QueryOptionsRequest {
    pub limit: Option<usize>,
    pub timeout_ms: Option<u64>,
    pub max_vm_steps: Option<u32>,
    #[serde(default)]
    pub include_schema: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct QuerySqlRequest {
    pub sql: String,
    #[serde(default)]
    pub options: QueryOptionsRequest,
}

#[derive(Debug, Clone, Deserialize)]
pub struct QueryViewRequest {
    pub view_name: String,
    #[serde(default)]
    pub params: HashMap<String, serde_json::Value>,
    #[serde(default)]
    pub options: QueryOptionsRequest,
}

#[derive(Debug, Clone, Serialize)]
pub struct QueryResultResponse {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<serde_json::Value>>,
    pub row_count: usize,
    pub truncated: bool,
    pub elapsed_ms: u64,
    pub schema: Option<Vec<TableSchemaView>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TableSchemaView {
    pub name: String,
    pub sql: String,
}

pub const QUERY_RESULT_FIELDS: &[&str] = &["columns", "rows", "row_count", "truncated", "elapsed_ms", "schema"];

#[derive(Debug, Clone, Serialize)]
pub struct ViewDescriptor {
    pub name: String,
    pub description: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ListViewsResponse {
    pub views: Vec<ViewDescriptor>,
}

pub const LIST_VIEWS_FIELDS: &[&str] = &["views"];

// ---------------------------------------------------------------------
// vector_search
// ---------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VectorSearchTarget {
    Fragments,
    Claims,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VectorSearchRequest {
    pub query_embedding: Vec<f32>,
    pub target: VectorSearchTarget,
    #[serde(default)]
    pub task_id: Option<Uuid>,
    pub top_k: usize,
    #[serde(default)]
    pub min_similarity: f32,
}

#[derive(Debug, Clone, Serialize)]
pub struct VectorSearchResultView {
    pub id: Uuid,
    pub text_preview: String,
    pub similarity: f32,
}

#[derive(Debug, Clone, Serialize)]
pub struct VectorSearchResponse {
    pub results: Vec<VectorSearchResultView>,
}

pub const VECTOR_SEARCH_FIELDS: &[&str] = &["results"];

// ---------------------------------------------------------------------
// get_auth_queue / resolve_auth
// ---------------------------------------------------------------------

#[derive(Debug, Clone, Default, Deserialize)]
pub struct GetAuthQueueRequest {
    #[serde(default)]
    pub task_id: Option<Uuid>,
}

#[derive(Debug, Clone, Serialize)]
pub struct InterventionItemView {
    pub id: Uuid,
    pub task_id: Uuid,
    pub domain: String,
    pub url: String,
    pub intervention_type: lyra_intervention::InterventionType,
    pub status: lyra_intervention::InterventionStatus,
    pub created_at: DateTime<Utc>,
    pub severity: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct GetAuthQueueResponse {
    pub items: Vec<InterventionItemView>,
}

pub const GET_AUTH_QUEUE_FIELDS: &[&str] = &["items"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolveAuthAction {
    Solved,
    Skipped,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ResolveAuthRequest {
    pub queue_id: Uuid,
    pub action: ResolveAuthAction,
    #[serde(default)]
    pub domain: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ResolveAuthResponse {
    pub resolved_count: usize,
}

pub const RESOLVE_AUTH_FIELDS: &[&str] = &["resolved_count"];

// ---------------------------------------------------------------------
// feedback
// ---------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum FeedbackRequest {
    DomainBlock { domain_pattern: String, reason: Option<String> },
    DomainUnblock { domain_pattern: String, reason: Option<String> },
    DomainClearOverride { rule_id: Uuid },
    ClaimReject { claim_id: Uuid, reason: String },
    ClaimRestore { claim_id: Uuid },
    EdgeCorrect { edge_id: Uuid, correct_relation: lyra_core::NliRelation, reason: Option<String> },
}

#[derive(Debug, Clone, Serialize)]
pub struct FeedbackResponse {
    pub acknowledged: bool,
}

pub const FEEDBACK_FIELDS: &[&str] = &["acknowledged"];

// ---------------------------------------------------------------------
// calibration_metrics / calibration_rollback
// ---------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum CalibrationMetricsRequest {
    GetStats,
    Evaluate,
    GetEvaluations,
}

#[derive(Debug, Clone, Serialize)]
pub struct CalibrationEvaluationView {
    pub version: i64,
    pub evaluated_at: DateTime<Utc>,
    pub sample_count: i64,
    pub agreement_rate: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct CalibrationMetricsResponse {
    pub sample_count: i64,
    pub agreement_rate: f64,
    pub evaluations: Vec<CalibrationEvaluationView>,
}

pub const CALIBRATION_METRICS_FIELDS: &[&str] = &["sample_count", "agreement_rate", "evaluations"];

#[derive(Debug, Clone, Deserialize)]
pub struct CalibrationRollbackRequest {
    pub target_version: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct CalibrationRollbackResponse {
    pub active_version: i64,
}

pub const CALIBRATION_ROLLBACK_FIELDS: &[&str] = &["active_version"];
