use chrono::{DateTime, Utc};
use lyra_session::SessionState;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InterventionType {
    Captcha,
    Login,
    DomainBlocked,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InterventionStatus {
    Pending,
    InProgress,
    Solved,
    Skipped,
    Expired,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolveAction {
    Solved,
    Skipped,
    Expired,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InterventionItem {
    pub id: Uuid,
    pub task_id: Uuid,
    pub domain: String,
    pub url: String,
    pub intervention_type: InterventionType,
    pub status: InterventionStatus,
    pub created_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
    pub session_data: Option<SessionState>,
    pub diagnostic: String,
    /// Incremented each time a duplicate (task_id, domain, type) item would
    /// have been created while this one is still pending; used to elevate
    /// severity for the notifier rather than creating redundant rows
    /// (spec 4.6: "duplicates coalesce, elevating severity").
    pub severity: u32,
}

impl InterventionItem {
    pub fn new(
        task_id: Uuid,
        domain: impl Into<String>,
        url: impl Into<String>,
        intervention_type: InterventionType,
        diagnostic: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            task_id,
            domain: domain.into(),
            url: url.into(),
            intervention_type,
            status: InterventionStatus::Pending,
            created_at: Utc::now(),
            resolved_at: None,
            session_data: None,
            diagnostic: diagnostic.into(),
            severity: 1,
        }
    }
}
