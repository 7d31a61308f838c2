use chrono::{DateTime, Utc};
use sqlx::FromRow;
use uuid::Uuid;

use crate::error::{Result, StoreError};
use crate::pool::EvidenceStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClaimAdoptionStatus {
    Adopted,
    NotAdopted,
}

impl ClaimAdoptionStatus {
    fn as_str(self) -> &'static str {
        match self {
            ClaimAdoptionStatus::Adopted => "adopted",
            ClaimAdoptionStatus::NotAdopted => "not_adopted",
        }
    }

    fn parse(raw: &str) -> Self {
        match raw {
            "not_adopted" => ClaimAdoptionStatus::NotAdopted,
            _ => ClaimAdoptionStatus::Adopted,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Claim {
    pub id: Uuid,
    pub task_id: Uuid,
    pub claim_text: String,
    pub adoption_status: ClaimAdoptionStatus,
    pub rejection_reason: Option<String>,
    pub rejected_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[derive(FromRow)]
struct ClaimRow {
    id: String,
    task_id: String,
    claim_text: String,
    claim_adoption_status: String,
    claim_rejection_reason: Option<String>,
    claim_rejected_at: Option<String>,
    created_at: String,
}

impl ClaimRow {
    fn into_claim(self) -> Result<Claim> {
        Ok(Claim {
            id: Uuid::parse_str(&self.id).map_err(|_| StoreError::CorruptJson("claims.id".into()))?,
            task_id: Uuid::parse_str(&self.task_id)
                .map_err(|_| StoreError::CorruptJson("claims.task_id".into()))?,
            claim_text: self.claim_text,
            adoption_status: ClaimAdoptionStatus::parse(&self.claim_adoption_status),
            rejection_reason: self.claim_rejection_reason,
            rejected_at: self
                .claim_rejected_at
                .as_deref()
                .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
                .map(|dt| dt.with_timezone(&Utc)),
            created_at: DateTime::parse_from_rfc3339(&self.created_at)
                .map_err(|_| StoreError::CorruptJson("claims.created_at".into()))?
                .with_timezone(&Utc),
        })
    }
}

const CLAIM_COLUMNS: &str =
    "id, task_id, claim_text, claim_adoption_status, claim_rejection_reason, claim_rejected_at, created_at";

impl EvidenceStore {
    pub async fn insert_claim(&self, task_id: Uuid, claim_text: &str) -> Result<Claim> {
        let claim = Claim {
            id: lyra_core::new_id(),
            task_id,
            claim_text: claim_text.to_string(),
            adoption_status: ClaimAdoptionStatus::Adopted,
            rejection_reason: None,
            rejected_at: None,
            created_at: lyra_core::now(),
        };

        sqlx::query(
            "INSERT INTO claims (id, task_id, claim_text, claim_adoption_status, created_at) \
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(claim.id.to_string())
        .bind(claim.task_id.to_string())
        .bind(&claim.claim_text)
        .bind(claim.adoption_status.as_str())
        .bind(claim.created_at.to_rfc3339())
        .execute(self.pool())
        .await?;

        Ok(claim)
    }

    pub async fn get_claim(&self, id: Uuid) -> Result<Option<Claim>> {
        let row = sqlx::query_as::<_, ClaimRow>(&format!("SELECT {CLAIM_COLUMNS} FROM claims WHERE id = ?"))
            .bind(id.to_string())
            .fetch_optional(self.pool())
            .await?;
        row.map(ClaimRow::into_claim).transpose()
    }

    pub async fn claims_for_task(&self, task_id: Uuid) -> Result<Vec<Claim>> {
        let rows = sqlx::query_as::<_, ClaimRow>(&format!(
            "SELECT {CLAIM_COLUMNS} FROM claims WHERE task_id = ? ORDER BY created_at"
        ))
        .bind(task_id.to_string())
        .fetch_all(self.pool())
        .await?;
        rows.into_iter().map(ClaimRow::into_claim).collect()
    }

    /// `feedback(action=claim_reject)`.
    pub async fn reject_claim(&self, id: Uuid, reason: &str) -> Result<()> {
        sqlx::query(
            "UPDATE claims SET claim_adoption_status = 'not_adopted', claim_rejection_reason = ?, claim_rejected_at = ? \
             WHERE id = ?",
        )
        .bind(reason)
        .bind(lyra_core::now().to_rfc3339())
        .bind(id.to_string())
        .execute(self.pool())
        .await?;
        Ok(())
    }

    /// `feedback(action=claim_restore)`.
    pub async fn restore_claim(&self, id: Uuid) -> Result<()> {
        sqlx::query(
            "UPDATE claims SET claim_adoption_status = 'adopted', claim_rejection_reason = NULL, claim_rejected_at = NULL \
             WHERE id = ?",
        )
        .bind(id.to_string())
        .execute(self.pool())
        .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn reject_then_restore_round_trips_status() {
        let store = EvidenceStore::in_memory().await.unwrap();
        let task = store.create_task("H1", 10, &[], None).await.unwrap();
        let claim = store.insert_claim(task.id, "claim text").await.unwrap();

        store.reject_claim(claim.id, "duplicate of another claim").await.unwrap();
        let rejected = store.get_claim(claim.id).await.unwrap().unwrap();
        assert_eq!(rejected.adoption_status, ClaimAdoptionStatus::NotAdopted);
        assert!(rejected.rejected_at.is_some());

        store.restore_claim(claim.id).await.unwrap();
        let restored = store.get_claim(claim.id).await.unwrap().unwrap();
        assert_eq!(restored.adoption_status, ClaimAdoptionStatus::Adopted);
        assert!(restored.rejected_at.is_none());
    }

    #[tokio::test]
    async fn claims_for_task_only_returns_that_tasks_claims() {
        let store = EvidenceStore::in_memory().await.unwrap();
        let task_a = store.create_task("H1", 10, &[], None).await.unwrap();
        let task_b = store.create_task("H2", 10, &[], None).await.unwrap();
        store.insert_claim(task_a.id, "claim a").await.unwrap();
        store.insert_claim(task_b.id, "claim b").await.unwrap();
        assert_eq!(store.claims_for_task(task_a.id).await.unwrap().len(), 1);
    }
}
