use chrono::{DateTime, Utc};
use sqlx::FromRow;

use crate::error::{Result, StoreError};
use crate::pool::EvidenceStore;

/// Point-in-time NLI agreement stats, computed from the `nli_corrections`
/// audit trail (spec 4.13 glossary: "human feedback is input, not a side
/// channel"). `agreement_rate` is the fraction of corrections where the
/// human's `correct_label` matched what the model predicted — i.e. how
/// often a human-reviewed edge turns out to have needed no correction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CalibrationStats {
    pub sample_count: i64,
    pub agreement_rate: f64,
}

/// One recorded `calibration_metrics(action=evaluate)` run.
#[derive(Debug, Clone)]
pub struct CalibrationEvaluation {
    pub version: i64,
    pub evaluated_at: DateTime<Utc>,
    pub sample_count: i64,
    pub agreement_rate: f64,
}

#[derive(FromRow)]
struct EvaluationRow {
    version: i64,
    evaluated_at: String,
    sample_count: i64,
    agreement_rate: f64,
}

impl EvaluationRow {
    fn into_evaluation(self) -> Result<CalibrationEvaluation> {
        Ok(CalibrationEvaluation {
            version: self.version,
            evaluated_at: DateTime::parse_from_rfc3339(&self.evaluated_at)
                .map_err(|_| StoreError::CorruptJson("calibration_evaluations.evaluated_at".into()))?
                .with_timezone(&Utc),
            sample_count: self.sample_count,
            agreement_rate: self.agreement_rate,
        })
    }
}

impl EvidenceStore {
    /// `calibration_metrics(action=get_stats)`: live stats over every
    /// correction recorded so far, not gated behind an `evaluate` call.
    pub async fn calibration_stats(&self) -> Result<CalibrationStats> {
        let row: (i64, i64) = sqlx::query_as(
            "SELECT COUNT(*), COALESCE(SUM(CASE WHEN predicted_label = correct_label THEN 1 ELSE 0 END), 0) \
             FROM nli_corrections",
        )
        .fetch_one(self.pool())
        .await?;
        let (total, agreeing) = row;
        let agreement_rate = if total == 0 { 1.0 } else { agreeing as f64 / total as f64 };
        Ok(CalibrationStats { sample_count: total, agreement_rate })
    }

    /// `calibration_metrics(action=evaluate)`: snapshots the current stats
    /// as a new, monotonically versioned evaluation row.
    pub async fn record_calibration_evaluation(&self) -> Result<CalibrationEvaluation> {
        let stats = self.calibration_stats().await?;
        let evaluated_at = lyra_core::now();
        let version: (i64,) = sqlx::query_as(
            "INSERT INTO calibration_evaluations (evaluated_at, sample_count, agreement_rate) VALUES (?, ?, ?) \
             RETURNING version",
        )
        .bind(evaluated_at.to_rfc3339())
        .bind(stats.sample_count)
        .bind(stats.agreement_rate)
        .fetch_one(self.pool())
        .await?;

        Ok(CalibrationEvaluation {
            version: version.0,
            evaluated_at,
            sample_count: stats.sample_count,
            agreement_rate: stats.agreement_rate,
        })
    }

    /// `calibration_metrics(action=get_evaluations)`, newest first.
    pub async fn calibration_evaluations(&self) -> Result<Vec<CalibrationEvaluation>> {
        let rows = sqlx::query_as::<_, EvaluationRow>(
            "SELECT version, evaluated_at, sample_count, agreement_rate FROM calibration_evaluations ORDER BY version DESC",
        )
        .fetch_all(self.pool())
        .await?;
        rows.into_iter().map(EvaluationRow::into_evaluation).collect()
    }

    /// `calibration_rollback(target_version)`: marks a previously recorded
    /// evaluation as active. This crate doesn't retrain or swap models —
    /// that stays an offline downstream process (spec 4.13 Non-goals) —
    /// so "rollback" here means pinning which evaluation the tool surface
    /// reports as current, nothing more.
    pub async fn rollback_calibration(&self, target_version: i64) -> Result<CalibrationEvaluation> {
        let exists: Option<(i64,)> = sqlx::query_as("SELECT version FROM calibration_evaluations WHERE version = ?")
            .bind(target_version)
            .fetch_optional(self.pool())
            .await?;
        if exists.is_none() {
            return Err(StoreError::NotFound("calibration_evaluation", uuid::Uuid::nil()));
        }

        sqlx::query(
            "INSERT INTO calibration_state (id, active_version) VALUES (1, ?) \
             ON CONFLICT(id) DO UPDATE SET active_version = excluded.active_version",
        )
        .bind(target_version)
        .execute(self.pool())
        .await?;

        self.calibration_evaluations()
            .await?
            .into_iter()
            .find(|evaluation| evaluation.version == target_version)
            .ok_or(StoreError::NotFound("calibration_evaluation", uuid::Uuid::nil()))
    }

    pub async fn active_calibration_version(&self) -> Result<Option<i64>> {
        let row: Option<(Option<i64>,)> = sqlx::query_as("SELECT active_version FROM calibration_state WHERE id = 1")
            .fetch_optional(self.pool())
            .await?;
        Ok(row.and_then(|(version,)| version))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fragments::FragmentKind;
    use crate::pages::NewPage;
    use lyra_core::{DomainCategory, NliRelation};

    async fn setup_corrected_edge(store: &EvidenceStore) -> uuid::Uuid {
        let task = store.create_task("H1", 10, &[], None).await.unwrap();
        let page = store
            .upsert_page(NewPage {
                url: "https://example.com/a".to_string(),
                doi: None,
                domain: "example.com".to_string(),
                title: None,
                metadata: serde_json::json!({}),
                warc_path: None,
                har_path: None,
                screenshot_path: None,
            })
            .await
            .unwrap();
        let fragment = store
            .insert_fragment(page.id, "fragment text", "hash-a", (0, 13), FragmentKind::Body)
            .await
            .unwrap();
        let claim = store.insert_claim(task.id, "claim text").await.unwrap();
        let edge = store
            .insert_nli_edge(
                fragment.id,
                claim.id,
                NliRelation::Neutral,
                "neutral",
                0.4,
                DomainCategory::Unverified,
                DomainCategory::Unverified,
            )
            .await
            .unwrap();
        store.correct_edge(edge.id, NliRelation::Supports, Some("obviously supports")).await.unwrap();
        edge.id
    }

    #[tokio::test]
    async fn stats_are_empty_with_perfect_agreement_before_any_corrections() {
        let store = EvidenceStore::in_memory().await.unwrap();
        let stats = store.calibration_stats().await.unwrap();
        assert_eq!(stats.sample_count, 0);
        assert_eq!(stats.agreement_rate, 1.0);
    }

    #[tokio::test]
    async fn a_correction_that_changes_the_label_lowers_agreement() {
        let store = EvidenceStore::in_memory().await.unwrap();
        setup_corrected_edge(&store).await;
        let stats = store.calibration_stats().await.unwrap();
        assert_eq!(stats.sample_count, 1);
        assert_eq!(stats.agreement_rate, 0.0);
    }

    #[tokio::test]
    async fn evaluations_are_versioned_and_listed_newest_first() {
        let store = EvidenceStore::in_memory().await.unwrap();
        setup_corrected_edge(&store).await;
        let first = store.record_calibration_evaluation().await.unwrap();
        let second = store.record_calibration_evaluation().await.unwrap();
        assert!(second.version > first.version);

        let history = store.calibration_evaluations().await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].version, second.version);
    }

    #[tokio::test]
    async fn rollback_pins_active_version_and_rejects_unknown_targets() {
        let store = EvidenceStore::in_memory().await.unwrap();
        setup_corrected_edge(&store).await;
        let evaluation = store.record_calibration_evaluation().await.unwrap();

        store.rollback_calibration(evaluation.version).await.unwrap();
        assert_eq!(store.active_calibration_version().await.unwrap(), Some(evaluation.version));

        assert!(store.rollback_calibration(9999).await.is_err());
    }
}
