use chrono::{DateTime, Utc};
use lyra_core::{DomainBlockReason, DomainCategory, DomainUnblockRisk};
use lyra_policy::OverrideDecision;
use sqlx::FromRow;

use crate::error::{Result, StoreError};
use crate::overrides::SqliteOverrideLookup;
use crate::pool::EvidenceStore;

/// Combined rejection rate above which a domain is auto-blocked, provided
/// at least [`MIN_REJECTION_SAMPLE`] claims have been observed (spec 4.17
/// names the rule but leaves the constants to the implementation; decided
/// in the design ledger).
const REJECTION_RATE_THRESHOLD: f64 = 0.5;
const MIN_REJECTION_SAMPLE: i64 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClaimOutcome {
    Verified,
    Pending,
    RejectedSecurity,
    RejectedManual,
}

#[derive(Debug, Clone)]
pub struct DomainState {
    pub host: String,
    pub category: DomainCategory,
    pub security_rejected_claims: i64,
    pub manual_rejected_claims: i64,
    pub total_claims: i64,
    pub dangerous_pattern: bool,
    pub blocked_at: Option<DateTime<Utc>>,
    pub domain_block_reason: Option<DomainBlockReason>,
}

impl DomainState {
    pub fn security_rejection_rate(&self) -> f64 {
        rate(self.security_rejected_claims, self.total_claims)
    }

    pub fn manual_rejection_rate(&self) -> f64 {
        rate(self.manual_rejected_claims, self.total_claims)
    }

    /// Duplicate-safe union: a claim rejected on both grounds counts once.
    /// `security_rejected_claims`/`manual_rejected_claims` are independent
    /// counters, so the union is bounded by their sum but never exceeds
    /// `total_claims`.
    pub fn combined_rejection_rate(&self) -> f64 {
        let union = (self.security_rejected_claims + self.manual_rejected_claims).min(self.total_claims);
        rate(union, self.total_claims)
    }

    pub fn unblock_risk(&self) -> Option<DomainUnblockRisk> {
        self.domain_block_reason.map(DomainBlockReason::unblock_risk)
    }
}

fn rate(count: i64, total: i64) -> f64 {
    if total == 0 { 0.0 } else { count as f64 / total as f64 }
}

fn category_str(category: DomainCategory) -> &'static str {
    match category {
        DomainCategory::Government => "government",
        DomainCategory::Academic => "academic",
        DomainCategory::News => "news",
        DomainCategory::Commercial => "commercial",
        DomainCategory::Unverified => "unverified",
    }
}

fn parse_category(raw: &str) -> DomainCategory {
    match raw {
        "government" => DomainCategory::Government,
        "academic" => DomainCategory::Academic,
        "news" => DomainCategory::News,
        "commercial" => DomainCategory::Commercial,
        _ => DomainCategory::Unverified,
    }
}

fn block_reason_str(reason: DomainBlockReason) -> &'static str {
    match reason {
        DomainBlockReason::DangerousPattern => "dangerous_pattern",
        DomainBlockReason::HighRejectionRate => "high_rejection_rate",
        DomainBlockReason::Denylist => "denylist",
        DomainBlockReason::Manual => "manual",
        DomainBlockReason::Unknown => "unknown",
    }
}

fn parse_block_reason(raw: &str) -> DomainBlockReason {
    match raw {
        "dangerous_pattern" => DomainBlockReason::DangerousPattern,
        "high_rejection_rate" => DomainBlockReason::HighRejectionRate,
        "denylist" => DomainBlockReason::Denylist,
        "manual" => DomainBlockReason::Manual,
        _ => DomainBlockReason::Unknown,
    }
}

#[derive(FromRow)]
struct StateRow {
    host: String,
    category: String,
    security_rejected_claims: i64,
    manual_rejected_claims: i64,
    total_claims: i64,
    dangerous_pattern: i64,
    blocked_at: Option<String>,
    domain_block_reason: Option<String>,
}

impl StateRow {
    fn into_state(self) -> Result<DomainState> {
        Ok(DomainState {
            host: self.host,
            category: parse_category(&self.category),
            security_rejected_claims: self.security_rejected_claims,
            manual_rejected_claims: self.manual_rejected_claims,
            total_claims: self.total_claims,
            dangerous_pattern: self.dangerous_pattern != 0,
            blocked_at: self
                .blocked_at
                .map(|raw| {
                    DateTime::parse_from_rfc3339(&raw)
                        .map(|dt| dt.with_timezone(&Utc))
                        .map_err(|_| StoreError::CorruptJson("domain_state.blocked_at".into()))
                })
                .transpose()?,
            domain_block_reason: self.domain_block_reason.as_deref().map(parse_block_reason),
        })
    }
}

impl EvidenceStore {
    pub async fn get_domain_state(&self, host: &str) -> Result<Option<DomainState>> {
        let row = sqlx::query_as::<_, StateRow>(
            "SELECT host, category, security_rejected_claims, manual_rejected_claims, total_claims, \
             dangerous_pattern, blocked_at, domain_block_reason FROM domain_state WHERE host = ?",
        )
        .bind(host)
        .fetch_optional(self.pool())
        .await?;
        row.map(StateRow::into_state).transpose()
    }

    async fn ensure_domain_state(&self, host: &str, category: DomainCategory) -> Result<()> {
        sqlx::query(
            "INSERT INTO domain_state (host, category, security_rejected_claims, manual_rejected_claims, total_claims, dangerous_pattern) \
             VALUES (?, ?, 0, 0, 0, 0) ON CONFLICT(host) DO NOTHING",
        )
        .bind(host)
        .bind(category_str(category))
        .execute(self.pool())
        .await?;
        Ok(())
    }

    /// Records a per-claim verification outcome against the domain that
    /// hosted the evidence, then evaluates the `high_rejection_rate` block
    /// rule (spec 4.17). Returns the domain's state after the update so
    /// the caller can act on a freshly triggered block.
    pub async fn record_claim_outcome(
        &self,
        host: &str,
        category: DomainCategory,
        outcome: ClaimOutcome,
    ) -> Result<DomainState> {
        self.ensure_domain_state(host, category).await?;

        let (security_delta, manual_delta) = match outcome {
            ClaimOutcome::Verified | ClaimOutcome::Pending => (0, 0),
            ClaimOutcome::RejectedSecurity => (1, 0),
            ClaimOutcome::RejectedManual => (0, 1),
        };

        sqlx::query(
            "UPDATE domain_state SET total_claims = total_claims + 1, \
             security_rejected_claims = security_rejected_claims + ?, \
             manual_rejected_claims = manual_rejected_claims + ? WHERE host = ?",
        )
        .bind(security_delta)
        .bind(manual_delta)
        .bind(host)
        .execute(self.pool())
        .await?;

        let state = self.get_domain_state(host).await?.expect("just upserted above");

        if state.domain_block_reason.is_none()
            && state.total_claims >= MIN_REJECTION_SAMPLE
            && state.combined_rejection_rate() > REJECTION_RATE_THRESHOLD
        {
            return self.block_domain(host, DomainBlockReason::HighRejectionRate).await;
        }
        Ok(state)
    }

    /// `dangerous_pattern` → immediate block, independent of sample size.
    pub async fn mark_dangerous_pattern(&self, host: &str, category: DomainCategory) -> Result<DomainState> {
        self.ensure_domain_state(host, category).await?;
        sqlx::query("UPDATE domain_state SET dangerous_pattern = 1 WHERE host = ?")
            .bind(host)
            .execute(self.pool())
            .await?;
        self.block_domain(host, DomainBlockReason::DangerousPattern).await
    }

    async fn block_domain(&self, host: &str, reason: DomainBlockReason) -> Result<DomainState> {
        sqlx::query("UPDATE domain_state SET blocked_at = ?, domain_block_reason = ? WHERE host = ?")
            .bind(lyra_core::now().to_rfc3339())
            .bind(block_reason_str(reason))
            .bind(host)
            .execute(self.pool())
            .await?;
        self.get_domain_state(host).await?.ok_or_else(|| StoreError::CorruptJson("domain_state".into()))
    }

    /// `blocked_domains[]` for `get_status`, joined against the active
    /// override cache so a client sees whether an unblock rule already
    /// applies (spec 6: "`override` (if an unblock rule matches)").
    pub async fn blocked_domains(&self, lookup: &SqliteOverrideLookup) -> Result<Vec<BlockedDomain>> {
        let rows = sqlx::query_as::<_, StateRow>(
            "SELECT host, category, security_rejected_claims, manual_rejected_claims, total_claims, \
             dangerous_pattern, blocked_at, domain_block_reason FROM domain_state WHERE domain_block_reason IS NOT NULL",
        )
        .fetch_all(self.pool())
        .await?;

        rows.into_iter()
            .map(StateRow::into_state)
            .map(|state| {
                let state = state?;
                let reason = state.domain_block_reason.expect("filtered by query");
                let override_decision = lookup.active_override(&state.host);
                Ok(BlockedDomain {
                    domain: state.host.clone(),
                    blocked_at: state.blocked_at,
                    domain_block_reason: reason,
                    domain_unblock_risk: reason.unblock_risk(),
                    r#override: override_decision,
                })
            })
            .collect()
    }
}

#[derive(Debug, Clone)]
pub struct BlockedDomain {
    pub domain: String,
    pub blocked_at: Option<DateTime<Utc>>,
    pub domain_block_reason: DomainBlockReason,
    pub domain_unblock_risk: DomainUnblockRisk,
    pub r#override: Option<OverrideDecision>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn rejection_counters_accumulate_rates_correctly() {
        let store = EvidenceStore::in_memory().await.unwrap();
        store.record_claim_outcome("news.example", DomainCategory::News, ClaimOutcome::Verified).await.unwrap();
        store.record_claim_outcome("news.example", DomainCategory::News, ClaimOutcome::RejectedSecurity).await.unwrap();
        let state = store.record_claim_outcome("news.example", DomainCategory::News, ClaimOutcome::RejectedManual).await.unwrap();

        assert_eq!(state.total_claims, 3);
        assert!((state.security_rejection_rate() - (1.0 / 3.0)).abs() < 1e-9);
        assert!((state.manual_rejection_rate() - (1.0 / 3.0)).abs() < 1e-9);
        assert!((state.combined_rejection_rate() - (2.0 / 3.0)).abs() < 1e-9);
    }

    #[tokio::test]
    async fn high_rejection_rate_triggers_automatic_block_once_sample_met() {
        let store = EvidenceStore::in_memory().await.unwrap();
        store.record_claim_outcome("bad.example", DomainCategory::Unverified, ClaimOutcome::RejectedSecurity).await.unwrap();
        let state = store.record_claim_outcome("bad.example", DomainCategory::Unverified, ClaimOutcome::RejectedSecurity).await.unwrap();
        assert!(state.domain_block_reason.is_none(), "sample size below minimum should not block yet");

        let state = store.record_claim_outcome("bad.example", DomainCategory::Unverified, ClaimOutcome::RejectedManual).await.unwrap();
        assert_eq!(state.domain_block_reason, Some(DomainBlockReason::HighRejectionRate));
        assert_eq!(state.unblock_risk(), Some(DomainUnblockRisk::Low));
    }

    #[tokio::test]
    async fn dangerous_pattern_blocks_immediately_regardless_of_sample_size() {
        let store = EvidenceStore::in_memory().await.unwrap();
        let state = store.mark_dangerous_pattern("malware.example", DomainCategory::Unverified).await.unwrap();
        assert_eq!(state.domain_block_reason, Some(DomainBlockReason::DangerousPattern));
        assert_eq!(state.unblock_risk(), Some(DomainUnblockRisk::High));
    }

    #[tokio::test]
    async fn blocked_domains_surfaces_matching_override() {
        let store = EvidenceStore::in_memory().await.unwrap();
        store.mark_dangerous_pattern("flagged.example", DomainCategory::Unverified).await.unwrap();
        store
            .create_override_rule("flagged.example", OverrideDecision::Unblock, Some("verified safe by operator"))
            .await
            .unwrap();

        let lookup = SqliteOverrideLookup::new();
        lookup.refresh(store.pool()).await.unwrap();

        let blocked = store.blocked_domains(&lookup).await.unwrap();
        assert_eq!(blocked.len(), 1);
        assert_eq!(blocked[0].r#override, Some(OverrideDecision::Unblock));
    }
}
