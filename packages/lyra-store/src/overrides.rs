use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use lyra_policy::{OverrideDecision, OverrideLookup};
use sqlx::FromRow;
use sqlx::sqlite::SqlitePool;
use uuid::Uuid;

use crate::error::Result;

#[derive(Debug, Clone)]
pub struct DomainOverrideRule {
    pub id: Uuid,
    pub domain_pattern: String,
    pub decision: OverrideDecision,
    pub reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub is_active: bool,
}

fn decision_str(decision: OverrideDecision) -> &'static str {
    match decision {
        OverrideDecision::Block => "block",
        OverrideDecision::Unblock => "unblock",
    }
}

fn parse_decision(raw: &str) -> OverrideDecision {
    if raw == "unblock" {
        OverrideDecision::Unblock
    } else {
        OverrideDecision::Block
    }
}

#[derive(FromRow)]
struct RuleRow {
    id: String,
    domain_pattern: String,
    decision: String,
    reason: Option<String>,
    created_at: String,
    updated_at: String,
    is_active: i64,
}

impl RuleRow {
    fn into_rule(self) -> DomainOverrideRule {
        DomainOverrideRule {
            id: Uuid::parse_str(&self.id).unwrap_or_else(|_| lyra_core::new_id()),
            domain_pattern: self.domain_pattern,
            decision: parse_decision(&self.decision),
            reason: self.reason,
            created_at: DateTime::parse_from_rfc3339(&self.created_at)
                .map(|dt| dt.with_timezone(&Utc))
                .unwrap_or_else(|_| lyra_core::now()),
            updated_at: DateTime::parse_from_rfc3339(&self.updated_at)
                .map(|dt| dt.with_timezone(&Utc))
                .unwrap_or_else(|_| lyra_core::now()),
            is_active: self.is_active != 0,
        }
    }
}

/// Durable `OverrideLookup` backed by `domain_override_rules`, kept
/// cheap to query from `lyra-policy`'s synchronous `policy_for` path by
/// mirroring active rules into an in-memory cache (design note:
/// "Globals/singletons -> explicit state handles ... hot reload updates
/// their internal tables via a notify callback"). `refresh` repopulates
/// the cache from the database; `feedback(domain_block/unblock)` calls on
/// `EvidenceStore` update both the row and the cache in the same call.
pub struct SqliteOverrideLookup {
    cache: DashMap<String, OverrideDecision>,
}

impl SqliteOverrideLookup {
    pub fn new() -> Arc<Self> {
        Arc::new(Self { cache: DashMap::new() })
    }

    pub async fn refresh(&self, pool: &SqlitePool) -> Result<()> {
        let rows = sqlx::query_as::<_, RuleRow>(
            "SELECT id, domain_pattern, decision, reason, created_at, updated_at, is_active \
             FROM domain_override_rules WHERE is_active = 1",
        )
        .fetch_all(pool)
        .await?;
        self.cache.clear();
        for row in rows {
            let rule = row.into_rule();
            self.cache.insert(rule.domain_pattern, rule.decision);
        }
        Ok(())
    }
}

impl Default for SqliteOverrideLookup {
    fn default() -> Self {
        Self { cache: DashMap::new() }
    }
}

impl OverrideLookup for SqliteOverrideLookup {
    fn active_override(&self, host: &str) -> Option<OverrideDecision> {
        if let Some(decision) = self.cache.get(host) {
            return Some(*decision);
        }
        self.cache
            .iter()
            .find(|entry| lyra_policy::pattern::matches(entry.key(), host))
            .map(|entry| *entry.value())
    }
}

use crate::pool::EvidenceStore;

impl EvidenceStore {
    /// `feedback(action=domain_block|domain_unblock)`: appends a new
    /// override rule (append-only source of truth per spec section 3) and
    /// writes the corresponding audit event. The caller is responsible for
    /// also calling `SqliteOverrideLookup::refresh` (or updating its own
    /// handle) so the change takes effect immediately rather than waiting
    /// for the next scheduled refresh.
    pub async fn create_override_rule(
        &self,
        domain_pattern: &str,
        decision: OverrideDecision,
        reason: Option<&str>,
    ) -> Result<DomainOverrideRule> {
        let rule = DomainOverrideRule {
            id: lyra_core::new_id(),
            domain_pattern: domain_pattern.to_string(),
            decision,
            reason: reason.map(str::to_string),
            created_at: lyra_core::now(),
            updated_at: lyra_core::now(),
            is_active: true,
        };

        sqlx::query(
            "INSERT INTO domain_override_rules (id, domain_pattern, decision, reason, created_at, updated_at, is_active) \
             VALUES (?, ?, ?, ?, ?, ?, 1)",
        )
        .bind(rule.id.to_string())
        .bind(&rule.domain_pattern)
        .bind(decision_str(rule.decision))
        .bind(&rule.reason)
        .bind(rule.created_at.to_rfc3339())
        .bind(rule.updated_at.to_rfc3339())
        .execute(self.pool())
        .await?;

        self.record_override_event(rule.id, &rule.domain_pattern, rule.decision, rule.reason.as_deref(), "create")
            .await?;

        Ok(rule)
    }

    /// `feedback(action=domain_clear_override)`.
    pub async fn clear_override_rule(&self, rule_id: Uuid) -> Result<()> {
        let rule = sqlx::query_as::<_, RuleRow>(
            "SELECT id, domain_pattern, decision, reason, created_at, updated_at, is_active \
             FROM domain_override_rules WHERE id = ?",
        )
        .bind(rule_id.to_string())
        .fetch_optional(self.pool())
        .await?
        .map(RuleRow::into_rule);

        sqlx::query("UPDATE domain_override_rules SET is_active = 0, updated_at = ? WHERE id = ?")
            .bind(lyra_core::now().to_rfc3339())
            .bind(rule_id.to_string())
            .execute(self.pool())
            .await?;

        if let Some(rule) = rule {
            self.record_override_event(rule.id, &rule.domain_pattern, rule.decision, rule.reason.as_deref(), "clear")
                .await?;
        }
        Ok(())
    }

    async fn record_override_event(
        &self,
        rule_id: Uuid,
        domain_pattern: &str,
        decision: OverrideDecision,
        reason: Option<&str>,
        event: &str,
    ) -> Result<()> {
        sqlx::query(
            "INSERT INTO domain_override_events (id, rule_id, domain_pattern, decision, reason, event, occurred_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(lyra_core::new_id().to_string())
        .bind(rule_id.to_string())
        .bind(domain_pattern)
        .bind(decision_str(decision))
        .bind(reason)
        .bind(event)
        .bind(lyra_core::now().to_rfc3339())
        .execute(self.pool())
        .await?;
        Ok(())
    }

    pub async fn active_override_rules(&self) -> Result<Vec<DomainOverrideRule>> {
        let rows = sqlx::query_as::<_, RuleRow>(
            "SELECT id, domain_pattern, decision, reason, created_at, updated_at, is_active \
             FROM domain_override_rules WHERE is_active = 1 ORDER BY updated_at DESC",
        )
        .fetch_all(self.pool())
        .await?;
        Ok(rows.into_iter().map(RuleRow::into_rule).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn create_then_clear_round_trips_and_writes_events() {
        let store = EvidenceStore::in_memory().await.unwrap();
        let rule = store
            .create_override_rule("*.spam.example", OverrideDecision::Block, Some("abuse reports"))
            .await
            .unwrap();
        assert_eq!(store.active_override_rules().await.unwrap().len(), 1);

        store.clear_override_rule(rule.id).await.unwrap();
        assert!(store.active_override_rules().await.unwrap().is_empty());

        let event_count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM domain_override_events WHERE rule_id = ?")
            .bind(rule.id.to_string())
            .fetch_one(store.pool())
            .await
            .unwrap();
        assert_eq!(event_count.0, 2);
    }

    #[tokio::test]
    async fn lookup_cache_resolves_glob_and_exact_patterns_after_refresh() {
        let store = EvidenceStore::in_memory().await.unwrap();
        store
            .create_override_rule("*.blocked.example", OverrideDecision::Block, None)
            .await
            .unwrap();
        store
            .create_override_rule("trusted.example", OverrideDecision::Unblock, None)
            .await
            .unwrap();

        let lookup = SqliteOverrideLookup::new();
        lookup.refresh(store.pool()).await.unwrap();

        assert_eq!(lookup.active_override("mail.blocked.example"), Some(OverrideDecision::Block));
        assert_eq!(lookup.active_override("trusted.example"), Some(OverrideDecision::Unblock));
        assert_eq!(lookup.active_override("unrelated.example"), None);
    }
}
