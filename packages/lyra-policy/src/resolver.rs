use std::sync::{Arc, RwLock};

use lyra_core::DomainCategory;
use tokio::sync::watch;
use tracing::{debug, info};

use crate::pattern;
use crate::types::{OverrideDecision, PolicyConfig, PolicyRecord};

/// Durable, highest-precedence source of domain block/unblock decisions.
/// Implemented by `lyra-store` over the `domain_override_rules` table; kept
/// as a trait here so `lyra-policy` has no database dependency (design
/// note: "Globals/singletons -> explicit state handles").
pub trait OverrideLookup: Send + Sync {
    fn active_override(&self, host: &str) -> Option<OverrideDecision>;
}

/// An `OverrideLookup` with nothing registered; used when no durable
/// override store is wired in (tests, or a policy-only deployment).
#[derive(Debug, Default)]
pub struct NoOverrides;

impl OverrideLookup for NoOverrides {
    fn active_override(&self, _host: &str) -> Option<OverrideDecision> {
        None
    }
}

/// Resolves a host to a `PolicyRecord` and supports hot reload: callers can
/// push a new `PolicyConfig` at any time and existing resolver handles will
/// pick it up on the next `policy_for` call. A `watch` channel lets
/// long-lived components subscribe to reload events instead of polling.
pub struct PolicyResolver {
    config: RwLock<Arc<PolicyConfig>>,
    overrides: Arc<dyn OverrideLookup>,
    reload_tx: watch::Sender<u64>,
}

impl PolicyResolver {
    pub fn new(config: PolicyConfig) -> Self {
        Self::with_overrides(config, Arc::new(NoOverrides))
    }

    pub fn with_overrides(config: PolicyConfig, overrides: Arc<dyn OverrideLookup>) -> Self {
        let (reload_tx, _rx) = watch::channel(0);
        Self {
            config: RwLock::new(Arc::new(config)),
            overrides,
            reload_tx,
        }
    }

    /// Subscribe to reload notifications. The carried value is a
    /// monotonically increasing generation counter, not meaningful beyond
    /// "something changed".
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.reload_tx.subscribe()
    }

    /// Replaces the active config and notifies subscribers. Invalid
    /// patterns inside `new_config` are dropped with a warning rather than
    /// failing the whole reload, matching the spirit of "hot reload should
    /// not take the resolver down".
    pub fn reload(&self, new_config: PolicyConfig) {
        let sanitized = sanitize(new_config);
        let mut guard = self.config.write().expect("policy config lock poisoned");
        *guard = Arc::new(sanitized);
        let next_generation = *self.reload_tx.borrow() + 1;
        let _ = self.reload_tx.send(next_generation);
        info!(generation = next_generation, "domain policy reloaded");
    }

    pub fn current(&self) -> Arc<PolicyConfig> {
        self.config.read().expect("policy config lock poisoned").clone()
    }

    /// Resolves `host` to a policy record following the precedence chain in
    /// spec 4.1: durable override (DB) > user_overrides (exact host) >
    /// allowlist/denylist (suffix glob) > TLD heuristic default.
    pub fn policy_for(&self, host: &str) -> PolicyRecord {
        let host = host.to_ascii_lowercase();
        let config = self.current();

        let mut record = PolicyRecord {
            host: host.clone(),
            category: DomainCategory::from_tld_heuristic(&host),
            qps: config.defaults.qps,
            headful_ratio: config.defaults.headful_ratio,
            max_pages_per_day: config.defaults.max_pages_per_day,
            max_requests_per_day: config.defaults.max_requests_per_day,
            on_allowlist: false,
            on_denylist: false,
        };

        if config.allowlist.iter().any(|p| pattern::matches(p, &host)) {
            record.on_allowlist = true;
        }
        if config.denylist.iter().any(|p| pattern::matches(p, &host)) {
            record.on_denylist = true;
        }

        if let Some(user_override) = config.user_overrides.iter().find(|o| o.host == host) {
            if let Some(category) = user_override.category {
                record.category = category;
            }
            if let Some(qps) = user_override.qps {
                record.qps = qps;
            }
            if let Some(ratio) = user_override.headful_ratio {
                record.headful_ratio = ratio;
            }
            if let Some(max_pages) = user_override.max_pages_per_day {
                record.max_pages_per_day = max_pages;
            }
            if let Some(max_requests) = user_override.max_requests_per_day {
                record.max_requests_per_day = max_requests;
            }
        }

        match self.overrides.active_override(&host) {
            Some(OverrideDecision::Block) => record.on_denylist = true,
            Some(OverrideDecision::Unblock) => record.on_denylist = false,
            None => {}
        }

        debug!(host = %record.host, qps = record.qps, denied = record.on_denylist, "resolved domain policy");
        record
    }
}

fn sanitize(config: PolicyConfig) -> PolicyConfig {
    let mut config = config;
    config.allowlist.retain(|p| pattern::validate_pattern(p).is_ok());
    config.denylist.retain(|p| pattern::validate_pattern(p).is_ok());
    config
}
