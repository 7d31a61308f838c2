use std::time::Instant;

use dashmap::DashMap;

use crate::backoff::BackoffPolicy;
use crate::breaker::{BreakerState, BreakerThresholds, CircuitBreaker};

/// Holds one `CircuitBreaker` per logical key (an engine name or a domain
/// host). Shared across the scheduler and fetch/search layers as a single
/// long-lived handle (design note: "explicit state handles").
#[derive(Default)]
pub struct BreakerRegistry {
    breakers: DashMap<String, CircuitBreaker>,
    thresholds: BreakerThresholds,
    backoff: BackoffPolicy,
}

impl BreakerRegistry {
    pub fn new(thresholds: BreakerThresholds, backoff: BackoffPolicy) -> Self {
        Self {
            breakers: DashMap::new(),
            thresholds,
            backoff,
        }
    }

    pub fn allow_request(&self, key: &str) -> bool {
        self.allow_request_at(key, Instant::now())
    }

    pub fn allow_request_at(&self, key: &str, now: Instant) -> bool {
        let mut entry = self
            .breakers
            .entry(key.to_string())
            .or_insert_with(|| CircuitBreaker::new(self.thresholds, self.backoff));
        entry.allow_request(now)
    }

    pub fn record_success(&self, key: &str, latency: std::time::Duration) {
        let mut entry = self
            .breakers
            .entry(key.to_string())
            .or_insert_with(|| CircuitBreaker::new(self.thresholds, self.backoff));
        entry.record_success(latency);
    }

    pub fn record_failure(&self, key: &str) {
        self.record_failure_at(key, Instant::now())
    }

    pub fn record_failure_at(&self, key: &str, now: Instant) {
        let mut entry = self
            .breakers
            .entry(key.to_string())
            .or_insert_with(|| CircuitBreaker::new(self.thresholds, self.backoff));
        entry.record_failure(now);
    }

    pub fn record_captcha(&self, key: &str) {
        let now = Instant::now();
        let mut entry = self
            .breakers
            .entry(key.to_string())
            .or_insert_with(|| CircuitBreaker::new(self.thresholds, self.backoff));
        entry.record_captcha(now);
    }

    pub fn state_of(&self, key: &str) -> BreakerState {
        self.breakers
            .get(key)
            .map(|b| b.state())
            .unwrap_or(BreakerState::Closed)
    }

    /// Composite key helper: breakers are tracked per (engine, domain) as
    /// well as per bare domain, since both SERP engine health and fetch
    /// target health need independent accounting (spec 4.2: "One breaker
    /// per logical key (engine, domain)").
    pub fn engine_domain_key(engine: &str, domain: &str) -> String {
        format!("{engine}::{domain}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_key_starts_closed() {
        let registry = BreakerRegistry::default();
        assert_eq!(registry.state_of("unseen.example"), BreakerState::Closed);
        assert!(registry.allow_request("unseen.example"));
    }

    #[test]
    fn engine_domain_key_is_stable() {
        let key = BreakerRegistry::engine_domain_key("engine_a", "example.com");
        assert_eq!(key, "engine_a::example.com");
    }

    #[test]
    fn failures_on_one_key_do_not_affect_another() {
        let registry = BreakerRegistry::default();
        let now = Instant::now();
        for _ in 0..5 {
            registry.record_failure_at("a.example", now);
        }
        assert_eq!(registry.state_of("a.example"), BreakerState::Open);
        assert_eq!(registry.state_of("b.example"), BreakerState::Closed);
    }
}
