use std::time::Duration;

/// Exponential backoff with jitter, clamped to `[min, max]`. Shared between
/// the breaker's open-state cooldown and the retry wrappers used by
/// external API clients (spec 4.2: "Public cooldown/backoff helpers are
/// also exposed to API-retry wrappers").
#[derive(Debug, Clone, Copy)]
pub struct BackoffPolicy {
    pub base: Duration,
    pub exp_base: f64,
    pub min: Duration,
    pub max: Duration,
    pub jitter_ratio: f64,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            base: Duration::from_millis(500),
            exp_base: 2.0,
            min: Duration::from_millis(500),
            max: Duration::from_secs(60),
            jitter_ratio: 0.2,
        }
    }
}

impl BackoffPolicy {
    /// Computes `base * exp_base^failures + jitter`, clamped to `[min,
    /// max]`. `failures` is the consecutive-failure count (0-based).
    pub fn cooldown(&self, failures: u32) -> Duration {
        let exponent = self.exp_base.powi(failures.min(32) as i32);
        let raw_ms = self.base.as_millis() as f64 * exponent;
        let jitter_ms = raw_ms * self.jitter_ratio * fastrand::f64();
        let total_ms = raw_ms + jitter_ms;
        let clamped = total_ms
            .max(self.min.as_millis() as f64)
            .min(self.max.as_millis() as f64);
        Duration::from_millis(clamped as u64)
    }

    /// Deterministic variant (no jitter) for property tests and for
    /// estimating the worst case before actually scheduling.
    pub fn cooldown_no_jitter(&self, failures: u32) -> Duration {
        let exponent = self.exp_base.powi(failures.min(32) as i32);
        let raw_ms = self.base.as_millis() as f64 * exponent;
        let clamped = raw_ms
            .max(self.min.as_millis() as f64)
            .min(self.max.as_millis() as f64);
        Duration::from_millis(clamped as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cooldown_grows_with_failures() {
        let policy = BackoffPolicy::default();
        assert!(policy.cooldown_no_jitter(0) <= policy.cooldown_no_jitter(3));
        assert!(policy.cooldown_no_jitter(3) <= policy.cooldown_no_jitter(6));
    }

    #[test]
    fn cooldown_is_clamped_to_max() {
        let policy = BackoffPolicy::default();
        assert_eq!(policy.cooldown_no_jitter(100), policy.max);
    }

    #[test]
    fn cooldown_never_below_min() {
        let policy = BackoffPolicy {
            base: Duration::from_millis(10),
            ..Default::default()
        };
        assert_eq!(policy.cooldown_no_jitter(0), policy.min);
    }

    #[test]
    fn jittered_cooldown_stays_within_bounds() {
        let policy = BackoffPolicy::default();
        for _ in 0..50 {
            let cooldown = policy.cooldown(4);
            assert!(cooldown >= policy.min);
            assert!(cooldown <= policy.max);
        }
    }
}
