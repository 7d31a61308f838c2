use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::backoff::BackoffPolicy;
use crate::ema::Ema;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BreakerState {
    Closed,
    Open,
    HalfOpen,
}

/// Thresholds governing when a closed breaker opens.
#[derive(Debug, Clone, Copy)]
pub struct BreakerThresholds {
    pub failure_ema_open: f64,
    pub captcha_ema_open: f64,
    pub success_ema_alpha: f64,
    pub latency_ema_alpha: f64,
    pub captcha_ema_alpha: f64,
}

impl Default for BreakerThresholds {
    fn default() -> Self {
        Self {
            failure_ema_open: 0.5,
            captcha_ema_open: 0.3,
            success_ema_alpha: 0.2,
            latency_ema_alpha: 0.2,
            captcha_ema_alpha: 0.2,
        }
    }
}

/// One breaker instance for a logical key (engine or domain). Not `Clone`:
/// callers hold it behind a registry (see `registry.rs`) and mutate through
/// `&mut`.
pub struct CircuitBreaker {
    state: BreakerState,
    thresholds: BreakerThresholds,
    backoff: BackoffPolicy,
    success_ema: Ema,
    latency_ema_ms: Ema,
    captcha_ema: Ema,
    consecutive_failures: u32,
    opened_at: Option<Instant>,
    cooldown: Duration,
}

impl CircuitBreaker {
    pub fn new(thresholds: BreakerThresholds, backoff: BackoffPolicy) -> Self {
        Self {
            state: BreakerState::Closed,
            success_ema: Ema::new(thresholds.success_ema_alpha),
            latency_ema_ms: Ema::new(thresholds.latency_ema_alpha),
            captcha_ema: Ema::new(thresholds.captcha_ema_alpha),
            thresholds,
            backoff,
            consecutive_failures: 0,
            opened_at: None,
            cooldown: Duration::ZERO,
        }
    }

    pub fn state(&self) -> BreakerState {
        self.state
    }

    /// Whether a caller should attempt right now. `Open` fails fast unless
    /// the cooldown has elapsed, in which case the breaker transitions to
    /// `HalfOpen` and allows exactly the probing caller through.
    pub fn allow_request(&mut self, now: Instant) -> bool {
        match self.state {
            BreakerState::Closed => true,
            BreakerState::HalfOpen => true,
            BreakerState::Open => {
                let elapsed = self
                    .opened_at
                    .map(|opened| now.duration_since(opened))
                    .unwrap_or(Duration::ZERO);
                if elapsed >= self.cooldown {
                    self.state = BreakerState::HalfOpen;
                    debug!("breaker transitioning open -> half_open after cooldown");
                    true
                } else {
                    false
                }
            }
        }
    }

    pub fn record_success(&mut self, latency: Duration) {
        self.success_ema.observe(1.0);
        self.captcha_ema.observe(0.0);
        self.latency_ema_ms.observe(latency.as_millis() as f64);
        self.consecutive_failures = 0;
        if self.state != BreakerState::Closed {
            debug!("breaker closing after successful probe");
        }
        self.state = BreakerState::Closed;
        self.opened_at = None;
    }

    pub fn record_failure(&mut self, now: Instant) {
        self.success_ema.observe(0.0);
        self.captcha_ema.observe(0.0);
        self.consecutive_failures += 1;
        self.maybe_open(now);
    }

    pub fn record_captcha(&mut self, now: Instant) {
        self.captcha_ema.observe(1.0);
        self.consecutive_failures += 1;
        self.maybe_open(now);
    }

    fn maybe_open(&mut self, now: Instant) {
        let failure_rate = 1.0 - self.success_ema.value();
        let should_open = match self.state {
            BreakerState::Closed => {
                failure_rate >= self.thresholds.failure_ema_open
                    || self.captcha_ema.value() >= self.thresholds.captcha_ema_open
            }
            BreakerState::HalfOpen => true,
            BreakerState::Open => false,
        };
        if should_open {
            self.cooldown = self.backoff.cooldown(self.consecutive_failures.saturating_sub(1));
            self.opened_at = Some(now);
            if self.state != BreakerState::Open {
                warn!(
                    failure_rate,
                    cooldown_ms = self.cooldown.as_millis() as u64,
                    "breaker opening"
                );
            }
            self.state = BreakerState::Open;
        }
    }

    pub fn failure_rate(&self) -> f64 {
        1.0 - self.success_ema.value()
    }

    pub fn latency_ema_ms(&self) -> f64 {
        self.latency_ema_ms.value()
    }

    pub fn captcha_rate(&self) -> f64 {
        self.captcha_ema.value()
    }
}

impl Default for CircuitBreaker {
    fn default() -> Self {
        Self::new(BreakerThresholds::default(), BackoffPolicy::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_closed_and_allows_requests() {
        let mut breaker = CircuitBreaker::default();
        assert_eq!(breaker.state(), BreakerState::Closed);
        assert!(breaker.allow_request(Instant::now()));
    }

    #[test]
    fn opens_after_sustained_failures() {
        let mut breaker = CircuitBreaker::default();
        let now = Instant::now();
        for _ in 0..5 {
            breaker.record_failure(now);
        }
        assert_eq!(breaker.state(), BreakerState::Open);
        assert!(!breaker.allow_request(now));
    }

    #[test]
    fn captcha_spike_opens_breaker() {
        let mut breaker = CircuitBreaker::default();
        let now = Instant::now();
        for _ in 0..3 {
            breaker.record_captcha(now);
        }
        assert_eq!(breaker.state(), BreakerState::Open);
    }

    #[test]
    fn half_open_after_cooldown_then_closes_on_success() {
        let mut breaker = CircuitBreaker::new(
            BreakerThresholds::default(),
            BackoffPolicy {
                base: Duration::from_millis(1),
                min: Duration::from_millis(1),
                max: Duration::from_millis(5),
                jitter_ratio: 0.0,
                ..Default::default()
            },
        );
        let now = Instant::now();
        for _ in 0..5 {
            breaker.record_failure(now);
        }
        assert_eq!(breaker.state(), BreakerState::Open);

        let later = now + Duration::from_millis(10);
        assert!(breaker.allow_request(later));
        assert_eq!(breaker.state(), BreakerState::HalfOpen);

        breaker.record_success(Duration::from_millis(50));
        assert_eq!(breaker.state(), BreakerState::Closed);
    }

    #[test]
    fn half_open_failure_reopens_with_next_step() {
        let mut breaker = CircuitBreaker::new(
            BreakerThresholds::default(),
            BackoffPolicy {
                base: Duration::from_millis(1),
                min: Duration::from_millis(1),
                max: Duration::from_millis(5),
                jitter_ratio: 0.0,
                ..Default::default()
            },
        );
        let now = Instant::now();
        for _ in 0..5 {
            breaker.record_failure(now);
        }
        let later = now + Duration::from_millis(10);
        assert!(breaker.allow_request(later));
        breaker.record_failure(later);
        assert_eq!(breaker.state(), BreakerState::Open);
    }
}
