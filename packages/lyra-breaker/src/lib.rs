//! Per-key circuit breaker and backoff arithmetic (C2).

pub mod backoff;
pub mod breaker;
pub mod ema;
pub mod registry;

pub use backoff::BackoffPolicy;
pub use breaker::{BreakerState, BreakerThresholds, CircuitBreaker};
pub use registry::BreakerRegistry;
