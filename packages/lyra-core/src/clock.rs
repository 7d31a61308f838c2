use chrono::{DateTime, Utc};
use std::time::Instant;

/// Abstracts wall-clock and monotonic time so rate limiters, breakers, and
/// schedulers can be driven deterministically under test without sleeping.
pub trait Clock: Send + Sync + 'static {
    fn now_utc(&self) -> DateTime<Utc>;
    fn monotonic_now(&self) -> Instant;
}

/// Production clock backed by the OS.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_utc(&self) -> DateTime<Utc> {
        Utc::now()
    }

    fn monotonic_now(&self) -> Instant {
        Instant::now()
    }
}
