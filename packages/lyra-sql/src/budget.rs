use std::time::{Duration, Instant};

use rusqlite::Connection;

pub const DEFAULT_ROW_LIMIT: usize = 50;
pub const MAX_ROW_LIMIT: usize = 200;
const DEFAULT_WALL_CLOCK_MS: u64 = 300;
const MAX_WALL_CLOCK_MS: u64 = 2000;
const DEFAULT_VM_STEPS: u32 = 500_000;
const MAX_VM_STEPS: u32 = 5_000_000;

/// Progress handler fires after this many VM instructions (spec 4.15's
/// "VM instruction budget"); keeping it modest relative to the ceiling
/// keeps both the wall-clock and step checks responsive.
const PROGRESS_HANDLER_GRANULARITY: i32 = 1_000;

#[derive(Debug, Clone, Copy)]
pub struct QueryOptions {
    pub limit: usize,
    pub timeout_ms: u64,
    pub max_vm_steps: u32,
    pub include_schema: bool,
}

impl Default for QueryOptions {
    fn default() -> Self {
        Self {
            limit: DEFAULT_ROW_LIMIT,
            timeout_ms: DEFAULT_WALL_CLOCK_MS,
            max_vm_steps: DEFAULT_VM_STEPS,
            include_schema: false,
        }
    }
}

impl QueryOptions {
    /// Clamps caller-supplied values to the spec's ceilings rather than
    /// rejecting out-of-range requests outright.
    pub fn clamped(mut self) -> Self {
        self.limit = self.limit.clamp(1, MAX_ROW_LIMIT);
        self.timeout_ms = self.timeout_ms.clamp(1, MAX_WALL_CLOCK_MS);
        self.max_vm_steps = self.max_vm_steps.clamp(1, MAX_VM_STEPS);
        self
    }
}

/// Installs a progress handler that interrupts execution once either the
/// wall-clock or VM-step budget is exceeded (spec 4.15). SQLite fires the
/// handler back on the same thread mid-statement, so returning `true`
/// here causes the in-flight `execute`/`query` call to return
/// `rusqlite::Error::SqliteFailure` with `SQLITE_INTERRUPT`, which the
/// caller maps to `SqlError::Timeout`.
pub fn install_progress_handler(conn: &Connection, timeout_ms: u64, max_vm_steps: u32) {
    let deadline = Instant::now() + Duration::from_millis(timeout_ms);
    let mut steps_seen: u64 = 0;
    let step_budget = max_vm_steps as u64;

    conn.progress_handler(PROGRESS_HANDLER_GRANULARITY, Some(move || {
        steps_seen += PROGRESS_HANDLER_GRANULARITY as u64;
        Instant::now() >= deadline || steps_seen >= step_budget
    }));
}

pub fn clear_progress_handler(conn: &Connection) {
    conn.progress_handler(PROGRESS_HANDLER_GRANULARITY, None::<fn() -> bool>);
}
