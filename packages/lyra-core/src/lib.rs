//! Shared identifiers, time source, and domain enums threaded through every
//! Lyra package. Kept deliberately small: this crate has no I/O and no
//! async runtime dependency.

pub mod cause;
pub mod clock;
pub mod domain;

pub use cause::CauseChain;
pub use clock::{Clock, SystemClock};
pub use domain::{DomainBlockReason, DomainCategory, DomainUnblockRisk};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A point-in-time bound, used for task budgets and session expiry checks.
pub fn now() -> DateTime<Utc> {
    Utc::now()
}

/// Generates a new random identifier. Thin wrapper so call sites read
/// `lyra_core::new_id()` rather than reaching for `uuid` directly.
pub fn new_id() -> Uuid {
    Uuid::new_v4()
}

/// Closed set of job kinds understood by the scheduler (C8). Declared here,
/// not in `lyra-scheduler`, because fetch/search/extract components need to
/// name the kind of job they are enqueuing without depending on the
/// scheduler crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobKind {
    Serp,
    Fetch,
    Extract,
    Embed,
    Rank,
    LlmExtract,
    Nli,
    Compose,
}

impl JobKind {
    /// Static priority table from spec section 4.8. Higher wins.
    pub fn priority(self) -> u32 {
        match self {
            JobKind::Serp => 100,
            JobKind::Fetch => 90,
            JobKind::Extract => 80,
            JobKind::Embed => 70,
            JobKind::Rank => 60,
            JobKind::LlmExtract => 50,
            JobKind::Nli => 40,
            JobKind::Compose => 40,
        }
    }

    /// Mutual-exclusion group this kind contends for, if any.
    pub fn exclusion_group(self) -> Option<&'static str> {
        match self {
            JobKind::Nli | JobKind::Embed | JobKind::Rank => Some("gpu"),
            JobKind::Serp => Some("browser_headful"),
            _ => None,
        }
    }

    pub fn timeout_secs(self) -> u64 {
        match self {
            JobKind::Serp => 30,
            JobKind::Fetch => 60,
            JobKind::LlmExtract => 120,
            JobKind::Nli => 30,
            JobKind::Extract | JobKind::Embed | JobKind::Rank | JobKind::Compose => 60,
        }
    }
}

/// Task status, per DATA MODEL section 3.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Active,
    Stopped,
}

/// Stop mode for `stop_task`, per C8 stop semantics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopMode {
    Graceful,
    Immediate,
    Full,
}

/// Stance relation carried on a fragment -> claim edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NliRelation {
    Supports,
    Refutes,
    Neutral,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn job_priority_matches_spec_table() {
        assert_eq!(JobKind::Serp.priority(), 100);
        assert_eq!(JobKind::Fetch.priority(), 90);
        assert_eq!(JobKind::Extract.priority(), 80);
        assert_eq!(JobKind::Embed.priority(), 70);
        assert_eq!(JobKind::Rank.priority(), 60);
        assert_eq!(JobKind::LlmExtract.priority(), 50);
        assert_eq!(JobKind::Nli.priority(), 40);
    }

    #[test]
    fn exclusion_groups_match_spec() {
        assert_eq!(JobKind::Nli.exclusion_group(), Some("gpu"));
        assert_eq!(JobKind::Embed.exclusion_group(), Some("gpu"));
        assert_eq!(JobKind::Rank.exclusion_group(), Some("gpu"));
        assert_eq!(JobKind::Serp.exclusion_group(), Some("browser_headful"));
        assert_eq!(JobKind::Fetch.exclusion_group(), None);
    }

    #[test]
    fn new_id_is_random() {
        assert_ne!(new_id(), new_id());
    }
}
