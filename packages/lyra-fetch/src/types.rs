use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::archive::ArchiveRefs;
use crate::challenge::ChallengeKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FetchPath {
    Http,
    Headful,
    Wayback,
}

#[derive(Debug, Clone, Default)]
pub struct FetchOptions {
    pub browser_profile: String,
    pub allow_headful_escalation: bool,
    pub respect_robots: bool,
    pub user_agent: String,
}

impl FetchOptions {
    pub fn new() -> Self {
        Self {
            browser_profile: "default".to_string(),
            allow_headful_escalation: true,
            respect_robots: true,
            user_agent: "LyraResearchAgent/0.1 (+https://lyra.invalid/bot)".to_string(),
        }
    }
}

/// Outcome of a non-fatal blocked fetch: a challenge was detected and
/// routed to the intervention queue, or the job should otherwise hold
/// rather than fail (spec 4.4 step 4).
#[derive(Debug, Clone)]
pub struct BlockedOutcome {
    pub challenge: ChallengeKind,
    pub intervention_id: uuid::Uuid,
}

#[derive(Debug, Clone)]
pub struct FetchResult {
    pub status: u16,
    pub final_url: String,
    pub content_type: Option<String>,
    pub body: String,
    pub headers: HashMap<String, String>,
    pub archive_refs: ArchiveRefs,
    pub used_path: FetchPath,
    pub freshness_penalty: bool,
}
