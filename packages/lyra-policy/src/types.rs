use lyra_core::DomainCategory;
use serde::{Deserialize, Serialize};

/// Resolved policy for a single host. Returned by `policy_for`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolicyRecord {
    pub host: String,
    pub category: DomainCategory,
    pub qps: f64,
    pub headful_ratio: f64,
    pub max_pages_per_day: u32,
    pub max_requests_per_day: u32,
    pub on_allowlist: bool,
    pub on_denylist: bool,
}

impl PolicyRecord {
    pub fn is_usable(&self) -> bool {
        !self.on_denylist
    }
}

/// One exact-host override entry from the contractual policy config file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserOverride {
    pub host: String,
    pub category: Option<DomainCategory>,
    pub qps: Option<f64>,
    pub headful_ratio: Option<f64>,
    pub max_pages_per_day: Option<u32>,
    pub max_requests_per_day: Option<u32>,
}

/// Defaults applied when no override, allowlist, or denylist entry matches.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolicyDefaults {
    pub qps: f64,
    pub headful_ratio: f64,
    pub max_pages_per_day: u32,
    pub max_requests_per_day: u32,
}

impl Default for PolicyDefaults {
    fn default() -> Self {
        Self {
            qps: 0.5,
            headful_ratio: 0.1,
            max_pages_per_day: 200,
            max_requests_per_day: 500,
        }
    }
}

/// Raw contents of the domain policy config file (one of the two
/// contractual config files named in spec section 6).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PolicyConfig {
    #[serde(default)]
    pub allowlist: Vec<String>,
    #[serde(default)]
    pub denylist: Vec<String>,
    #[serde(default)]
    pub user_overrides: Vec<UserOverride>,
    #[serde(default)]
    pub defaults: PolicyDefaults,
    /// Optional thresholds that supersede built-in defaults (C17 rejection
    /// rate threshold, minimum sample count, etc.) Left opaque here; owned
    /// and interpreted by `lyra-store`.
    #[serde(default)]
    pub superseded_thresholds: Option<serde_json::Value>,
}

impl PolicyConfig {
    pub fn with_allowlist(mut self, globs: impl IntoIterator<Item = String>) -> Self {
        self.allowlist.extend(globs);
        self
    }

    pub fn with_denylist(mut self, globs: impl IntoIterator<Item = String>) -> Self {
        self.denylist.extend(globs);
        self
    }

    pub fn with_user_override(mut self, over: UserOverride) -> Self {
        self.user_overrides.push(over);
        self
    }
}

/// Decision carried by a durable domain override rule (C1 highest
/// precedence tier, persisted by `lyra-store`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverrideDecision {
    Block,
    Unblock,
}
