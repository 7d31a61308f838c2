use serde::{Deserialize, Serialize};

/// Baseline trust category for a host, used to bias ranking — never
/// confidence (spec section 1, Non-goals).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DomainCategory {
    Government,
    Academic,
    News,
    Commercial,
    Unverified,
}

impl DomainCategory {
    /// Heuristic default from a host's TLD, applied at the bottom of the
    /// C1 precedence chain when no override/allow/deny rule matches.
    pub fn from_tld_heuristic(host: &str) -> Self {
        let host = host.to_ascii_lowercase();
        if host.ends_with(".gov") || host.ends_with(".mil") {
            DomainCategory::Government
        } else if host.ends_with(".edu")
            || host.ends_with(".ac.uk")
            || host.contains("arxiv.org")
            || host.contains("ncbi.nlm.nih.gov")
        {
            DomainCategory::Academic
        } else {
            DomainCategory::Unverified
        }
    }
}

/// Reason a domain is blocked, carried with no interpretation attached —
/// the client decides what to do with it (spec C17).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DomainBlockReason {
    DangerousPattern,
    HighRejectionRate,
    Denylist,
    Manual,
    Unknown,
}

/// Risk classification surfaced alongside a block so the client can decide
/// whether to offer an unblock affordance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DomainUnblockRisk {
    High,
    Low,
}

impl DomainBlockReason {
    pub fn unblock_risk(self) -> DomainUnblockRisk {
        match self {
            DomainBlockReason::DangerousPattern | DomainBlockReason::Unknown => {
                DomainUnblockRisk::High
            }
            DomainBlockReason::HighRejectionRate
            | DomainBlockReason::Denylist
            | DomainBlockReason::Manual => DomainUnblockRisk::Low,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tld_heuristic_classifies_government_and_academic() {
        assert_eq!(
            DomainCategory::from_tld_heuristic("epa.gov"),
            DomainCategory::Government
        );
        assert_eq!(
            DomainCategory::from_tld_heuristic("mit.edu"),
            DomainCategory::Academic
        );
        assert_eq!(
            DomainCategory::from_tld_heuristic("example.com"),
            DomainCategory::Unverified
        );
    }

    #[test]
    fn unblock_risk_matches_spec() {
        assert_eq!(
            DomainBlockReason::DangerousPattern.unblock_risk(),
            DomainUnblockRisk::High
        );
        assert_eq!(
            DomainBlockReason::Unknown.unblock_risk(),
            DomainUnblockRisk::High
        );
        assert_eq!(
            DomainBlockReason::HighRejectionRate.unblock_risk(),
            DomainUnblockRisk::Low
        );
        assert_eq!(
            DomainBlockReason::Manual.unblock_risk(),
            DomainUnblockRisk::Low
        );
    }
}
