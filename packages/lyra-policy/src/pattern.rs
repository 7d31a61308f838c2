use crate::error::{PolicyError, Result};

/// Validates an override/allow/deny glob pattern per spec 4.1: reject `*`,
/// `*.*`, a bare public-suffix wildcard (`*.tld`), and any wildcard that
/// isn't a single leading `*.` label.
pub fn validate_pattern(pattern: &str) -> Result<()> {
    if pattern == "*" {
        return Err(PolicyError::InvalidPattern {
            pattern: pattern.to_string(),
            reason: "bare wildcard matches every host",
        });
    }
    if pattern == "*.*" {
        return Err(PolicyError::InvalidPattern {
            pattern: pattern.to_string(),
            reason: "matches every two-label host",
        });
    }
    if let Some(rest) = pattern.strip_prefix("*.") {
        if rest.is_empty() {
            return Err(PolicyError::InvalidPattern {
                pattern: pattern.to_string(),
                reason: "empty suffix after wildcard",
            });
        }
        if !rest.contains('.') {
            return Err(PolicyError::InvalidPattern {
                pattern: pattern.to_string(),
                reason: "wildcard over a bare public-suffix TLD is too broad",
            });
        }
        if rest.contains('*') {
            return Err(PolicyError::InvalidPattern {
                pattern: pattern.to_string(),
                reason: "only a single leading wildcard label is allowed",
            });
        }
        return Ok(());
    }
    if pattern.contains('*') {
        return Err(PolicyError::InvalidPattern {
            pattern: pattern.to_string(),
            reason: "mid-pattern wildcards are not allowed, only a leading '*.'",
        });
    }
    if pattern.is_empty() {
        return Err(PolicyError::InvalidPattern {
            pattern: pattern.to_string(),
            reason: "empty pattern",
        });
    }
    Ok(())
}

/// Matches `host` against a validated suffix glob (`*.example.com`) or an
/// exact host pattern (`example.com`).
pub fn matches(pattern: &str, host: &str) -> bool {
    let host = host.to_ascii_lowercase();
    let pattern = pattern.to_ascii_lowercase();
    match pattern.strip_prefix("*.") {
        Some(suffix) => host == suffix || host.ends_with(&format!(".{suffix}")),
        None => host == pattern,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_bare_wildcard() {
        assert!(validate_pattern("*").is_err());
    }

    #[test]
    fn rejects_two_star_pattern() {
        assert!(validate_pattern("*.*").is_err());
    }

    #[test]
    fn rejects_public_suffix_wildcard() {
        assert!(validate_pattern("*.com").is_err());
        assert!(validate_pattern("*.gov").is_err());
    }

    #[test]
    fn rejects_mid_wildcard() {
        assert!(validate_pattern("ex*ample.com").is_err());
    }

    #[test]
    fn accepts_valid_suffix_glob() {
        assert!(validate_pattern("*.example.com").is_ok());
    }

    #[test]
    fn accepts_exact_host() {
        assert!(validate_pattern("example.com").is_ok());
    }

    #[test]
    fn suffix_glob_matches_subdomains_and_apex() {
        assert!(matches("*.example.com", "foo.example.com"));
        assert!(matches("*.example.com", "example.com"));
        assert!(!matches("*.example.com", "notexample.com"));
    }

    #[test]
    fn exact_pattern_matches_case_insensitively() {
        assert!(matches("Example.com", "example.COM"));
    }
}
