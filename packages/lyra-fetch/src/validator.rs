use std::collections::HashSet;
use std::net::IpAddr;

use crate::error::{FetchError, Result};

/// SSRF guard applied ahead of every fetch, independent of and in addition
/// to domain-policy allow/deny (SPEC_FULL.md section 12), grounded on
/// `extraction::traits::crawler::UrlValidator`.
#[derive(Debug, Clone)]
pub struct UrlValidator {
    allowed_schemes: HashSet<String>,
    blocked_hosts: HashSet<String>,
    blocked_cidrs: Vec<ipnet::IpNet>,
    allowed_hosts: HashSet<String>,
}

impl Default for UrlValidator {
    fn default() -> Self {
        Self::new()
    }
}

impl UrlValidator {
    pub fn new() -> Self {
        Self {
            allowed_schemes: ["http", "https"].into_iter().map(String::from).collect(),
            blocked_hosts: [
                "localhost",
                "127.0.0.1",
                "::1",
                "[::1]",
                "0.0.0.0",
                "metadata.google.internal",
                "metadata.gke.internal",
                "instance-data",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
            blocked_cidrs: vec![
                "10.0.0.0/8".parse().unwrap(),
                "172.16.0.0/12".parse().unwrap(),
                "192.168.0.0/16".parse().unwrap(),
                "169.254.0.0/16".parse().unwrap(),
                "127.0.0.0/8".parse().unwrap(),
                "::1/128".parse().unwrap(),
                "fc00::/7".parse().unwrap(),
                "fe80::/10".parse().unwrap(),
            ],
            allowed_hosts: HashSet::new(),
        }
    }

    pub fn allow_host(mut self, host: impl Into<String>) -> Self {
        self.allowed_hosts.insert(host.into());
        self
    }

    pub fn block_host(mut self, host: impl Into<String>) -> Self {
        self.blocked_hosts.insert(host.into());
        self
    }

    pub fn validate(&self, url: &str) -> Result<()> {
        let parsed = url::Url::parse(url)?;
        if !self.allowed_schemes.contains(parsed.scheme()) {
            return Err(FetchError::Blocked(format!(
                "disallowed scheme '{}'",
                parsed.scheme()
            )));
        }
        let host = parsed
            .host_str()
            .ok_or_else(|| FetchError::Blocked("missing host".to_string()))?;

        if self.allowed_hosts.contains(host) {
            return Ok(());
        }
        if self.blocked_hosts.contains(host) {
            return Err(FetchError::Blocked(format!("blocked host '{host}'")));
        }
        if let Ok(ip) = host.parse::<IpAddr>() {
            for cidr in &self.blocked_cidrs {
                if cidr.contains(&ip) {
                    return Err(FetchError::Blocked(format!("blocked address {ip}")));
                }
            }
        }
        Ok(())
    }

    /// Resolves DNS and re-checks the blocked CIDRs against the resolved
    /// addresses, catching DNS-rebinding attacks.
    pub async fn validate_with_dns(&self, url: &str) -> Result<()> {
        self.validate(url)?;
        let parsed = url::Url::parse(url)?;
        let host = parsed
            .host_str()
            .ok_or_else(|| FetchError::Blocked("missing host".to_string()))?;
        if self.allowed_hosts.contains(host) || host.parse::<IpAddr>().is_ok() {
            return Ok(());
        }
        let port = parsed.port().unwrap_or(match parsed.scheme() {
            "https" => 443,
            _ => 80,
        });
        let addrs = tokio::net::lookup_host(format!("{host}:{port}"))
            .await
            .map_err(|e| FetchError::Blocked(format!("dns resolution failed: {e}")))?;
        for addr in addrs {
            let ip = addr.ip();
            for cidr in &self.blocked_cidrs {
                if cidr.contains(&ip) {
                    return Err(FetchError::Blocked(format!(
                        "dns for {host} resolved to blocked address {ip}"
                    )));
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blocks_localhost() {
        let validator = UrlValidator::new();
        assert!(validator.validate("http://localhost/admin").is_err());
    }

    #[test]
    fn blocks_private_cidr() {
        let validator = UrlValidator::new();
        assert!(validator.validate("http://10.0.0.5/").is_err());
        assert!(validator.validate("http://192.168.1.1/").is_err());
    }

    #[test]
    fn blocks_cloud_metadata_ip() {
        let validator = UrlValidator::new();
        assert!(validator.validate("http://169.254.169.254/latest/meta-data/").is_err());
    }

    #[test]
    fn allows_public_host() {
        let validator = UrlValidator::new();
        assert!(validator.validate("https://example.com/page").is_ok());
    }

    #[test]
    fn rejects_non_http_scheme() {
        let validator = UrlValidator::new();
        assert!(validator.validate("file:///etc/passwd").is_err());
    }

    #[test]
    fn explicit_allow_bypasses_block() {
        let validator = UrlValidator::new().allow_host("localhost");
        assert!(validator.validate("http://localhost/health").is_ok());
    }
}
