//! robots.txt compliance, a supplemental ambient hardening feature
//! (SPEC_FULL.md section 12) grounded on
//! `extraction::crawlers::robots::RobotsTxt`.

use std::collections::HashMap;
use std::time::Duration;

#[derive(Debug, Clone, Default)]
pub struct RobotsTxt {
    rules: HashMap<String, AgentRules>,
    default_rules: AgentRules,
    crawl_delay: Option<f64>,
    sitemaps: Vec<String>,
}

#[derive(Debug, Clone, Default)]
struct AgentRules {
    disallow: Vec<String>,
    allow: Vec<String>,
    crawl_delay: Option<f64>,
}

impl RobotsTxt {
    pub fn parse(content: &str) -> Self {
        let mut robots = Self::default();
        let mut current_agents: Vec<String> = Vec::new();
        let mut current_rules = AgentRules::default();

        for line in content.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let Some((directive, value)) = line.split_once(':') else {
                continue;
            };
            let directive = directive.trim().to_lowercase();
            let value = value.trim();

            match directive.as_str() {
                "user-agent" => {
                    if !current_agents.is_empty() {
                        for agent in &current_agents {
                            if agent == "*" {
                                robots.default_rules = current_rules.clone();
                            } else {
                                robots.rules.insert(agent.clone(), current_rules.clone());
                            }
                        }
                        current_rules = AgentRules::default();
                        current_agents.clear();
                    }
                    current_agents.push(value.to_lowercase());
                }
                "disallow" => {
                    if !value.is_empty() {
                        current_rules.disallow.push(value.to_string());
                    }
                }
                "allow" => {
                    if !value.is_empty() {
                        current_rules.allow.push(value.to_string());
                    }
                }
                "crawl-delay" => {
                    if let Ok(delay) = value.parse::<f64>() {
                        current_rules.crawl_delay = Some(delay);
                        if robots.crawl_delay.is_none() {
                            robots.crawl_delay = Some(delay);
                        }
                    }
                }
                "sitemap" => robots.sitemaps.push(value.to_string()),
                _ => {}
            }
        }

        for agent in current_agents {
            if agent == "*" {
                robots.default_rules = current_rules.clone();
            } else {
                robots.rules.insert(agent, current_rules.clone());
            }
        }
        robots
    }

    pub fn is_allowed(&self, user_agent: &str, path: &str) -> bool {
        let agent_lower = user_agent.to_lowercase();
        let rules = self
            .rules
            .get(&agent_lower)
            .or_else(|| {
                self.rules
                    .iter()
                    .find(|(k, _)| agent_lower.contains(k.as_str()))
                    .map(|(_, v)| v)
            })
            .unwrap_or(&self.default_rules);

        for allow in &rules.allow {
            if path.starts_with(allow) {
                return true;
            }
        }
        for disallow in &rules.disallow {
            if disallow == "/" {
                return false;
            }
            if path.starts_with(disallow) {
                return false;
            }
        }
        true
    }

    pub fn crawl_delay(&self, user_agent: &str) -> Option<Duration> {
        let agent_lower = user_agent.to_lowercase();
        let delay = self
            .rules
            .get(&agent_lower)
            .and_then(|r| r.crawl_delay)
            .or(self.crawl_delay);
        delay.map(Duration::from_secs_f64)
    }

    pub fn sitemaps(&self) -> &[String] {
        &self.sitemaps
    }

    pub fn disallows_all(&self, user_agent: &str) -> bool {
        !self.is_allowed(user_agent, "/")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "User-agent: *\nDisallow: /private\nAllow: /private/public\nCrawl-delay: 2\n\nUser-agent: LyraBot\nDisallow: /\n";

    #[test]
    fn default_agent_honors_allow_override() {
        let robots = RobotsTxt::parse(SAMPLE);
        assert!(!robots.is_allowed("generic-bot", "/private/data"));
        assert!(robots.is_allowed("generic-bot", "/private/public/page"));
        assert!(robots.is_allowed("generic-bot", "/public"));
    }

    #[test]
    fn named_agent_disallows_all() {
        let robots = RobotsTxt::parse(SAMPLE);
        assert!(robots.disallows_all("LyraBot"));
    }

    #[test]
    fn crawl_delay_parses() {
        let robots = RobotsTxt::parse(SAMPLE);
        assert_eq!(robots.crawl_delay("generic-bot"), Some(Duration::from_secs_f64(2.0)));
    }

    #[test]
    fn empty_robots_allows_everything() {
        let robots = RobotsTxt::parse("");
        assert!(robots.is_allowed("any-bot", "/anything"));
    }
}
