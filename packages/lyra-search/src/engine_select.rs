use lyra_breaker::{BreakerRegistry, BreakerState};
use lyra_policy::PolicyResolver;
use url::Url;

use crate::config::EngineRegistry;
use crate::error::{Result, SearchError};
use crate::types::EngineConfig;

fn engine_host(engine: &EngineConfig) -> Option<String> {
    let placeholder_free = engine.url_template.replace("{query}", "x").replace("{offset}", "0");
    Url::parse(&placeholder_free)
        .ok()
        .and_then(|u| u.host_str().map(str::to_string))
}

/// Weighted draw over usable engines: draw weight is `base_weight`
/// scaled down by the host's policy QPS allowance, and zeroed entirely
/// when that host's breaker is open (spec 4.5: "engine weights come
/// from policy and breaker health").
pub fn select_engine<'a>(
    registry: &'a EngineRegistry,
    policy: &PolicyResolver,
    breakers: &BreakerRegistry,
) -> Result<&'a EngineConfig> {
    let weighted: Vec<(&EngineConfig, f64)> = registry
        .all()
        .filter_map(|engine| {
            let host = engine_host(engine)?;
            if breakers.state_of(&host) == BreakerState::Open {
                return None;
            }
            let record = policy.policy_for(&host);
            if !record.is_usable() {
                return None;
            }
            let weight = engine.base_weight * record.qps.max(0.01);
            Some((engine, weight))
        })
        .collect();

    if weighted.is_empty() {
        return Err(SearchError::NoUsableEngines);
    }

    let total: f64 = weighted.iter().map(|(_, w)| w).sum();
    let mut draw = fastrand::f64() * total;
    for (engine, weight) in &weighted {
        if draw < *weight {
            return Ok(engine);
        }
        draw -= weight;
    }
    Ok(weighted.last().expect("checked non-empty above").0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use lyra_policy::PolicyConfig;

    fn registry() -> EngineRegistry {
        EngineRegistry::from_toml_str(
            r#"
[[engine]]
name = "only"
url_template = "https://only.example/search?q={query}"
results_per_page = 10
pagination_style = "offset"

[engine.selectors]
result_container = "div"
title = "a"
url = "a"
snippet = "p"
"#,
        )
        .unwrap()
    }

    #[test]
    fn single_usable_engine_is_always_drawn() {
        let registry = registry();
        let policy = PolicyResolver::new(PolicyConfig::default());
        let breakers = BreakerRegistry::default();
        let engine = select_engine(&registry, &policy, &breakers).unwrap();
        assert_eq!(engine.name, "only");
    }

    #[test]
    fn denylisted_host_leaves_no_usable_engines() {
        let registry = registry();
        let policy = PolicyResolver::new(
            PolicyConfig::default().with_denylist(vec!["only.example".to_string()]),
        );
        let breakers = BreakerRegistry::default();
        let result = select_engine(&registry, &policy, &breakers);
        assert!(matches!(result, Err(SearchError::NoUsableEngines)));
    }
}
