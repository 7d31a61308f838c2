use std::collections::HashMap;

use serde::Deserialize;

use crate::error::{Result, SearchError};
use crate::types::EngineConfig;

/// Raw contents of the engine/parser declaration config file (the
/// second of the two contractual config files named in spec section 6).
#[derive(Debug, Clone, Deserialize)]
pub struct EngineRegistryFile {
    #[serde(default)]
    pub engine: Vec<EngineConfig>,
}

/// Declared engines, keyed by name, ready for weighted selection.
#[derive(Debug, Clone)]
pub struct EngineRegistry {
    engines: HashMap<String, EngineConfig>,
}

impl EngineRegistry {
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let file: EngineRegistryFile = toml::from_str(raw)
            .map_err(|e| SearchError::ConfigParse("engine registry".to_string(), e.to_string()))?;
        let engines = file.engine.into_iter().map(|e| (e.name.clone(), e)).collect();
        Ok(Self { engines })
    }

    pub fn get(&self, name: &str) -> Result<&EngineConfig> {
        self.engines
            .get(name)
            .ok_or_else(|| SearchError::UnknownEngine(name.to_string()))
    }

    pub fn names(&self) -> Vec<&str> {
        self.engines.keys().map(String::as_str).collect()
    }

    pub fn all(&self) -> impl Iterator<Item = &EngineConfig> {
        self.engines.values()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
[[engine]]
name = "duckduckgo"
url_template = "https://duckduckgo.com/html/?q={query}&s={offset}"
results_per_page = 10
pagination_style = "offset"
base_weight = 1.5

[engine.selectors]
result_container = "div.result"
title = "a.result__a"
url = "a.result__a"
snippet = "a.result__snippet"

[[engine.captcha_signatures]]
pattern = "unusual traffic"
provider_hint = "duckduckgo_rate_limit"

[[engine]]
name = "bing"
url_template = "https://www.bing.com/search?q={query}&first={offset}"
results_per_page = 10
pagination_style = "offset"

[engine.selectors]
result_container = "li.b_algo"
title = "h2 a"
url = "h2 a"
snippet = ".b_caption p"
"#;

    #[test]
    fn parses_multiple_engines_with_defaults() {
        let registry = EngineRegistry::from_toml_str(SAMPLE).unwrap();
        assert_eq!(registry.names().len(), 2);
        let ddg = registry.get("duckduckgo").unwrap();
        assert_eq!(ddg.base_weight, 1.5);
        assert_eq!(ddg.captcha_signatures.len(), 1);
        let bing = registry.get("bing").unwrap();
        assert_eq!(bing.base_weight, 1.0); // default
    }

    #[test]
    fn unknown_engine_is_an_error() {
        let registry = EngineRegistry::from_toml_str(SAMPLE).unwrap();
        assert!(registry.get("yahoo").is_err());
    }
}
