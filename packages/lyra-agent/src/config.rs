//! Process configuration: environment variables control transport
//! endpoints, the data directory, and log verbosity (spec section 6).
//! Everything else — domain policy, engine declarations — is contractual
//! TOML, loaded separately once the data directory is known.

use std::env;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use lyra_policy::PolicyConfig;
use lyra_search::EngineRegistry;

#[derive(Debug, Clone)]
pub struct AgentConfig {
    pub data_dir: PathBuf,
    pub ml_inference_base_url: String,
    pub browser_cdp_endpoint: Option<String>,
    pub log_filter: String,
}

impl AgentConfig {
    /// Loads from the environment, falling back to a `.env` file in the
    /// working directory when present (development convenience, mirrors
    /// the teacher's `Config::from_env`).
    pub fn from_env() -> Result<Self> {
        let _ = dotenvy::dotenv();

        let data_dir = env::var("LYRA_DATA_DIR").unwrap_or_else(|_| "./data".to_string());
        let ml_inference_base_url = env::var("LYRA_ML_INFERENCE_URL")
            .context("LYRA_ML_INFERENCE_URL must be set (base URL of the NLI/embedding service)")?;
        let browser_cdp_endpoint = env::var("LYRA_BROWSER_CDP_ENDPOINT").ok();
        let log_filter = env::var("LYRA_LOG").unwrap_or_else(|_| "info,lyra_agent=debug,sqlx=warn".to_string());

        Ok(Self {
            data_dir: PathBuf::from(data_dir),
            ml_inference_base_url,
            browser_cdp_endpoint,
            log_filter,
        })
    }

    pub fn database_url(&self) -> String {
        format!("sqlite://{}/lyra.db?mode=rwc", self.data_dir.display())
    }

    pub fn sql_readonly_path(&self) -> String {
        format!("file:{}/lyra.db?mode=ro", self.data_dir.display())
    }

    pub fn domain_policy_path(&self) -> PathBuf {
        self.data_dir.join("domain_policy.toml")
    }

    pub fn engine_registry_path(&self) -> PathBuf {
        self.data_dir.join("engines.toml")
    }
}

/// Loads the domain policy config (allowlist/denylist/user_overrides).
/// `PolicyConfig` derives `Deserialize` directly, so no wrapper type is
/// needed here, unlike the engine registry below.
pub fn load_policy_config(path: &Path) -> Result<PolicyConfig> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("reading domain policy config at {}", path.display()))?;
    toml::from_str(&raw).with_context(|| format!("parsing domain policy config at {}", path.display()))
}

/// Loads the engine/parser declarations config (search_url template,
/// pagination, selectors, CAPTCHA signatures, weights per engine).
pub fn load_engine_registry(path: &Path) -> Result<EngineRegistry> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("reading engine registry config at {}", path.display()))?;
    EngineRegistry::from_toml_str(&raw).with_context(|| format!("parsing engine registry config at {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn database_url_points_inside_the_data_dir() {
        let config = AgentConfig {
            data_dir: PathBuf::from("/tmp/lyra-test-data"),
            ml_inference_base_url: "http://localhost:9000".to_string(),
            browser_cdp_endpoint: None,
            log_filter: "info".to_string(),
        };
        assert_eq!(config.database_url(), "sqlite:///tmp/lyra-test-data/lyra.db?mode=rwc");
        assert_eq!(config.sql_readonly_path(), "file:/tmp/lyra-test-data/lyra.db?mode=ro");
    }
}
