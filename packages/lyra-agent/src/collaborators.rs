//! Builds and holds every long-lived handle the job handlers and the
//! tool server share: one of each per process, passed around as `Arc`s
//! rather than reached for through a global (design note: "explicit
//! state handles").

use std::sync::Arc;

use anyhow::{Context, Result};
use lyra_breaker::{BackoffPolicy, BreakerRegistry, BreakerThresholds};
use lyra_fetch::{Fetcher, FetcherBuilder};
use lyra_nli::{HttpNliClient, NliClient};
use lyra_policy::PolicyResolver;
use lyra_ratelimit::RateLimiterRegistry;
use lyra_scheduler::Scheduler;
use lyra_search::{EngineRegistry, SearchProvider};
use lyra_session::SessionStore;
use lyra_sql::SqlEngine;
use lyra_store::{EvidenceStore, SqliteInterventionQueue, SqliteOverrideLookup};

use crate::config::AgentConfig;
use crate::llm_client::HttpLlmClient;

pub struct Collaborators {
    pub store: EvidenceStore,
    pub scheduler: Arc<Scheduler>,
    pub policy: Arc<PolicyResolver>,
    pub breakers: Arc<BreakerRegistry>,
    pub fetcher: Arc<Fetcher>,
    pub search: Arc<SearchProvider>,
    pub interventions: Arc<SqliteInterventionQueue>,
    pub overrides: Arc<SqliteOverrideLookup>,
    pub nli_client: Arc<dyn NliClient>,
    pub llm_client: Arc<HttpLlmClient>,
    pub sql: SqlEngine,
}

impl Collaborators {
    pub async fn build(config: &AgentConfig) -> Result<Self> {
        std::fs::create_dir_all(&config.data_dir)
            .with_context(|| format!("creating data directory {}", config.data_dir.display()))?;

        let store = EvidenceStore::new(&config.database_url())
            .await
            .context("opening evidence store")?;

        let overrides = SqliteOverrideLookup::new();
        overrides.refresh(store.pool()).await.context("loading domain override rules")?;

        let policy_config = crate::config::load_policy_config(&config.domain_policy_path())
            .context("loading domain policy config")?;
        let policy = Arc::new(PolicyResolver::with_overrides(policy_config, overrides.clone()));

        let engine_registry: EngineRegistry = crate::config::load_engine_registry(&config.engine_registry_path())
            .context("loading engine registry config")?;

        let breakers = Arc::new(BreakerRegistry::new(BreakerThresholds::default(), BackoffPolicy::default()));
        let rate_limits = Arc::new(RateLimiterRegistry::new());
        let sessions = Arc::new(SessionStore::new());
        let interventions = Arc::new(SqliteInterventionQueue::new(store.clone()));

        let fetcher = Arc::new(
            FetcherBuilder::new(policy.clone(), breakers.clone(), rate_limits, sessions, interventions.clone())
                .with_archive_dir(config.data_dir.join("archive").display().to_string())
                .build(),
        );

        let search = Arc::new(SearchProvider::new(
            engine_registry,
            policy.clone(),
            breakers.clone(),
            fetcher.clone(),
            interventions.clone(),
        ));

        let nli_client: Arc<dyn NliClient> = Arc::new(HttpNliClient::new(config.ml_inference_base_url.clone()));
        let llm_client = Arc::new(HttpLlmClient::new(config.ml_inference_base_url.clone()));

        let sql = SqlEngine::open(&config.sql_readonly_path()).context("opening read-only SQL surface")?;

        let scheduler = Scheduler::new(store.clone());

        Ok(Self {
            store,
            scheduler,
            policy,
            breakers,
            fetcher,
            search,
            interventions,
            overrides,
            nli_client,
            llm_client,
            sql,
        })
    }
}
