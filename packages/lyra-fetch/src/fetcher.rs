use std::sync::Arc;
use std::time::Instant;

use dashmap::DashMap;
use lyra_breaker::BreakerRegistry;
use lyra_intervention::{InterventionItem, InterventionQueue, InterventionType};
use lyra_policy::PolicyResolver;
use lyra_ratelimit::RateLimiterRegistry;
use lyra_session::SessionStore;
use tracing::{info, warn};
use url::Url;
use uuid::Uuid;

use crate::archive::Archiver;
use crate::challenge::{detect_challenge, ChallengeKind};
use crate::client::HttpFetchClient;
use crate::error::{FetchError, Result};
use crate::headful::{HeadfulBrowser, NullHeadfulBrowser};
use crate::robots::RobotsTxt;
use crate::types::{BlockedOutcome, FetchOptions, FetchPath, FetchResult};
use crate::validator::UrlValidator;
use crate::wayback::{WaybackClient, WaybackFallback};

#[derive(Debug)]
pub enum FetchOutcome {
    Success(FetchResult),
    Blocked(BlockedOutcome),
}

/// Orchestrates the two fetch strategies (HTTP, headful) with automatic
/// escalation, challenge detection, session reuse, archival, and Wayback
/// fallback (spec 4.4). Holds every collaborator as a long-lived handle,
/// matching the "explicit state handles" design note.
pub struct Fetcher {
    policy: Arc<PolicyResolver>,
    breakers: Arc<BreakerRegistry>,
    rate_limits: Arc<RateLimiterRegistry>,
    sessions: Arc<SessionStore>,
    interventions: Arc<dyn InterventionQueue>,
    validator: UrlValidator,
    http: HttpFetchClient,
    headful: Arc<dyn HeadfulBrowser>,
    wayback: Arc<dyn WaybackFallback>,
    archiver: Archiver,
    robots_cache: DashMap<String, RobotsTxt>,
}

pub struct FetcherBuilder {
    policy: Arc<PolicyResolver>,
    breakers: Arc<BreakerRegistry>,
    rate_limits: Arc<RateLimiterRegistry>,
    sessions: Arc<SessionStore>,
    interventions: Arc<dyn InterventionQueue>,
    headful: Arc<dyn HeadfulBrowser>,
    wayback: Arc<dyn WaybackFallback>,
    archive_dir: String,
    user_agent: String,
}

impl FetcherBuilder {
    pub fn new(
        policy: Arc<PolicyResolver>,
        breakers: Arc<BreakerRegistry>,
        rate_limits: Arc<RateLimiterRegistry>,
        sessions: Arc<SessionStore>,
        interventions: Arc<dyn InterventionQueue>,
    ) -> Self {
        Self {
            policy,
            breakers,
            rate_limits,
            sessions,
            interventions,
            headful: Arc::new(NullHeadfulBrowser),
            wayback: Arc::new(WaybackClient::new()),
            archive_dir: "./data/archive".to_string(),
            user_agent: "LyraResearchAgent/0.1 (+https://lyra.invalid/bot)".to_string(),
        }
    }

    pub fn with_headful(mut self, headful: Arc<dyn HeadfulBrowser>) -> Self {
        self.headful = headful;
        self
    }

    pub fn with_archive_dir(mut self, dir: impl Into<String>) -> Self {
        self.archive_dir = dir.into();
        self
    }

    pub fn build(self) -> Fetcher {
        Fetcher {
            policy: self.policy,
            breakers: self.breakers,
            rate_limits: self.rate_limits,
            sessions: self.sessions,
            interventions: self.interventions,
            validator: UrlValidator::new(),
            http: HttpFetchClient::new(&self.user_agent),
            headful: self.headful,
            wayback: self.wayback,
            archiver: Archiver::new(self.archive_dir),
            robots_cache: DashMap::new(),
        }
    }
}

impl Fetcher {
    fn host_of(url: &str) -> Result<String> {
        let parsed = Url::parse(url)?;
        parsed
            .host_str()
            .map(str::to_string)
            .ok_or_else(|| FetchError::Blocked("missing host".to_string()))
    }

    async fn robots_allows(&self, host: &str, path: &str, user_agent: &str) -> bool {
        if let Some(cached) = self.robots_cache.get(host) {
            return cached.is_allowed(user_agent, path);
        }
        let robots_url = format!("https://{host}/robots.txt");
        let robots = match reqwest::get(&robots_url).await {
            Ok(resp) if resp.status().is_success() => {
                let body = resp.text().await.unwrap_or_default();
                RobotsTxt::parse(&body)
            }
            _ => RobotsTxt::default(),
        };
        let allowed = robots.is_allowed(user_agent, path);
        self.robots_cache.insert(host.to_string(), robots);
        allowed
    }

    pub async fn fetch(&self, url: &str, task_id: Uuid, options: &FetchOptions) -> Result<FetchOutcome> {
        let host = Self::host_of(url)?;
        let policy = self.policy.policy_for(&host);

        if !policy.is_usable() {
            return Err(FetchError::PolicyDenied(host));
        }
        if !self.breakers.allow_request(&host) {
            return Err(FetchError::BreakerOpen(host));
        }
        self.validator.validate_with_dns(url).await?;

        if options.respect_robots {
            let path = Url::parse(url)?.path().to_string();
            if !self.robots_allows(&host, &path, &options.user_agent).await {
                return Err(FetchError::PolicyDenied(format!("{host} disallows {path} via robots.txt")));
            }
        }

        self.rate_limits
            .wait(&host, policy.qps)
            .await
            .map_err(|_| FetchError::BreakerOpen(host.clone()))?;

        let started = Instant::now();
        match self.http.fetch(url, options, &self.sessions).await {
            Ok(outcome) => {
                let origin = SessionStore::origin_of(url).unwrap_or_default();
                self.sessions.capture(
                    &origin,
                    outcome.set_cookies.clone(),
                    outcome.etag.clone(),
                    outcome.last_modified.clone(),
                );

                if let Some(challenge) = detect_challenge(outcome.status, &outcome.body) {
                    return self.route_to_intervention(task_id, &host, url, challenge).await;
                }

                if outcome.status >= 400 {
                    self.breakers.record_failure(&host);
                    if options.allow_headful_escalation {
                        return self.escalate_to_headful(task_id, &host, url, options).await;
                    }
                    return Err(FetchError::Permanent {
                        url: url.to_string(),
                        status: outcome.status,
                    });
                }

                self.breakers.record_success(&host, started.elapsed());
                let archive_refs = self.archiver.archive_body(url, outcome.status, outcome.body.as_bytes())?;
                Ok(FetchOutcome::Success(FetchResult {
                    status: outcome.status,
                    final_url: outcome.final_url,
                    content_type: outcome.content_type,
                    body: outcome.body,
                    headers: outcome.headers,
                    archive_refs,
                    used_path: FetchPath::Http,
                    freshness_penalty: false,
                }))
            }
            Err(_) => {
                self.breakers.record_failure(&host);
                if options.allow_headful_escalation {
                    self.escalate_to_headful(task_id, &host, url, options).await
                } else {
                    self.fall_back_to_wayback(url).await
                }
            }
        }
    }

    async fn escalate_to_headful(
        &self,
        task_id: Uuid,
        host: &str,
        url: &str,
        options: &FetchOptions,
    ) -> Result<FetchOutcome> {
        if self.breakers.state_of(host) == lyra_breaker::BreakerState::Open {
            return self.fall_back_to_wayback(url).await;
        }
        info!(url, "escalating to headful fetch after http failure");
        let started = Instant::now();
        match self.headful.navigate(url, &options.browser_profile, true).await {
            Ok(outcome) => {
                let origin = SessionStore::origin_of(url).unwrap_or_default();
                let cookies = outcome
                    .cookies
                    .iter()
                    .map(|c| (c.name.clone(), c.value.clone()))
                    .collect();
                self.sessions.capture(&origin, cookies, None, None);

                if let Some(challenge) = detect_challenge(outcome.status, &outcome.html) {
                    return self.route_to_intervention(task_id, host, url, challenge).await;
                }

                self.breakers.record_success(host, started.elapsed());
                let archive_refs = self
                    .archiver
                    .archive_body(url, outcome.status, outcome.html.as_bytes())?;
                Ok(FetchOutcome::Success(FetchResult {
                    status: outcome.status,
                    final_url: outcome.final_url,
                    content_type: outcome.content_type,
                    body: outcome.html,
                    headers: Default::default(),
                    archive_refs,
                    used_path: FetchPath::Headful,
                    freshness_penalty: false,
                }))
            }
            Err(err) => {
                warn!(url, error = %err, "headful escalation failed, falling back to wayback");
                self.breakers.record_failure(host);
                self.fall_back_to_wayback(url).await
            }
        }
    }

    async fn fall_back_to_wayback(&self, url: &str) -> Result<FetchOutcome> {
        match self.wayback.fetch_closest(url).await {
            Ok(Some(snapshot)) => {
                let archive_refs = self.archiver.archive_body(url, 200, snapshot.body.as_bytes())?;
                Ok(FetchOutcome::Success(FetchResult {
                    status: 200,
                    final_url: snapshot.archived_url,
                    content_type: None,
                    body: snapshot.body,
                    headers: Default::default(),
                    archive_refs,
                    used_path: FetchPath::Wayback,
                    freshness_penalty: true,
                }))
            }
            Ok(None) => Err(FetchError::Permanent {
                url: url.to_string(),
                status: 0,
            }),
            Err(err) => Err(err),
        }
    }

    async fn route_to_intervention(
        &self,
        task_id: Uuid,
        host: &str,
        url: &str,
        challenge: ChallengeKind,
    ) -> Result<FetchOutcome> {
        let intervention_type = match &challenge {
            ChallengeKind::LoginGate => InterventionType::Login,
            _ => InterventionType::Captcha,
        };
        let diagnostic = format!("{challenge:?}");
        let item = InterventionItem::new(task_id, host, url, intervention_type, diagnostic);
        let item = self
            .interventions
            .enqueue(item)
            .await
            .map_err(|e| FetchError::Archive(e.to_string()))?;
        Ok(FetchOutcome::Blocked(BlockedOutcome {
            challenge,
            intervention_id: item.id,
        }))
    }
}
