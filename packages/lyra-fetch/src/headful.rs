//! Headful browser fetch path, reached over a remote-debug channel. The
//! browser process itself is an external collaborator (spec section 1,
//! Out of scope); this module talks to it over HTTP, the same shape the
//! teacher uses for its `FirecrawlIngestor` external JS-rendering backend.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::error::{FetchError, Result};

#[derive(Debug, Clone, Serialize)]
struct NavigateRequest<'a> {
    url: &'a str,
    /// Reuse the existing context for this profile rather than spinning up
    /// a fresh one (spec 4.4 step 3: "Never create a fresh context when an
    /// existing one exists").
    profile: &'a str,
    capture_screenshot: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HeadfulOutcome {
    pub status: u16,
    pub final_url: String,
    pub html: String,
    pub content_type: Option<String>,
    #[serde(default)]
    pub cookies: Vec<HeadfulCookie>,
    #[serde(default)]
    pub screenshot_base64: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HeadfulCookie {
    pub name: String,
    pub value: String,
}

#[async_trait]
pub trait HeadfulBrowser: Send + Sync {
    async fn navigate(&self, url: &str, profile: &str, capture_screenshot: bool) -> Result<HeadfulOutcome>;
}

/// Talks to a remote-debug-channel service (e.g. a CDP-fronting sidecar)
/// over HTTP. One tab is used per profile; the service itself is
/// responsible for the single-tab-pool discipline described in spec 4.5 —
/// this client only ever issues one navigate call at a time per profile,
/// enforced by the caller holding the `browser_headful` scheduler group.
pub struct RemoteDebugChannel {
    client: Client,
    base_url: String,
}

impl RemoteDebugChannel {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: Client::builder()
                .timeout(Duration::from_secs(60))
                .build()
                .expect("failed to build headful browser http client"),
            base_url: base_url.into(),
        }
    }
}

#[async_trait]
impl HeadfulBrowser for RemoteDebugChannel {
    async fn navigate(&self, url: &str, profile: &str, capture_screenshot: bool) -> Result<HeadfulOutcome> {
        let response = self
            .client
            .post(format!("{}/navigate", self.base_url))
            .json(&NavigateRequest {
                url,
                profile,
                capture_screenshot,
            })
            .send()
            .await
            .map_err(|e| FetchError::Transient {
                url: url.to_string(),
                source: e,
            })?;

        if !response.status().is_success() {
            return Err(FetchError::Permanent {
                url: url.to_string(),
                status: response.status().as_u16(),
            });
        }

        response.json::<HeadfulOutcome>().await.map_err(|e| FetchError::Transient {
            url: url.to_string(),
            source: e,
        })
    }
}

/// Stand-in used when no remote-debug channel endpoint is configured.
/// Escalation to headful always fails with `HeadfulUnavailable` rather
/// than silently no-opping, so the caller's "escalate exactly once" logic
/// still has a terminal outcome to record.
pub struct NullHeadfulBrowser;

#[async_trait]
impl HeadfulBrowser for NullHeadfulBrowser {
    async fn navigate(&self, _url: &str, _profile: &str, _capture_screenshot: bool) -> Result<HeadfulOutcome> {
        Err(FetchError::HeadfulUnavailable)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn null_browser_always_reports_unavailable() {
        let browser = NullHeadfulBrowser;
        let result = browser.navigate("https://example.com", "default", false).await;
        assert!(matches!(result, Err(FetchError::HeadfulUnavailable)));
    }
}
