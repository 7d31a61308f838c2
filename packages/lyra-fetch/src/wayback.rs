//! Wayback Machine read-only fallback (spec 4.4 step 5).

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

use crate::error::{FetchError, Result};

#[derive(Debug, Clone, Deserialize)]
struct AvailabilityResponse {
    archived_snapshots: ArchivedSnapshots,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct ArchivedSnapshots {
    closest: Option<ClosestSnapshot>,
}

#[derive(Debug, Clone, Deserialize)]
struct ClosestSnapshot {
    available: bool,
    url: String,
    timestamp: String,
}

#[derive(Debug, Clone)]
pub struct WaybackResult {
    pub archived_url: String,
    pub snapshot_timestamp: String,
    pub body: String,
}

#[async_trait]
pub trait WaybackFallback: Send + Sync {
    async fn fetch_closest(&self, url: &str) -> Result<Option<WaybackResult>>;
}

pub struct WaybackClient {
    client: Client,
}

impl WaybackClient {
    pub fn new() -> Self {
        Self {
            client: Client::builder()
                .timeout(Duration::from_secs(20))
                .build()
                .expect("failed to build wayback http client"),
        }
    }
}

impl Default for WaybackClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl WaybackFallback for WaybackClient {
    async fn fetch_closest(&self, url: &str) -> Result<Option<WaybackResult>> {
        let availability: AvailabilityResponse = self
            .client
            .get("https://archive.org/wayback/available")
            .query(&[("url", url)])
            .send()
            .await
            .map_err(|e| FetchError::Transient {
                url: url.to_string(),
                source: e,
            })?
            .json()
            .await
            .map_err(|e| FetchError::Transient {
                url: url.to_string(),
                source: e,
            })?;

        let Some(snapshot) = availability.archived_snapshots.closest else {
            return Ok(None);
        };
        if !snapshot.available {
            return Ok(None);
        }

        let body = self
            .client
            .get(&snapshot.url)
            .send()
            .await
            .map_err(|e| FetchError::Transient {
                url: url.to_string(),
                source: e,
            })?
            .text()
            .await
            .map_err(|e| FetchError::Transient {
                url: url.to_string(),
                source: e,
            })?;

        Ok(Some(WaybackResult {
            archived_url: snapshot.url,
            snapshot_timestamp: snapshot.timestamp,
            body,
        }))
    }
}
