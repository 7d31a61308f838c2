//! Session transfer (C7): carries cookies and conditional-request headers
//! captured during a headful browser visit into subsequent HTTP fetches
//! for the same origin.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Cookies and validators captured from one origin. Kept simple (name,
/// value pairs) rather than a full `cookie` crate jar, matching the level
/// of detail the tool boundary and intervention queue actually need.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionState {
    pub cookies: Vec<(String, String)>,
    pub etag: Option<String>,
    pub last_modified: Option<String>,
    pub captured_at: Option<DateTime<Utc>>,
}

impl SessionState {
    pub fn is_empty(&self) -> bool {
        self.cookies.is_empty() && self.etag.is_none() && self.last_modified.is_none()
    }

    fn cookie_header(&self) -> Option<String> {
        if self.cookies.is_empty() {
            return None;
        }
        Some(
            self.cookies
                .iter()
                .map(|(k, v)| format!("{k}={v}"))
                .collect::<Vec<_>>()
                .join("; "),
        )
    }
}

/// In-memory store keyed by URL origin (`scheme://host[:port]`). Also
/// handed to the intervention queue so `solved` resolutions can persist a
/// captured session (spec 4.6/4.7).
#[derive(Default)]
pub struct SessionStore {
    sessions: DashMap<String, SessionState>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn origin_of(url: &str) -> Option<String> {
        let parsed = url::Url::parse(url).ok()?;
        let scheme = parsed.scheme();
        let host = parsed.host_str()?;
        Some(match parsed.port() {
            Some(port) => format!("{scheme}://{host}:{port}"),
            None => format!("{scheme}://{host}"),
        })
    }

    /// Merges newly observed cookies/validators into the stored state for
    /// `origin`. Existing cookies with the same name are overwritten.
    pub fn capture(&self, origin: &str, cookies: Vec<(String, String)>, etag: Option<String>, last_modified: Option<String>) {
        let mut entry = self.sessions.entry(origin.to_string()).or_default();
        for (name, value) in cookies {
            if let Some(existing) = entry.cookies.iter_mut().find(|(n, _)| *n == name) {
                existing.1 = value;
            } else {
                entry.cookies.push((name, value));
            }
        }
        if etag.is_some() {
            entry.etag = etag;
        }
        if last_modified.is_some() {
            entry.last_modified = last_modified;
        }
        entry.captured_at = Some(Utc::now());
        debug!(origin, cookies = entry.cookies.len(), "session captured");
    }

    pub fn get(&self, origin: &str) -> Option<SessionState> {
        self.sessions.get(origin).map(|entry| entry.clone())
    }

    /// Adds the stored `Cookie` header and conditional-request headers
    /// (`If-None-Match`/`If-Modified-Since`) for `origin` onto `builder`.
    pub fn apply_to_request(
        &self,
        builder: reqwest::RequestBuilder,
        origin: &str,
    ) -> reqwest::RequestBuilder {
        let Some(state) = self.get(origin) else {
            return builder;
        };
        let mut builder = builder;
        if let Some(cookie_header) = state.cookie_header() {
            builder = builder.header(reqwest::header::COOKIE, cookie_header);
        }
        if let Some(etag) = state.etag {
            builder = builder.header(reqwest::header::IF_NONE_MATCH, etag);
        }
        if let Some(last_modified) = state.last_modified {
            builder = builder.header(reqwest::header::IF_MODIFIED_SINCE, last_modified);
        }
        builder
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn origin_strips_path_and_query() {
        let origin = SessionStore::origin_of("https://example.com:8443/a/b?x=1").unwrap();
        assert_eq!(origin, "https://example.com:8443");
    }

    #[test]
    fn origin_without_explicit_port() {
        let origin = SessionStore::origin_of("https://example.com/a").unwrap();
        assert_eq!(origin, "https://example.com");
    }

    #[test]
    fn capture_merges_cookies_by_name() {
        let store = SessionStore::new();
        store.capture(
            "https://example.com",
            vec![("session".into(), "a".into())],
            None,
            None,
        );
        store.capture(
            "https://example.com",
            vec![("session".into(), "b".into()), ("theme".into(), "dark".into())],
            Some("\"etag1\"".into()),
            None,
        );
        let state = store.get("https://example.com").unwrap();
        assert_eq!(state.cookies.len(), 2);
        assert!(state.cookies.contains(&("session".to_string(), "b".to_string())));
        assert_eq!(state.etag.as_deref(), Some("\"etag1\""));
    }

    #[test]
    fn missing_origin_returns_none() {
        let store = SessionStore::new();
        assert!(store.get("https://never-seen.example").is_none());
    }

    #[test]
    fn unset_session_is_empty() {
        assert!(SessionState::default().is_empty());
    }
}
