use std::collections::HashMap;
use std::time::Duration;

use lyra_session::SessionStore;
use reqwest::Client;

use crate::error::{FetchError, Result};
use crate::types::FetchOptions;

/// HTTP fetch path: a fingerprinted `reqwest::Client`, cookie/ETag
/// revalidation via `lyra-session`, and structured header capture (spec
/// 4.4 step 2).
pub struct HttpFetchClient {
    client: Client,
}

pub struct HttpFetchOutcome {
    pub status: u16,
    pub final_url: String,
    pub content_type: Option<String>,
    pub body: String,
    pub headers: HashMap<String, String>,
    pub etag: Option<String>,
    pub last_modified: Option<String>,
    pub set_cookies: Vec<(String, String)>,
    pub not_modified: bool,
}

impl HttpFetchClient {
    pub fn new(user_agent: &str) -> Self {
        let client = Client::builder()
            .user_agent(user_agent.to_string())
            .timeout(Duration::from_secs(30))
            .cookie_store(false) // cookies are carried explicitly via lyra-session
            .build()
            .expect("failed to build http fetch client");
        Self { client }
    }

    pub async fn fetch(
        &self,
        url: &str,
        options: &FetchOptions,
        sessions: &SessionStore,
    ) -> Result<HttpFetchOutcome> {
        let origin = SessionStore::origin_of(url).unwrap_or_default();
        let builder = self
            .client
            .get(url)
            .header(reqwest::header::USER_AGENT, options.user_agent.clone());
        let builder = sessions.apply_to_request(builder, &origin);

        let response = builder.send().await.map_err(|e| {
            if e.is_timeout() || e.is_connect() {
                FetchError::Transient {
                    url: url.to_string(),
                    source: e,
                }
            } else {
                FetchError::Transient {
                    url: url.to_string(),
                    source: e,
                }
            }
        })?;

        let status = response.status().as_u16();
        let final_url = response.url().to_string();
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let etag = response
            .headers()
            .get(reqwest::header::ETAG)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let last_modified = response
            .headers()
            .get(reqwest::header::LAST_MODIFIED)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        let set_cookies: Vec<(String, String)> = response
            .headers()
            .get_all(reqwest::header::SET_COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .filter_map(parse_set_cookie)
            .collect();

        let headers: HashMap<String, String> = response
            .headers()
            .iter()
            .filter_map(|(k, v)| v.to_str().ok().map(|v| (k.to_string(), v.to_string())))
            .collect();

        let not_modified = status == 304;

        if status >= 500 {
            return Err(FetchError::Transient {
                url: url.to_string(),
                source: response
                    .error_for_status()
                    .expect_err("5xx status should produce an error"),
            });
        }
        if status >= 400 && !not_modified {
            return Ok(HttpFetchOutcome {
                status,
                final_url,
                content_type,
                body: String::new(),
                headers,
                etag,
                last_modified,
                set_cookies,
                not_modified,
            });
        }

        let body = response.text().await.map_err(|e| FetchError::Transient {
            url: url.to_string(),
            source: e,
        })?;

        Ok(HttpFetchOutcome {
            status,
            final_url,
            content_type,
            body,
            headers,
            etag,
            last_modified,
            set_cookies,
            not_modified,
        })
    }
}

fn parse_set_cookie(raw: &str) -> Option<(String, String)> {
    let first_pair = raw.split(';').next()?;
    let (name, value) = first_pair.split_once('=')?;
    Some((name.trim().to_string(), value.trim().to_string()))
}
