//! Browser-backed search & fetch layer, fetch half (C4): two fetch
//! strategies (HTTP, headful) with automatic escalation, challenge
//! detection, session reuse, archival, and Wayback fallback.

pub mod archive;
pub mod challenge;
pub mod client;
pub mod error;
pub mod fetcher;
pub mod headful;
pub mod robots;
pub mod types;
pub mod validator;
pub mod wayback;

pub use error::{FetchError, Result};
pub use fetcher::{Fetcher, FetcherBuilder, FetchOutcome};
pub use headful::{HeadfulBrowser, NullHeadfulBrowser, RemoteDebugChannel};
pub use types::{BlockedOutcome, FetchOptions, FetchPath, FetchResult};
pub use validator::UrlValidator;
pub use wayback::{WaybackClient, WaybackFallback};
