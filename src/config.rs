//! Configuration types for collection-fetch
//!
//! A [`Config`] is an explicit value handed to every fetch call; nothing is
//! read from ambient or global state, so independent fetches can run side by
//! side in one process.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::{fmt, path::PathBuf, time::Duration};
use url::Url;

/// Default number of records requested per page
pub const DEFAULT_PAGE_SIZE: u64 = 10_000;

/// Strategy used to fetch the pages after the first one
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FetchMode {
    /// Fetch all remaining pages concurrently, then write the whole collection once (default)
    #[default]
    Parallel,
    /// Fetch pages one at a time and stream each into the sink as it arrives
    Sequential,
}

impl fmt::Display for FetchMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FetchMode::Parallel => f.write_str("parallel"),
            FetchMode::Sequential => f.write_str("sequential"),
        }
    }
}

/// Remote data service settings
#[derive(Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Data service URL, e.g. "https://db-myproject.example.io"
    ///
    /// A URL without a scheme is treated as https.
    pub base_url: String,

    /// Collection to fetch, e.g. "movies"
    pub collection: String,

    /// Access token, sent as the `access_token` cookie
    pub token: String,

    /// Field the collection is sorted by, ascending (default: "id")
    ///
    /// Must be stable and unique for the concatenated pages to be reproducible.
    #[serde(default = "default_sort_field")]
    pub sort_field: String,

    /// Timeout for each page request (default: 300 seconds)
    #[serde(default = "default_request_timeout", with = "duration_serde")]
    pub request_timeout: Duration,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            collection: String::new(),
            token: String::new(),
            sort_field: default_sort_field(),
            request_timeout: default_request_timeout(),
        }
    }
}

// Keeps the token out of logs.
impl fmt::Debug for ServiceConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceConfig")
            .field("base_url", &self.base_url)
            .field("collection", &self.collection)
            .field("token", &"<redacted>")
            .field("sort_field", &self.sort_field)
            .field("request_timeout", &self.request_timeout)
            .finish()
    }
}

impl ServiceConfig {
    /// Search endpoint of the configured collection: `{base_url}/{collection}/_search`
    pub fn search_url(&self) -> Result<Url> {
        let base = self.base_url.trim().trim_end_matches('/');
        if base.is_empty() {
            return Err(Error::config("service.base_url", "must not be empty"));
        }

        let with_scheme = if base.contains("://") {
            base.to_string()
        } else {
            format!("https://{base}")
        };

        let mut url = Url::parse(&with_scheme).map_err(|e| {
            Error::config("service.base_url", format!("invalid URL '{base}': {e}"))
        })?;

        url.path_segments_mut()
            .map_err(|_| Error::config("service.base_url", format!("'{base}' cannot be a base")))?
            .pop_if_empty()
            .push(&self.collection)
            .push("_search");

        Ok(url)
    }
}

/// Pagination behaviour
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchConfig {
    /// Records per page (default: 10000)
    #[serde(default = "default_page_size")]
    pub page_size: u64,

    /// How pages after the first are fetched (default: parallel)
    #[serde(default)]
    pub mode: FetchMode,

    /// Cap on simultaneous page requests in parallel mode (None = all at once)
    ///
    /// Sequential mode always has exactly one request in flight.
    #[serde(default)]
    pub max_concurrent_pages: Option<usize>,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            page_size: default_page_size(),
            mode: FetchMode::default(),
            max_concurrent_pages: None,
        }
    }
}

/// Where fetched documents go
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum OutputTarget {
    /// Print each page to stdout (default)
    #[default]
    Console,
    /// Write one JSON array to a file, replacing any existing file
    File {
        /// Destination path
        path: PathBuf,
        /// Write to `<path>.part` and rename on success (default: false)
        ///
        /// Without this, a failed sequential fetch leaves a truncated array at `path`.
        #[serde(default)]
        atomic_write: bool,
    },
}

impl OutputTarget {
    /// Verb used in the closing summary line
    pub fn verb(&self) -> &'static str {
        match self {
            OutputTarget::Console => "Fetched",
            OutputTarget::File { .. } => "Saved",
        }
    }
}

/// Complete configuration for one fetch
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Config {
    /// Remote service and collection
    pub service: ServiceConfig,

    /// Pagination settings
    #[serde(default)]
    pub fetch: FetchConfig,

    /// Output destination
    #[serde(default)]
    pub output: OutputTarget,
}

impl Config {
    /// Check settings that can be verified without touching the network
    pub fn validate(&self) -> Result<()> {
        self.service.search_url()?;

        if self.service.collection.trim().is_empty() {
            return Err(Error::config("service.collection", "must not be empty"));
        }
        if self.service.collection.contains('/') {
            return Err(Error::config(
                "service.collection",
                format!("'{}' must not contain '/'", self.service.collection),
            ));
        }
        if self.service.token.is_empty() {
            return Err(Error::config("service.token", "must not be empty"));
        }
        if self.service.sort_field.trim().is_empty() {
            return Err(Error::config("service.sort_field", "must not be empty"));
        }
        if self.service.request_timeout.is_zero() {
            return Err(Error::config(
                "service.request_timeout",
                "must be at least one second",
            ));
        }
        if let OutputTarget::File { path, .. } = &self.output
            && path.as_os_str().is_empty()
        {
            return Err(Error::config("output.path", "must not be empty"));
        }

        Ok(())
    }
}

fn default_page_size() -> u64 {
    DEFAULT_PAGE_SIZE
}

fn default_sort_field() -> String {
    "id".into()
}

fn default_request_timeout() -> Duration {
    Duration::from_secs(300) // 5 minutes, pages of 10k documents can be slow
}

// Duration serialization helper
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}
