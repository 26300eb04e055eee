use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use reqwest::blocking::Client;

use crate::config::IngestConfig;
use crate::{Clock, system_clock};

#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Invalid request header '{0}'")]
    InvalidHeader(String),
    #[error("Empty response for {0}")]
    EmptyBody(String),
}

/// Issues a single GET and returns the body.
pub trait Transport {
    fn get(&self, url: &str, headers: &[(String, String)]) -> Result<String, FetchError>;
}

#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    pub fn new(timeout: Option<Duration>) -> Result<Self, FetchError> {
        let mut builder = Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        Ok(Self {
            client: builder.build()?,
        })
    }
}

impl Transport for HttpTransport {
    fn get(&self, url: &str, headers: &[(String, String)]) -> Result<String, FetchError> {
        let mut request = self.client.get(url);
        for (name, value) in headers {
            if name.is_empty() || value.contains(['\r', '\n']) {
                return Err(FetchError::InvalidHeader(name.clone()));
            }
            request = request.header(name.as_str(), value.as_str());
        }
        let body = request.send()?.error_for_status()?.text()?;
        if body.trim().is_empty() {
            return Err(FetchError::EmptyBody(url.to_string()));
        }
        Ok(body)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct CacheKey {
    url: String,
    headers: Vec<(String, String)>,
}

#[derive(Debug, Clone)]
struct CachedPage {
    body: String,
    fetched_at: DateTime<Utc>,
}

/// Pages fetched during this run, keyed by url and the exact header set.
pub struct FetchCache {
    entries: HashMap<CacheKey, CachedPage>,
    ttl: Option<TimeDelta>,
    clock: Clock,
}

impl FetchCache {
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
            ttl: None,
            clock: system_clock(),
        }
    }

    pub fn with_ttl(mut self, ttl: TimeDelta) -> Self {
        self.ttl = Some(ttl);
        self
    }

    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    fn get(&self, key: &CacheKey) -> Option<&str> {
        let page = self.entries.get(key)?;
        if let Some(ttl) = self.ttl
            && (self.clock)() - page.fetched_at >= ttl
        {
            return None;
        }
        Some(&page.body)
    }

    fn insert(&mut self, key: CacheKey, body: String) {
        let fetched_at = (self.clock)();
        self.entries.insert(key, CachedPage { body, fetched_at });
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

impl Default for FetchCache {
    fn default() -> Self {
        Self::new()
    }
}

pub struct FetchClient {
    transport: Box<dyn Transport>,
    cache: FetchCache,
    default_headers: BTreeMap<String, String>,
}

impl FetchClient {
    pub fn new(config: &IngestConfig) -> Result<Self, FetchError> {
        let timeout = config.request_timeout_secs.map(Duration::from_secs);
        let transport = HttpTransport::new(timeout)?;
        Ok(Self::with_transport(Box::new(transport)).user_agent(&config.user_agent))
    }

    pub fn with_transport(transport: Box<dyn Transport>) -> Self {
        Self {
            transport,
            cache: FetchCache::new(),
            default_headers: BTreeMap::new(),
        }
    }

    pub fn user_agent(self, user_agent: &str) -> Self {
        self.default_header("User-Agent", user_agent)
    }

    pub fn default_header(mut self, name: &str, value: &str) -> Self {
        self.default_headers
            .insert(name.to_ascii_lowercase(), value.to_string());
        self
    }

    pub fn with_cache(mut self, cache: FetchCache) -> Self {
        self.cache = cache;
        self
    }

    pub fn cache(&self) -> &FetchCache {
        &self.cache
    }

    pub fn cache_mut(&mut self) -> &mut FetchCache {
        &mut self.cache
    }

    /// Returns the body at `url`, going to the network only the first time a
    /// given url and header set is requested.
    pub fn fetch(&mut self, url: &str, headers: &[(&str, &str)]) -> Result<String, FetchError> {
        let mut merged = self.default_headers.clone();
        for (name, value) in headers {
            merged.insert(name.to_ascii_lowercase(), value.to_string());
        }
        let key = CacheKey {
            url: url.to_string(),
            headers: merged.into_iter().collect(),
        };

        if let Some(body) = self.cache.get(&key) {
            log::debug!("Cache hit for {}", url);
            return Ok(body.to_string());
        }

        log::info!("Fetching {}", url);
        let body = self.transport.get(&key.url, &key.headers)?;
        self.cache.insert(key, body.clone());
        Ok(body)
    }
}
