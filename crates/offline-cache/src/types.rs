//! # Cache Types
//!
//! Requests, responses and the identity under which responses are cached.

use std::fmt;
use std::time::Duration;

use bytes::Bytes;
use reqwest::Method;
use serde::{Deserialize, Serialize};
use url::Url;

/// An intercepted outgoing request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub method: Method,
    pub url: Url,
    pub headers: Vec<(String, String)>,
}

impl Request {
    pub fn new(method: Method, url: Url) -> Self {
        Self {
            method,
            url,
            headers: Vec::new(),
        }
    }

    /// A plain GET request.
    pub fn get(url: Url) -> Self {
        Self::new(Method::GET, url)
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Identity of this request in a cache partition.
    pub fn cache_key(&self) -> CacheKey {
        CacheKey::new(self.method.as_str(), self.url.clone())
    }
}

/// A response, either fresh from the network or replayed from a cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Bytes,
}

impl Response {
    pub fn new(status: u16, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: body.into(),
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Only complete `200 OK` responses are written to runtime caches.
    pub fn is_cacheable(&self) -> bool {
        self.status == 200
    }
}

/// Request identity used as a cache key: method plus URL without fragment.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CacheKey {
    pub method: String,
    pub url: Url,
}

impl CacheKey {
    pub fn new(method: impl Into<String>, mut url: Url) -> Self {
        url.set_fragment(None);
        Self {
            method: method.into().to_ascii_uppercase(),
            url,
        }
    }

    /// Key for a GET of `url`.
    pub fn get(url: Url) -> Self {
        Self::new("GET", url)
    }

    /// Convert to a filename-safe string
    pub fn to_filename(&self) -> String {
        use sha2::{Digest, Sha256};

        let mut hasher = Sha256::new();
        hasher.update(self.method.as_bytes());
        hasher.update(b" ");
        hasher.update(self.url.as_str().as_bytes());
        format!("{:x}", hasher.finalize())
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.method, self.url)
    }
}

/// Metadata stored next to a cached response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheMetadata {
    /// When the response was cached, in unix seconds
    pub cached_at: u64,
    /// Body size in bytes
    pub size: u64,
    pub content_type: Option<String>,
    pub etag: Option<String>,
    pub last_modified: Option<String>,
}

impl CacheMetadata {
    pub fn for_response(response: &Response, cached_at: u64) -> Self {
        Self {
            cached_at,
            size: response.body.len() as u64,
            content_type: response.header("content-type").map(str::to_owned),
            etag: response.header("etag").map(str::to_owned),
            last_modified: response.header("last-modified").map(str::to_owned),
        }
    }

    /// Whether an entry with this metadata is older than `max_age` at `now`.
    pub fn is_expired(&self, now: u64, max_age: Option<Duration>) -> bool {
        match max_age {
            Some(max_age) => now.saturating_sub(self.cached_at) >= max_age.as_secs(),
            None => false,
        }
    }
}

/// A cached response with its metadata
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    pub response: Response,
    pub metadata: CacheMetadata,
}

/// Eviction bounds of a single partition.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PartitionLimits {
    /// Oldest-inserted entries beyond this count are evicted
    pub max_entries: Option<usize>,
    /// Entries older than this are evicted
    pub max_age_seconds: Option<u64>,
}

impl PartitionLimits {
    pub const UNBOUNDED: Self = Self {
        max_entries: None,
        max_age_seconds: None,
    };

    pub fn new(max_entries: usize, max_age: Duration) -> Self {
        Self {
            max_entries: Some(max_entries),
            max_age_seconds: Some(max_age.as_secs()),
        }
    }

    pub fn max_age(&self) -> Option<Duration> {
        self.max_age_seconds.map(Duration::from_secs)
    }
}

/// Result of a cache operation
pub type CacheResult<T> = std::result::Result<T, std::io::Error>;

/// Result of a cache lookup; expired entries are reported as absent
pub type CacheLookupResult = CacheResult<Option<CacheEntry>>;
