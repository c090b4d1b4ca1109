#![allow(dead_code)]

use std::collections::HashMap;
use std::io;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use offline_cache::{
    CacheKey, CacheStorage, FetchError, Fetcher, MemoryStorage, PartitionLimits, Request, Response,
};
use offline_cache::types::{CacheLookupResult, CacheResult};
use parking_lot::Mutex;
use url::Url;

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_test_writer()
        .try_init();
}

pub fn url(s: &str) -> Url {
    Url::parse(s).unwrap()
}

/// A network double: canned responses per URL, switchable offline.
#[derive(Debug, Default)]
pub struct MockFetcher {
    responses: Mutex<HashMap<String, Response>>,
    offline: AtomicBool,
    calls: Mutex<Vec<String>>,
}

impl MockFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn serve(&self, url: &str, response: Response) {
        self.responses.lock().insert(url.to_owned(), response);
    }

    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }
}

#[async_trait]
impl Fetcher for MockFetcher {
    async fn fetch(&self, request: &Request) -> Result<Response, FetchError> {
        self.calls.lock().push(request.url.to_string());
        if self.offline.load(Ordering::SeqCst) {
            return Err(FetchError::Offline);
        }
        Ok(self
            .responses
            .lock()
            .get(request.url.as_str())
            .cloned()
            .unwrap_or_else(|| Response::new(404, "not found")))
    }
}

/// A storage whose every call fails.
#[derive(Debug, Default)]
pub struct BrokenStorage;

fn broken() -> io::Error {
    io::Error::other("storage unavailable")
}

#[async_trait]
impl CacheStorage for BrokenStorage {
    async fn open(&self, _name: &str, _limits: PartitionLimits) -> CacheResult<()> {
        Err(broken())
    }

    async fn lookup(&self, _name: &str, _key: &CacheKey) -> CacheLookupResult {
        Err(broken())
    }

    async fn put(&self, _name: &str, _key: CacheKey, _response: Response) -> CacheResult<()> {
        Err(broken())
    }

    async fn delete(&self, _name: &str) -> CacheResult<bool> {
        Err(broken())
    }

    async fn names(&self) -> CacheResult<Vec<String>> {
        Err(broken())
    }

    async fn keys(&self, _name: &str) -> CacheResult<Vec<CacheKey>> {
        Err(broken())
    }
}

/// A memory storage that fails exactly one `put`, counted from when it is armed.
#[derive(Debug, Default)]
pub struct FlakyStorage {
    pub inner: MemoryStorage,
    puts: AtomicUsize,
    fail_at: AtomicUsize,
}

impl FlakyStorage {
    pub fn new(inner: MemoryStorage) -> Self {
        Self {
            inner,
            ..Self::default()
        }
    }

    /// Fail the `nth` put from now on (1-based).
    pub fn fail_put(&self, nth: usize) {
        self.puts.store(0, Ordering::SeqCst);
        self.fail_at.store(nth, Ordering::SeqCst);
    }
}

#[async_trait]
impl CacheStorage for FlakyStorage {
    async fn open(&self, name: &str, limits: PartitionLimits) -> CacheResult<()> {
        self.inner.open(name, limits).await
    }

    async fn lookup(&self, name: &str, key: &CacheKey) -> CacheLookupResult {
        self.inner.lookup(name, key).await
    }

    async fn put(&self, name: &str, key: CacheKey, response: Response) -> CacheResult<()> {
        let count = self.puts.fetch_add(1, Ordering::SeqCst) + 1;
        if count == self.fail_at.load(Ordering::SeqCst) {
            return Err(io::Error::other("disk full"));
        }
        self.inner.put(name, key, response).await
    }

    async fn delete(&self, name: &str) -> CacheResult<bool> {
        self.inner.delete(name).await
    }

    async fn names(&self) -> CacheResult<Vec<String>> {
        self.inner.names().await
    }

    async fn keys(&self, name: &str) -> CacheResult<Vec<CacheKey>> {
        self.inner.keys(name).await
    }
}
