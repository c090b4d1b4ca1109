//! # Caching Strategies
//!
//! Each strategy makes a single attempt at every storage call. Storage
//! failures are logged and treated as a miss (reads) or skipped (writes);
//! only a network failure with no cached fallback reaches the caller.

use tracing::{debug, warn};

use crate::error::CacheError;
use crate::net::Fetcher;
use crate::storage::CacheStorage;
use crate::types::{CacheEntry, CacheKey, PartitionLimits, Request, Response};

/// Where a response handed back to the page came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseSource {
    Network,
    Cache,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchOutcome {
    pub response: Response,
    pub source: ResponseSource,
}

impl FetchOutcome {
    fn network(response: Response) -> Self {
        Self {
            response,
            source: ResponseSource::Network,
        }
    }

    pub(crate) fn cache(entry: CacheEntry) -> Self {
        Self {
            response: entry.response,
            source: ResponseSource::Cache,
        }
    }
}

/// Live fetch first; on success store and return it, on failure fall back to
/// the cached copy of this exact request.
pub async fn network_first(
    storage: &dyn CacheStorage,
    fetcher: &dyn Fetcher,
    partition: &str,
    limits: PartitionLimits,
    request: &Request,
) -> Result<FetchOutcome, CacheError> {
    let key = request.cache_key();

    match fetcher.fetch(request).await {
        Ok(response) => {
            store(storage, partition, limits, key, &response).await;
            Ok(FetchOutcome::network(response))
        }
        Err(err) => {
            debug!(url = %request.url, error = %err, "Network failed, trying cache");
            match lookup(storage, partition, &key).await {
                Some(entry) => Ok(FetchOutcome::cache(entry)),
                None => Err(err.into()),
            }
        }
    }
}

/// Cached copy first; on a miss fetch, store and return.
pub async fn cache_first(
    storage: &dyn CacheStorage,
    fetcher: &dyn Fetcher,
    partition: &str,
    limits: PartitionLimits,
    request: &Request,
) -> Result<FetchOutcome, CacheError> {
    let key = request.cache_key();

    if let Some(entry) = lookup(storage, partition, &key).await {
        return Ok(FetchOutcome::cache(entry));
    }

    let response = fetcher.fetch(request).await?;
    store(storage, partition, limits, key, &response).await;
    Ok(FetchOutcome::network(response))
}

/// Any cached copy (in `partition`, or in every partition when `None`),
/// else a live fetch that is not stored.
pub async fn cache_with_network_fallback(
    storage: &dyn CacheStorage,
    fetcher: &dyn Fetcher,
    partition: Option<&str>,
    request: &Request,
) -> Result<FetchOutcome, CacheError> {
    let key = request.cache_key();

    let cached = match partition {
        Some(partition) => lookup(storage, partition, &key).await,
        None => match storage.match_any(&key).await {
            Ok(entry) => entry,
            Err(e) => {
                warn!(key = %key, error = %e, "Cache match failed, falling back to network");
                None
            }
        },
    };

    if let Some(entry) = cached {
        debug!(key = %key, "Serving from cache");
        return Ok(FetchOutcome::cache(entry));
    }

    passthrough(fetcher, request).await
}

/// Straight to the network, no cache involvement.
pub async fn passthrough(
    fetcher: &dyn Fetcher,
    request: &Request,
) -> Result<FetchOutcome, CacheError> {
    Ok(FetchOutcome::network(fetcher.fetch(request).await?))
}

/// Single lookup attempt; storage failures count as a miss.
pub(crate) async fn lookup(
    storage: &dyn CacheStorage,
    partition: &str,
    key: &CacheKey,
) -> Option<CacheEntry> {
    match storage.lookup(partition, key).await {
        Ok(Some(entry)) => {
            debug!(partition, key = %key, "Cache hit");
            Some(entry)
        }
        Ok(None) => {
            debug!(partition, key = %key, "Cache miss");
            None
        }
        Err(e) => {
            warn!(partition, key = %key, error = %e, "Cache lookup failed");
            None
        }
    }
}

async fn store(
    storage: &dyn CacheStorage,
    partition: &str,
    limits: PartitionLimits,
    key: CacheKey,
    response: &Response,
) {
    if !response.is_cacheable() {
        debug!(partition, key = %key, status = response.status, "Not caching response");
        return;
    }

    let result = match storage.open(partition, limits).await {
        Ok(()) => storage.put(partition, key.clone(), response.clone()).await,
        Err(e) => Err(e),
    };

    if let Err(e) = result {
        warn!(partition, key = %key, error = %e, "Failed to store response in cache");
    }
}
