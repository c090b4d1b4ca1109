//! # Cache Storage
//!
//! The persistent key-value store behind the worker: named partitions of
//! responses keyed by request identity.

use async_trait::async_trait;

use crate::types::{CacheKey, CacheLookupResult, CacheResult, PartitionLimits, Response};

/// A store of named cache partitions.
///
/// Every call is atomic on its own; callers never hold locks across calls.
/// Bounds recorded by [`open`](CacheStorage::open) are enforced on every
/// `put` and `lookup` of that partition: expired entries are dropped first,
/// then the oldest-inserted entries until the count bound holds.
#[async_trait]
pub trait CacheStorage: Send + Sync {
    /// Open a partition, creating it if absent, and record its bounds
    async fn open(&self, name: &str, limits: PartitionLimits) -> CacheResult<()>;

    /// Look up an entry in one partition; expired entries are reported as absent
    async fn lookup(&self, name: &str, key: &CacheKey) -> CacheLookupResult;

    /// Put a response into a partition, creating it unbounded if absent
    async fn put(&self, name: &str, key: CacheKey, response: Response) -> CacheResult<()>;

    /// Delete a partition and everything in it; returns whether it existed
    async fn delete(&self, name: &str) -> CacheResult<bool>;

    /// Partition names in creation order
    async fn names(&self) -> CacheResult<Vec<String>>;

    /// Keys of a partition, oldest first
    async fn keys(&self, name: &str) -> CacheResult<Vec<CacheKey>>;

    /// Look up an entry in every partition, in creation order
    async fn match_any(&self, key: &CacheKey) -> CacheLookupResult {
        for name in self.names().await? {
            if let Some(entry) = self.lookup(&name, key).await? {
                return Ok(Some(entry));
            }
        }
        Ok(None)
    }
}
