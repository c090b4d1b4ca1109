//! # Memory Storage
//!
//! An in-memory [`CacheStorage`] with explicit count and age bounds per
//! partition. Eviction is deterministic: it runs on every `put` and `lookup`
//! of a partition against the injected [`Clock`].

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tracing::debug;

use crate::clock::{Clock, SystemClock};
use crate::storage::CacheStorage;
use crate::types::{
    CacheEntry, CacheKey, CacheLookupResult, CacheMetadata, CacheResult, PartitionLimits, Response,
};

#[derive(Debug, Clone)]
struct Slot {
    /// Insertion order within the partition
    seq: u64,
    entry: CacheEntry,
}

#[derive(Debug, Default)]
struct Partition {
    limits: PartitionLimits,
    entries: HashMap<CacheKey, Slot>,
    next_seq: u64,
}

impl Partition {
    fn new(limits: PartitionLimits) -> Self {
        Self {
            limits,
            ..Self::default()
        }
    }

    fn insert(&mut self, key: CacheKey, entry: CacheEntry) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.entries.insert(key, Slot { seq, entry });
    }

    /// Drop expired entries, then the oldest ones beyond the count bound.
    fn evict(&mut self, now: u64) -> usize {
        let before = self.entries.len();
        let max_age = self.limits.max_age();
        self.entries
            .retain(|_, slot| !slot.entry.metadata.is_expired(now, max_age));

        if let Some(max_entries) = self.limits.max_entries {
            while self.entries.len() > max_entries {
                let Some(oldest) = self
                    .entries
                    .iter()
                    .min_by_key(|(_, slot)| slot.seq)
                    .map(|(key, _)| key.clone())
                else {
                    break;
                };
                self.entries.remove(&oldest);
            }
        }

        before - self.entries.len()
    }
}

/// In-memory cache storage
#[derive(Debug, Clone)]
pub struct MemoryStorage {
    /// Partitions in creation order
    partitions: Arc<Mutex<Vec<(String, Partition)>>>,
    clock: Arc<dyn Clock>,
}

impl Default for MemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            partitions: Arc::new(Mutex::new(Vec::new())),
            clock,
        }
    }

    /// Number of live entries in a partition, without running eviction
    pub fn len(&self, name: &str) -> usize {
        self.partitions
            .lock()
            .iter()
            .find(|(n, _)| n == name)
            .map_or(0, |(_, p)| p.entries.len())
    }
}

fn find<'a>(partitions: &'a mut [(String, Partition)], name: &str) -> Option<&'a mut Partition> {
    partitions
        .iter_mut()
        .find(|(n, _)| n == name)
        .map(|(_, p)| p)
}

#[async_trait]
impl CacheStorage for MemoryStorage {
    async fn open(&self, name: &str, limits: PartitionLimits) -> CacheResult<()> {
        let mut partitions = self.partitions.lock();
        match find(&mut partitions, name) {
            Some(partition) => partition.limits = limits,
            None => {
                debug!(partition = name, ?limits, "Created memory cache partition");
                partitions.push((name.to_owned(), Partition::new(limits)));
            }
        }
        Ok(())
    }

    async fn lookup(&self, name: &str, key: &CacheKey) -> CacheLookupResult {
        let now = self.clock.now();
        let mut partitions = self.partitions.lock();
        let Some(partition) = find(&mut partitions, name) else {
            return Ok(None);
        };

        let evicted = partition.evict(now);
        if evicted > 0 {
            debug!(partition = name, evicted, "Evicted stale entries on lookup");
        }

        Ok(partition.entries.get(key).map(|slot| slot.entry.clone()))
    }

    async fn put(&self, name: &str, key: CacheKey, response: Response) -> CacheResult<()> {
        let now = self.clock.now();
        let metadata = CacheMetadata::for_response(&response, now);
        let mut partitions = self.partitions.lock();

        if find(&mut partitions, name).is_none() {
            partitions.push((name.to_owned(), Partition::new(PartitionLimits::UNBOUNDED)));
        }
        let Some(partition) = find(&mut partitions, name) else {
            return Ok(());
        };

        partition.insert(key, CacheEntry { response, metadata });
        let evicted = partition.evict(now);
        if evicted > 0 {
            debug!(partition = name, evicted, "Evicted entries after put");
        }
        Ok(())
    }

    async fn delete(&self, name: &str) -> CacheResult<bool> {
        let mut partitions = self.partitions.lock();
        let before = partitions.len();
        partitions.retain(|(n, _)| n != name);
        Ok(partitions.len() != before)
    }

    async fn names(&self) -> CacheResult<Vec<String>> {
        Ok(self
            .partitions
            .lock()
            .iter()
            .map(|(name, _)| name.clone())
            .collect())
    }

    async fn keys(&self, name: &str) -> CacheResult<Vec<CacheKey>> {
        let partitions = self.partitions.lock();
        let Some((_, partition)) = partitions.iter().find(|(n, _)| n == name) else {
            return Ok(Vec::new());
        };

        let mut slots: Vec<_> = partition.entries.iter().collect();
        slots.sort_by_key(|(_, slot)| slot.seq);
        Ok(slots.into_iter().map(|(key, _)| key.clone()).collect())
    }
}
