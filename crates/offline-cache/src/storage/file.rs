//! # File Storage
//!
//! A persistent [`CacheStorage`] on disk. Each partition is a directory
//! holding a `partition.json` descriptor plus one `<hash>.bin` body and one
//! `<hash>.meta` JSON descriptor per entry. Writes go through a temporary file
//! and a rename. A storage-wide lock makes every call atomic: calls that may
//! remove files (including `lookup`, which evicts) hold it exclusively.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tokio::fs;
use tokio::io;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::clock::{Clock, SystemClock};
use crate::storage::CacheStorage;
use crate::types::{
    CacheEntry, CacheKey, CacheLookupResult, CacheMetadata, CacheResult, PartitionLimits, Response,
};

const DESCRIPTOR: &str = "partition.json";

#[derive(Debug, Clone, Serialize, Deserialize)]
struct PartitionDescriptor {
    name: String,
    limits: PartitionLimits,
    /// Creation time in microseconds, orders partitions
    created: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredMeta {
    key: CacheKey,
    /// Insertion order within the partition
    seq: u64,
    status: u16,
    headers: Vec<(String, String)>,
    metadata: CacheMetadata,
}

#[derive(Debug, Clone)]
pub struct FileStorage {
    root: PathBuf,
    clock: Arc<dyn Clock>,
    lock: Arc<RwLock<()>>,
}

impl FileStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self::with_clock(root, Arc::new(SystemClock))
    }

    pub fn with_clock(root: impl Into<PathBuf>, clock: Arc<dyn Clock>) -> Self {
        Self {
            root: root.into(),
            clock,
            lock: Arc::new(RwLock::new(())),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn partition_dir(&self, name: &str) -> PathBuf {
        let mut hasher = Sha256::new();
        hasher.update(name.as_bytes());
        self.root.join(format!("{:x}", hasher.finalize()))
    }

    async fn read_descriptor(&self, name: &str) -> CacheResult<Option<PartitionDescriptor>> {
        read_descriptor_at(&self.partition_dir(name)).await
    }

    /// Create or update a partition descriptor. Caller holds the write lock.
    async fn write_descriptor(&self, name: &str, limits: PartitionLimits) -> CacheResult<()> {
        let dir = self.partition_dir(name);
        let created = match read_descriptor_at(&dir).await? {
            Some(existing) => existing.created,
            None => {
                fs::create_dir_all(&dir).await?;
                debug!(partition = name, path = ?dir, "Created file cache partition");
                now_micros()
            }
        };

        let descriptor = PartitionDescriptor {
            name: name.to_owned(),
            limits,
            created,
        };
        write_atomic(&dir.join(DESCRIPTOR), &serde_json::to_vec(&descriptor)?).await
    }

    /// Drop expired entries, then the oldest ones beyond the count bound.
    async fn evict(&self, dir: &Path, limits: PartitionLimits) -> CacheResult<usize> {
        let now = self.clock.now();
        let max_age = limits.max_age();
        let mut entries = read_entries(dir).await?;
        let mut evicted = 0;

        let (expired, live): (Vec<_>, Vec<_>) = entries
            .drain(..)
            .partition(|meta| meta.metadata.is_expired(now, max_age));
        for meta in expired {
            remove_entry(dir, &meta.key).await;
            evicted += 1;
        }

        if let Some(max_entries) = limits.max_entries {
            let excess = live.len().saturating_sub(max_entries);
            // `read_entries` returns oldest first.
            for meta in live.iter().take(excess) {
                remove_entry(dir, &meta.key).await;
                evicted += 1;
            }
        }

        Ok(evicted)
    }
}

#[async_trait]
impl CacheStorage for FileStorage {
    async fn open(&self, name: &str, limits: PartitionLimits) -> CacheResult<()> {
        let _guard = self.lock.write().await;
        self.write_descriptor(name, limits).await
    }

    async fn lookup(&self, name: &str, key: &CacheKey) -> CacheLookupResult {
        let _guard = self.lock.write().await;
        let Some(descriptor) = self.read_descriptor(name).await? else {
            return Ok(None);
        };
        let dir = self.partition_dir(name);

        let evicted = self.evict(&dir, descriptor.limits).await?;
        if evicted > 0 {
            debug!(partition = name, evicted, "Evicted stale entries on lookup");
        }

        let file = key.to_filename();
        let meta_path = dir.join(format!("{file}.meta"));

        let meta_bytes = match fs::read(&meta_path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e),
        };

        let meta: StoredMeta = match serde_json::from_slice(&meta_bytes) {
            Ok(meta) => meta,
            Err(e) => {
                warn!(
                    path = ?meta_path,
                    error = %e,
                    "Failed to parse cache metadata, dropping entry"
                );
                remove_entry(&dir, key).await;
                return Ok(None);
            }
        };

        let body = match fs::read(dir.join(format!("{file}.bin"))).await {
            Ok(body) => Bytes::from(body),
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e),
        };

        Ok(Some(CacheEntry {
            response: Response {
                status: meta.status,
                headers: meta.headers,
                body,
            },
            metadata: meta.metadata,
        }))
    }

    async fn put(&self, name: &str, key: CacheKey, response: Response) -> CacheResult<()> {
        let _guard = self.lock.write().await;

        let limits = match self.read_descriptor(name).await? {
            Some(descriptor) => descriptor.limits,
            None => {
                self.write_descriptor(name, PartitionLimits::UNBOUNDED).await?;
                PartitionLimits::UNBOUNDED
            }
        };

        let dir = self.partition_dir(name);
        let seq = read_entries(&dir)
            .await?
            .iter()
            .filter(|meta| meta.key != key)
            .map(|meta| meta.seq + 1)
            .max()
            .unwrap_or(0);

        let file = key.to_filename();
        let meta = StoredMeta {
            metadata: CacheMetadata::for_response(&response, self.clock.now()),
            key,
            seq,
            status: response.status,
            headers: response.headers,
        };

        write_atomic(&dir.join(format!("{file}.bin")), &response.body).await?;
        write_atomic(&dir.join(format!("{file}.meta")), &serde_json::to_vec(&meta)?).await?;

        let evicted = self.evict(&dir, limits).await?;
        if evicted > 0 {
            debug!(partition = name, evicted, "Evicted entries after put");
        }
        Ok(())
    }

    async fn delete(&self, name: &str) -> CacheResult<bool> {
        let _guard = self.lock.write().await;
        match fs::remove_dir_all(self.partition_dir(name)).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e),
        }
    }

    async fn names(&self) -> CacheResult<Vec<String>> {
        let _guard = self.lock.read().await;
        let mut dir = match fs::read_dir(&self.root).await {
            Ok(dir) => dir,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e),
        };

        let mut descriptors = Vec::new();
        while let Some(entry) = dir.next_entry().await? {
            if let Some(descriptor) = read_descriptor_at(&entry.path()).await? {
                descriptors.push(descriptor);
            }
        }
        descriptors.sort_by_key(|d| d.created);
        Ok(descriptors.into_iter().map(|d| d.name).collect())
    }

    async fn keys(&self, name: &str) -> CacheResult<Vec<CacheKey>> {
        let _guard = self.lock.read().await;
        Ok(read_entries(&self.partition_dir(name))
            .await?
            .into_iter()
            .map(|meta| meta.key)
            .collect())
    }
}

async fn read_descriptor_at(dir: &Path) -> CacheResult<Option<PartitionDescriptor>> {
    let path = dir.join(DESCRIPTOR);
    let bytes = match fs::read(&path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e),
    };

    match serde_json::from_slice(&bytes) {
        Ok(descriptor) => Ok(Some(descriptor)),
        Err(e) => {
            warn!(path = ?path, error = %e, "Ignoring unreadable partition descriptor");
            Ok(None)
        }
    }
}

/// All readable entry descriptors of a partition, oldest first.
async fn read_entries(dir: &Path) -> CacheResult<Vec<StoredMeta>> {
    let mut read_dir = match fs::read_dir(dir).await {
        Ok(read_dir) => read_dir,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e),
    };

    let mut entries = Vec::new();
    while let Some(entry) = read_dir.next_entry().await? {
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) != Some("meta") {
            continue;
        }
        let Ok(bytes) = fs::read(&path).await else {
            continue;
        };
        match serde_json::from_slice::<StoredMeta>(&bytes) {
            Ok(meta) => entries.push(meta),
            Err(e) => warn!(path = ?path, error = %e, "Skipping unreadable cache metadata"),
        }
    }

    entries.sort_by_key(|meta| meta.seq);
    Ok(entries)
}

async fn remove_entry(dir: &Path, key: &CacheKey) {
    let file = key.to_filename();
    for ext in ["meta", "bin"] {
        let path = dir.join(format!("{file}.{ext}"));
        match fs::remove_file(&path).await {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => warn!(path = ?path, error = %e, "Failed to remove cache file"),
        }
    }
}

async fn write_atomic(path: &Path, data: &[u8]) -> CacheResult<()> {
    let tmp = path.with_extension("tmp");
    fs::write(&tmp, data).await?;
    fs::rename(&tmp, path).await
}

fn now_micros() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_micros() as u64
}
