//! # Service Worker
//!
//! The request handler and lifecycle driver of the offline cache. It closes
//! over the static [`WorkerConfig`] and the injected storage, network and
//! notification seams; per-request handling never mutates worker state.

use std::sync::Arc;

use futures::future::try_join_all;
use parking_lot::Mutex;
use reqwest::Method;
use tracing::{debug, info, warn};

use crate::config::{Strategy, WorkerConfig};
use crate::error::CacheError;
use crate::net::Fetcher;
use crate::notify::{LogNotifier, Notification, Notifier};
use crate::router::{Route, Router};
use crate::storage::CacheStorage;
use crate::strategy::{self, FetchOutcome};
use crate::types::{CacheKey, PartitionLimits, Request, Response};

/// Lifecycle of one worker version.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    /// Created, not yet installed
    Parsed,
    Installing,
    /// Shell cache fully populated
    Installed,
    Activating,
    /// Old versions cleaned up, serving requests
    Activated,
    /// Install failed; an earlier version keeps serving
    Redundant,
}

pub struct ServiceWorker {
    config: Arc<WorkerConfig>,
    router: Router,
    /// Keys of the install manifest, served from the shell partition first
    shell_keys: Vec<CacheKey>,
    storage: Arc<dyn CacheStorage>,
    fetcher: Arc<dyn Fetcher>,
    notifier: Arc<dyn Notifier>,
    state: Mutex<WorkerState>,
}

impl std::fmt::Debug for ServiceWorker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceWorker")
            .field("version", &self.config.version)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

impl ServiceWorker {
    /// Create a worker for `config`, rejecting invalid configuration.
    pub fn new(
        config: WorkerConfig,
        storage: Arc<dyn CacheStorage>,
        fetcher: Arc<dyn Fetcher>,
    ) -> Result<Self, CacheError> {
        config.validate()?;
        let router = Router::new(&config)?;
        let shell_keys = config.shell_urls()?.into_iter().map(CacheKey::get).collect();

        Ok(Self {
            config: Arc::new(config),
            router,
            shell_keys,
            storage,
            fetcher,
            notifier: Arc::new(LogNotifier),
            state: Mutex::new(WorkerState::Parsed),
        })
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = notifier;
        self
    }

    pub fn config(&self) -> &WorkerConfig {
        &self.config
    }

    pub fn state(&self) -> WorkerState {
        *self.state.lock()
    }

    fn set_state(&self, state: WorkerState) {
        *self.state.lock() = state;
        debug!(version = %self.config.version, ?state, "Worker state changed");
    }

    /// Move from one of `from` to `to`, or fail with the current state.
    fn transition(&self, from: &[WorkerState], to: WorkerState) -> Result<(), CacheError> {
        let mut state = self.state.lock();
        if !from.contains(&*state) {
            return Err(CacheError::InvalidState {
                expected: from[0],
                actual: *state,
            });
        }
        *state = to;
        Ok(())
    }

    /// Pre-cache the shell manifest into this version's shell partition.
    ///
    /// Either every asset is cached or the install fails and the worker becomes
    /// [`WorkerState::Redundant`]. A failed install leaves the shell partition as
    /// it was before: absent, or holding the entries of an earlier install.
    /// Returns the number of cached assets.
    pub async fn install(&self) -> Result<usize, CacheError> {
        self.transition(
            &[WorkerState::Parsed, WorkerState::Redundant],
            WorkerState::Installing,
        )?;

        match self.precache().await {
            Ok(count) => {
                self.set_state(WorkerState::Installed);
                info!(
                    version = %self.config.version,
                    partition = %self.config.shell_partition(),
                    assets = count,
                    "Worker installed"
                );
                Ok(count)
            }
            Err(e) => {
                self.set_state(WorkerState::Redundant);
                warn!(version = %self.config.version, error = %e, "Worker install failed");
                Err(e)
            }
        }
    }

    async fn precache(&self) -> Result<usize, CacheError> {
        let urls = self.config.shell_urls()?;

        let fetched = try_join_all(urls.into_iter().map(|url| async move {
            let request = Request::get(url);
            let response = self.fetcher.fetch(&request).await.map_err(|e| {
                CacheError::Install {
                    url: request.url.to_string(),
                    reason: e.to_string(),
                }
            })?;
            if !response.is_success() {
                return Err(CacheError::Install {
                    url: request.url.to_string(),
                    reason: format!("server responded with status {}", response.status),
                });
            }
            Ok::<_, CacheError>((request.cache_key(), response))
        }))
        .await?;

        let partition = self.config.shell_partition();
        let previous = if self.storage.names().await?.contains(&partition) {
            self.snapshot(&partition).await?
        } else {
            Vec::new()
        };

        if let Err(e) = self.populate(&partition, &fetched).await {
            self.rollback(&partition, &previous).await;
            return Err(e.into());
        }

        Ok(fetched.len())
    }

    /// Current contents of a partition, for restoring after a failed reinstall.
    async fn snapshot(&self, partition: &str) -> Result<Vec<(CacheKey, Response)>, CacheError> {
        let mut entries = Vec::new();
        for key in self.storage.keys(partition).await? {
            if let Some(entry) = self.storage.lookup(partition, &key).await? {
                entries.push((key, entry.response));
            }
        }
        Ok(entries)
    }

    /// Drop a partially populated shell partition and put back what it held before.
    async fn rollback(&self, partition: &str, previous: &[(CacheKey, Response)]) {
        if let Err(e) = self.storage.delete(partition).await {
            warn!(partition, error = %e, "Failed to remove partial shell cache");
            return;
        }
        if previous.is_empty() {
            return;
        }
        match self.populate(partition, previous).await {
            Ok(()) => debug!(partition, entries = previous.len(), "Restored shell cache"),
            Err(e) => warn!(partition, error = %e, "Failed to restore shell cache"),
        }
    }

    async fn populate(
        &self,
        partition: &str,
        assets: &[(CacheKey, Response)],
    ) -> Result<(), std::io::Error> {
        self.storage.open(partition, PartitionLimits::UNBOUNDED).await?;
        for (key, response) in assets {
            self.storage.put(partition, key.clone(), response.clone()).await?;
        }
        Ok(())
    }

    /// Delete every partition that does not belong to this version.
    ///
    /// Returns the names of the deleted partitions.
    pub async fn activate(&self) -> Result<Vec<String>, CacheError> {
        self.transition(&[WorkerState::Installed], WorkerState::Activating)?;

        let current = self.config.current_partitions();
        let names = match self.storage.names().await {
            Ok(names) => names,
            Err(e) => {
                self.set_state(WorkerState::Installed);
                return Err(e.into());
            }
        };

        let mut deleted = Vec::new();
        for name in names.into_iter().filter(|name| !current.contains(name)) {
            match self.storage.delete(&name).await {
                Ok(_) => {
                    info!(partition = %name, "Deleted outdated cache partition");
                    deleted.push(name);
                }
                Err(e) => warn!(
                    partition = %name,
                    error = %e,
                    "Failed to delete outdated cache partition"
                ),
            }
        }

        self.set_state(WorkerState::Activated);
        info!(
            version = %self.config.version,
            deleted = deleted.len(),
            "Worker activated"
        );
        Ok(deleted)
    }

    /// Answer one intercepted request according to its route.
    ///
    /// A [`WorkerState::Redundant`] worker controls nothing: its requests go
    /// straight to the network and never touch its version's partitions.
    pub async fn handle_fetch(&self, request: &Request) -> Result<FetchOutcome, CacheError> {
        let storage = self.storage.as_ref();
        let fetcher = self.fetcher.as_ref();

        if self.state() == WorkerState::Redundant {
            debug!(url = %request.url, "Redundant worker passing request through");
            return strategy::passthrough(fetcher, request).await;
        }

        if request.method != Method::GET {
            debug!(
                method = %request.method,
                url = %request.url,
                "Passing non-GET request through"
            );
            return strategy::passthrough(fetcher, request).await;
        }

        let key = request.cache_key();
        if self.shell_keys.contains(&key) {
            let partition = self.config.shell_partition();
            if let Some(entry) = strategy::lookup(storage, &partition, &key).await {
                return Ok(FetchOutcome::cache(entry));
            }
        }

        match self.router.route(&request.url) {
            Route::Matched {
                name,
                strategy: kind,
                partition,
                limits,
            } => {
                debug!(route = name, strategy = ?kind, url = %request.url, "Routing request");
                match kind {
                    Strategy::NetworkFirst => {
                        strategy::network_first(storage, fetcher, partition, limits, request).await
                    }
                    Strategy::CacheFirst => {
                        strategy::cache_first(storage, fetcher, partition, limits, request).await
                    }
                    Strategy::CacheWithNetworkFallback => {
                        strategy::cache_with_network_fallback(
                            storage,
                            fetcher,
                            Some(partition),
                            request,
                        )
                        .await
                    }
                }
            }
            Route::Default => {
                strategy::cache_with_network_fallback(storage, fetcher, None, request).await
            }
        }
    }

    /// Surface a push payload as a notification.
    ///
    /// Never fails: a malformed payload yields an empty body and display
    /// errors are logged. Returns the notification that was attempted.
    pub async fn handle_push(&self, payload: Option<&[u8]>) -> Notification {
        let notification = Notification::from_payload(&self.config.notification, payload);
        if let Err(e) = self.notifier.show(&notification).await {
            warn!(error = %e, "Failed to show push notification");
        }
        notification
    }
}
