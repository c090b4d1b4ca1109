//! # Offline Cache
//!
//! A background cache controller for a single web origin. It pre-caches the
//! application shell on install, drops partitions of older versions on
//! activation and answers every intercepted request with the strategy its
//! route calls for:
//!
//! - API calls: network first, falling back to the last cached response
//! - Images: cache first, fetching and storing on a miss
//! - Everything else: any cached copy, else the network
//!
//! Storage, network and notification display are injected through the
//! [`CacheStorage`], [`Fetcher`] and [`Notifier`] traits so the controller can
//! run against an in-memory store in tests and a file store in production.

pub mod clock;
pub mod config;
pub mod error;
pub mod net;
pub mod notify;
pub mod router;
pub mod storage;
pub mod strategy;
pub mod types;
pub mod worker;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{
    NetworkConfig, NotificationConfig, RoutePattern, RouteRule, ShellConfig, Strategy, WorkerConfig,
};
pub use error::{CacheError, ConfigError, FetchError, NotifyError};
pub use net::{Fetcher, HttpFetcher, create_client};
pub use notify::{LogNotifier, Notification, Notifier, RecordingNotifier};
pub use router::{Route, Router};
pub use storage::{CacheStorage, FileStorage, MemoryStorage};
pub use strategy::{FetchOutcome, ResponseSource};
pub use types::{CacheEntry, CacheKey, CacheMetadata, PartitionLimits, Request, Response};
pub use worker::{ServiceWorker, WorkerState};
