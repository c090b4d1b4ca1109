use thiserror::Error;

use crate::worker::WorkerState;

/// Failure to obtain a response from the network.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("HTTP error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("network unavailable")]
    Offline,

    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

/// Static configuration that cannot be used as given.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cache version must not be empty")]
    EmptyVersion,

    #[error("invalid pattern for route '{route}': {source}")]
    InvalidPattern {
        route: String,
        #[source]
        source: regex::Error,
    },

    #[error("route '{0}' sets max_entries to zero")]
    ZeroEntries(String),

    #[error("cache '{0}' is configured with conflicting limits")]
    ConflictingLimits(String),

    #[error("invalid shell asset '{asset}': {source}")]
    InvalidAsset {
        asset: String,
        #[source]
        source: url::ParseError,
    },
}

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache storage error: {0}")]
    Storage(#[from] std::io::Error),

    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error("install failed for {url}: {reason}")]
    Install { url: String, reason: String },

    #[error("worker is {actual:?}, expected {expected:?}")]
    InvalidState {
        expected: WorkerState,
        actual: WorkerState,
    },

    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
}

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("notification could not be displayed: {0}")]
    Display(String),
}
