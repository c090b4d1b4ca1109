//! # Worker Configuration
//!
//! Static configuration supplied at deploy time: the cache version, the shell
//! manifest, the ordered route table and the per-partition bounds.

use std::collections::HashMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::ConfigError;
use crate::router::Router;
use crate::types::PartitionLimits;

const DEFAULT_USER_AGENT: &str = concat!("offline-cache/", env!("CARGO_PKG_VERSION"));

/// How a matched request is answered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    /// Live fetch, cached copy only when the network fails
    NetworkFirst,
    /// Cached copy, live fetch only on a miss
    CacheFirst,
    /// Any cached copy, else a live fetch that is not stored
    CacheWithNetworkFallback,
}

/// Which request URLs a route applies to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum RoutePattern {
    /// The full URL starts with this prefix (an API host, for instance)
    UrlPrefix(String),
    /// The full URL matches this regular expression
    Regex(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteRule {
    pub name: String,
    pub pattern: RoutePattern,
    pub strategy: Strategy,
    /// Unversioned partition name
    pub cache_name: String,
    #[serde(default)]
    pub limits: PartitionLimits,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShellConfig {
    /// Unversioned partition name for the shell assets
    pub cache_name: String,
    /// Assets fetched on install, relative to the origin or absolute
    pub assets: Vec<String>,
}

impl Default for ShellConfig {
    fn default() -> Self {
        Self {
            cache_name: "app-shell".to_owned(),
            assets: vec![
                "/".to_owned(),
                "/index.html".to_owned(),
                "/src/main.jsx".to_owned(),
                "/icon.png".to_owned(),
            ],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NotificationConfig {
    pub title: String,
    pub icon: Option<String>,
    pub badge: Option<String>,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            title: "Barbershop".to_owned(),
            icon: Some("/icon.png".to_owned()),
            badge: None,
        }
    }
}

/// Options for the HTTP client used for live fetches.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    pub user_agent: String,
    /// Time allowed to establish a connection, zero disables it
    pub connect_timeout_secs: u64,
    /// Overall request timeout; unset means the transport decides
    pub timeout_secs: Option<u64>,
    pub follow_redirects: bool,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            user_agent: DEFAULT_USER_AGENT.to_owned(),
            connect_timeout_secs: 10,
            timeout_secs: None,
            follow_redirects: true,
        }
    }
}

impl NetworkConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerConfig {
    /// Cache version identifier; changes with every deployment
    pub version: String,
    /// Origin the shell assets are resolved against
    pub origin: Url,
    pub shell: ShellConfig,
    /// Ordered route table, first match wins
    pub routes: Vec<RouteRule>,
    pub notification: NotificationConfig,
    pub network: NetworkConfig,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            version: "v1".to_owned(),
            origin: Url::parse("http://localhost:5173/").expect("static origin is valid"),
            shell: ShellConfig::default(),
            routes: vec![
                RouteRule {
                    name: "api".to_owned(),
                    pattern: RoutePattern::UrlPrefix("https://api.example.com/".to_owned()),
                    strategy: Strategy::NetworkFirst,
                    cache_name: "api-cache".to_owned(),
                    limits: PartitionLimits::new(50, Duration::from_secs(5 * 60)),
                },
                RouteRule {
                    name: "images".to_owned(),
                    pattern: RoutePattern::Regex(
                        r"(?i)\.(?:png|jpe?g|svg|gif)(?:\?.*)?$".to_owned(),
                    ),
                    strategy: Strategy::CacheFirst,
                    cache_name: "image-cache".to_owned(),
                    limits: PartitionLimits::new(100, Duration::from_secs(30 * 24 * 60 * 60)),
                },
            ],
            notification: NotificationConfig::default(),
            network: NetworkConfig::default(),
        }
    }
}

impl WorkerConfig {
    /// Versioned partition name for an unversioned cache name.
    pub fn partition_name(&self, cache_name: &str) -> String {
        format!("{cache_name}-{}", self.version)
    }

    pub fn shell_partition(&self) -> String {
        self.partition_name(&self.shell.cache_name)
    }

    /// Every partition owned by this version, shell first.
    pub fn current_partitions(&self) -> Vec<String> {
        let mut names = vec![self.shell_partition()];
        for rule in &self.routes {
            let name = self.partition_name(&rule.cache_name);
            if !names.contains(&name) {
                names.push(name);
            }
        }
        names
    }

    /// Shell manifest resolved against the origin.
    pub fn shell_urls(&self) -> Result<Vec<Url>, ConfigError> {
        self.shell
            .assets
            .iter()
            .map(|asset| {
                self.origin
                    .join(asset)
                    .map_err(|source| ConfigError::InvalidAsset {
                        asset: asset.clone(),
                        source,
                    })
            })
            .collect()
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.version.trim().is_empty() {
            return Err(ConfigError::EmptyVersion);
        }

        self.shell_urls()?;
        Router::new(self)?;

        let mut limits: HashMap<&str, PartitionLimits> = HashMap::new();
        limits.insert(&self.shell.cache_name, PartitionLimits::UNBOUNDED);
        for rule in &self.routes {
            if rule.limits.max_entries == Some(0) {
                return Err(ConfigError::ZeroEntries(rule.name.clone()));
            }
            match limits.get(rule.cache_name.as_str()) {
                Some(existing)
                    if *existing != rule.limits || rule.cache_name == self.shell.cache_name =>
                {
                    return Err(ConfigError::ConflictingLimits(rule.cache_name.clone()));
                }
                _ => {
                    limits.insert(&rule.cache_name, rule.limits);
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = WorkerConfig::default();
        config.validate().unwrap();
        assert_eq!(
            config.current_partitions(),
            vec!["app-shell-v1", "api-cache-v1", "image-cache-v1"]
        );
    }

    #[test]
    fn test_shell_urls_resolve_against_origin() {
        let config = WorkerConfig {
            origin: Url::parse("https://barber.test/app/").unwrap(),
            shell: ShellConfig {
                cache_name: "shell".to_owned(),
                assets: vec!["/index.html".to_owned(), "main.js".to_owned()],
            },
            ..WorkerConfig::default()
        };
        let urls: Vec<String> = config
            .shell_urls()
            .unwrap()
            .into_iter()
            .map(String::from)
            .collect();
        assert_eq!(
            urls,
            vec!["https://barber.test/index.html", "https://barber.test/app/main.js"]
        );
    }

    #[test]
    fn test_partial_config_deserializes_with_defaults() {
        let config: WorkerConfig = serde_json::from_str(
            r#"{
                "version": "2024-06-01",
                "routes": [{
                    "name": "api",
                    "pattern": {"type": "url_prefix", "value": "https://api.barber.test/"},
                    "strategy": "network_first",
                    "cache_name": "api",
                    "limits": {"max_entries": 10}
                }]
            }"#,
        )
        .unwrap();

        assert_eq!(config.shell_partition(), "app-shell-2024-06-01");
        assert_eq!(config.routes.len(), 1);
        assert_eq!(config.routes[0].limits.max_entries, Some(10));
        assert_eq!(config.routes[0].limits.max_age_seconds, None);
        assert_eq!(config.network.timeout(), None);
    }

    #[test]
    fn test_validate_rejects_bad_config() {
        let empty_version = WorkerConfig {
            version: " ".to_owned(),
            ..WorkerConfig::default()
        };
        assert!(matches!(
            empty_version.validate(),
            Err(ConfigError::EmptyVersion)
        ));

        let mut bad_regex = WorkerConfig::default();
        bad_regex.routes[1].pattern = RoutePattern::Regex("(".to_owned());
        assert!(matches!(
            bad_regex.validate(),
            Err(ConfigError::InvalidPattern { .. })
        ));

        let mut zero = WorkerConfig::default();
        zero.routes[0].limits.max_entries = Some(0);
        assert!(matches!(zero.validate(), Err(ConfigError::ZeroEntries(_))));

        let mut conflict = WorkerConfig::default();
        conflict.routes[1].cache_name = "api-cache".to_owned();
        assert!(matches!(
            conflict.validate(),
            Err(ConfigError::ConflictingLimits(_))
        ));
    }
}
