//! # Route Matching
//!
//! Picks a caching strategy and partition for each intercepted request by
//! testing its URL against the configured rules in order.

use regex::Regex;
use url::Url;

use crate::config::{RoutePattern, Strategy, WorkerConfig};
use crate::error::ConfigError;
use crate::types::PartitionLimits;

#[derive(Debug, Clone)]
enum Matcher {
    Prefix(String),
    Regex(Regex),
}

impl Matcher {
    fn matches(&self, url: &Url) -> bool {
        match self {
            Self::Prefix(prefix) => url.as_str().starts_with(prefix.as_str()),
            Self::Regex(re) => re.is_match(url.as_str()),
        }
    }
}

#[derive(Debug, Clone)]
struct CompiledRoute {
    name: String,
    matcher: Matcher,
    strategy: Strategy,
    partition: String,
    limits: PartitionLimits,
}

/// Outcome of routing a single URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route<'a> {
    Matched {
        name: &'a str,
        strategy: Strategy,
        /// Versioned partition name
        partition: &'a str,
        limits: PartitionLimits,
    },
    /// No rule matched; serve any cached copy, else the network
    Default,
}

impl Route<'_> {
    pub fn strategy(&self) -> Strategy {
        match self {
            Self::Matched { strategy, .. } => *strategy,
            Self::Default => Strategy::CacheWithNetworkFallback,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Router {
    routes: Vec<CompiledRoute>,
}

impl Router {
    pub fn new(config: &WorkerConfig) -> Result<Self, ConfigError> {
        let routes = config
            .routes
            .iter()
            .map(|rule| -> Result<CompiledRoute, ConfigError> {
                let matcher = match &rule.pattern {
                    RoutePattern::UrlPrefix(prefix) => Matcher::Prefix(prefix.clone()),
                    RoutePattern::Regex(pattern) => {
                        Matcher::Regex(Regex::new(pattern).map_err(|source| {
                            ConfigError::InvalidPattern {
                                route: rule.name.clone(),
                                source,
                            }
                        })?)
                    }
                };
                Ok(CompiledRoute {
                    name: rule.name.clone(),
                    matcher,
                    strategy: rule.strategy,
                    partition: config.partition_name(&rule.cache_name),
                    limits: rule.limits,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self { routes })
    }

    pub fn route(&self, url: &Url) -> Route<'_> {
        self.routes
            .iter()
            .find(|route| route.matcher.matches(url))
            .map_or(Route::Default, |route| Route::Matched {
                name: &route.name,
                strategy: route.strategy,
                partition: &route.partition,
                limits: route.limits,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn router() -> Router {
        let config = WorkerConfig {
            version: "v7".to_owned(),
            ..WorkerConfig::default()
        };
        Router::new(&config).unwrap()
    }

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    #[test]
    fn test_api_prefix_is_network_first() {
        let router = router();
        let route = router.route(&url("https://api.example.com/bookings?day=3"));
        assert_eq!(route.strategy(), Strategy::NetworkFirst);
        assert!(matches!(
            route,
            Route::Matched {
                partition: "api-cache-v7",
                ..
            }
        ));
    }

    #[test]
    fn test_image_extensions_are_cache_first() {
        let router = router();
        for image in [
            "http://localhost:5173/img/hero.png",
            "http://localhost:5173/img/hero.JPG",
            "http://localhost:5173/img/chair.jpeg?v=2",
            "http://localhost:5173/logo.svg",
            "https://cdn.test/spinner.gif",
        ] {
            let route = router.route(&url(image));
            assert_eq!(route.strategy(), Strategy::CacheFirst, "{image}");
        }
    }

    #[test]
    fn test_first_match_wins() {
        let router = router();
        let route = router.route(&url("https://api.example.com/avatars/42.png"));
        assert_eq!(route.strategy(), Strategy::NetworkFirst);
    }

    #[test]
    fn test_unmatched_is_default() {
        let router = router();
        assert_eq!(
            router.route(&url("http://localhost:5173/index.html")),
            Route::Default
        );
        assert_eq!(
            router.route(&url("http://localhost:5173/png/readme.txt")),
            Route::Default
        );
    }
}
