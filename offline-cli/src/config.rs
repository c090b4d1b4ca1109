use anyhow::{Context, Result};
use config::{Config, Environment, File};
use error_classifier::Messages;
use offline_cache::WorkerConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;

const ENV_PREFIX: &str = "OFFLINE_CACHE";

/// Configuration for the entire program
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Worker configuration: version, shell manifest, routes
    pub worker: WorkerConfig,

    /// User-facing error messages
    pub messages: Messages,
}

impl AppConfig {
    /// Load configuration: defaults, then the file, then the environment.
    ///
    /// Environment variables take the form `OFFLINE_CACHE_<SECTION>__<KEY>`,
    /// e.g. `OFFLINE_CACHE_WORKER__VERSION=v2`.
    pub fn load(config_path: Option<&Path>) -> Result<Self> {
        Self::load_with_env(config_path, Environment::with_prefix(ENV_PREFIX))
    }

    fn load_with_env(config_path: Option<&Path>, env: Environment) -> Result<Self> {
        let mut builder = Config::builder().add_source(Config::try_from(&AppConfig::default())?);

        if let Some(path) = config_path {
            builder = builder.add_source(File::from(path).required(true));
        }

        builder = builder.add_source(env.prefix_separator("_").separator("__").try_parsing(true));

        let config = builder.build().context("Failed to build configuration")?;
        let app: AppConfig = config
            .try_deserialize()
            .context("Failed to parse configuration")?;

        app.worker
            .validate()
            .context("Invalid worker configuration")?;
        Ok(app)
    }
}
