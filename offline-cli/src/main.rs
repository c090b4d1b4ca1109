use std::process::exit;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use error_classifier::{Failure, Messages, classify_with};
use offline_cache::{
    CacheError, CacheStorage, FetchError, FileStorage, HttpFetcher, MemoryStorage, Request,
    ServiceWorker,
};
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, FmtSubscriber};
use url::Url;

mod cli;
mod config;

use cli::{CliArgs, Command};
use config::AppConfig;

#[tokio::main]
async fn main() {
    let args = CliArgs::parse();

    // Setup logging
    let default_level = if args.verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let subscriber = FmtSubscriber::builder().with_env_filter(filter).finish();
    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {e}");
    }

    if let Err(e) = run(args).await {
        error!("{e:#}");
        exit(1);
    }
}

async fn run(args: CliArgs) -> Result<()> {
    let app = AppConfig::load(args.config.as_deref())?;

    let storage: Arc<dyn CacheStorage> = match &args.cache_dir {
        Some(dir) => {
            info!(path = %dir.display(), "Using file cache storage");
            Arc::new(FileStorage::new(dir))
        }
        None => Arc::new(MemoryStorage::new()),
    };
    let fetcher = Arc::new(
        HttpFetcher::new(&app.worker.network).context("Failed to create HTTP client")?,
    );
    let worker = ServiceWorker::new(app.worker.clone(), storage.clone(), fetcher)?;

    match args.command {
        Command::Install => {
            let assets = worker.install().await?;
            let deleted = worker.activate().await?;
            println!(
                "installed {} ({} assets), removed {} outdated partition(s)",
                worker.config().version,
                assets,
                deleted.len()
            );
        }
        Command::Fetch { urls } => {
            for raw in urls {
                let url = Url::parse(&raw).with_context(|| format!("Invalid URL: {raw}"))?;
                fetch_one(&worker, &app.messages, url).await;
            }
        }
        Command::Push { payload } => {
            let notification = worker.handle_push(Some(payload.as_bytes())).await;
            println!("{}: {}", notification.title, notification.body);
        }
        Command::Status => {
            for name in storage.names().await? {
                let count = storage.keys(&name).await?.len();
                println!("{name}\t{count}");
            }
        }
    }

    Ok(())
}

async fn fetch_one(worker: &ServiceWorker, messages: &Messages, url: Url) {
    match worker.handle_fetch(&Request::get(url.clone())).await {
        Ok(outcome) if outcome.response.is_success() => {
            println!(
                "{url}\t{}\t{:?}\t{} bytes",
                outcome.response.status,
                outcome.source,
                outcome.response.body.len()
            );
        }
        Ok(outcome) => {
            let failure = Failure::response(outcome.response.status, &outcome.response.body);
            println!(
                "{url}\t{}\t{:?}\t{}",
                outcome.response.status,
                outcome.source,
                classify_with(&failure, messages)
            );
        }
        Err(e) => {
            let failure = match &e {
                CacheError::Fetch(FetchError::Network(err)) => Failure::from_reqwest(err),
                CacheError::Fetch(FetchError::Offline) => Failure::NoResponse,
                other => Failure::setup(other.to_string()),
            };
            error!(url = %url, error = %e, "Request failed");
            println!("{url}\terror\t{}", classify_with(&failure, messages));
        }
    }
}
