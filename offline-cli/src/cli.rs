use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Define CLI arguments
#[derive(Parser, Debug)]
#[command(
    version,
    about = "Offline cache controller for the booking web app",
    long_about = "Runs the offline cache worker outside the browser.\n\
                  \n\
                  Installs and activates a cache version from a static configuration,\n\
                  replays requests through the configured caching strategies and\n\
                  surfaces push payloads as notifications."
)]
pub struct CliArgs {
    /// Configuration file (TOML)
    #[arg(short, long, help = "Path to the configuration file")]
    pub config: Option<PathBuf>,

    /// Persist cache partitions in this directory instead of memory
    #[arg(long, help = "Directory for persistent cache partitions")]
    pub cache_dir: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, help = "Enable detailed debug logging")]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Pre-cache the shell manifest and delete outdated partitions
    Install,

    /// Request URLs through the worker
    Fetch {
        #[arg(required = true)]
        urls: Vec<String>,
    },

    /// Show a push payload as a notification
    Push { payload: String },

    /// List cache partitions and their entry counts
    Status,
}
