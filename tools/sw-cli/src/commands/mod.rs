//! CLI command implementations.

pub mod check;
pub mod config;
pub mod simulate;

use clap::{Args, Subcommand};

/// Arguments for the config command.
#[derive(Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Subcommand)]
pub enum ConfigCommand {
    /// Show current configuration.
    Show,
    /// Get a config value.
    Get {
        /// Config key (dot-separated).
        key: String,
    },
    /// Set a config value.
    Set {
        /// Config key (dot-separated).
        key: String,
        /// Value to set.
        value: String,
    },
    /// Initialize a new config file.
    Init {
        /// Force overwrite existing config.
        #[arg(short, long)]
        force: bool,
    },
    /// Validate the config file.
    Validate,
}

/// Arguments for the check command.
#[derive(Args)]
pub struct CheckArgs {
    #[command(subcommand)]
    pub command: CheckCommand,
}

#[derive(Subcommand)]
pub enum CheckCommand {
    /// Show whether a request URL is cached and where.
    Url {
        /// Absolute URL, or a path joined onto the environment's API URL.
        url: String,

        /// Request method.
        #[arg(short, long, default_value = "GET")]
        method: String,
    },
    /// Show whether an origin may activate a waiting worker.
    Origin {
        /// Origin of the sending page.
        origin: String,
    },
}

/// Arguments for the simulate command.
#[derive(Args)]
pub struct SimulateArgs {
    /// Request path or URL to fetch.
    #[arg(short, long, default_value = "/api/model.json")]
    pub path: String,

    /// Number of requests to make.
    #[arg(short, long, default_value = "4")]
    pub requests: usize,

    /// Minutes between requests.
    #[arg(short, long, default_value = "45")]
    pub interval: u64,

    /// Deploy the next version after the requests and reload the page.
    #[arg(long)]
    pub upgrade: bool,

    /// Open tabs during the upgrade.
    #[arg(long, default_value = "1")]
    pub tabs: usize,
}
