//! swc - Command line tool for the API caching worker.
//!
//! Commands:
//! - `swc config` - Manage the worker configuration
//! - `swc check` - Check how a URL or origin is treated
//! - `swc simulate` - Drive the worker through a scripted session

mod commands;
mod config;
mod context;
mod output;

use anyhow::Result;
use clap::{Parser, Subcommand};
use sw_observability::{LogConfig, LogFormat, LogLevel};

use commands::{CheckArgs, ConfigArgs, SimulateArgs};

/// swc - Inspect and exercise the API caching worker
#[derive(Parser)]
#[command(name = "swc")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Use JSON output format
    #[arg(long, global = true)]
    json: bool,

    /// Config file path
    #[arg(short, long, global = true)]
    config: Option<String>,

    /// Environment whose overrides apply
    #[arg(short, long, global = true)]
    env: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage configuration
    Config(ConfigArgs),

    /// Check how a URL or origin is treated
    Check(CheckArgs),

    /// Simulate a browsing session against the worker
    Simulate(SimulateArgs),
}

impl Cli {
    fn log_config(&self) -> LogConfig {
        let level = if self.verbose { LogLevel::Debug } else { LogLevel::Warn };
        let format = if self.json { LogFormat::Json } else { LogFormat::Human };
        LogConfig::new(level).with_format(format)
    }
}

async fn dispatch(command: Commands, ctx: &context::Context) -> Result<()> {
    match command {
        Commands::Config(args) => commands::config::run(args, ctx).await,
        Commands::Check(args) => commands::check::run(args, ctx).await,
        Commands::Simulate(args) => commands::simulate::run(args, ctx).await,
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    sw_observability::init(cli.log_config())?;

    let output = output::Output::new(cli.verbose, cli.json);
    let ctx = context::Context::load(cli.config.as_deref(), cli.env.as_deref(), output.clone());
    let result = match ctx {
        Ok(ctx) => dispatch(cli.command, &ctx).await,
        Err(e) => Err(e),
    };

    if let Err(e) = result {
        output.error(&format!("{:#}", e));
        std::process::exit(1);
    }

    Ok(())
}
