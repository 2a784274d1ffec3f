//! Waypoint CLI entry point.

use anyhow::{Context, Result};
use clap::Parser;

use waypoint::cli::{commands, handle_error, AppContext, Cli, Commands};
use waypoint::infrastructure::config::ConfigLoader;
use waypoint::infrastructure::logging::{LogConfig, LoggerImpl};

async fn run(cli: Cli) -> Result<()> {
    let config = ConfigLoader::load().context("Failed to load configuration")?;
    let _logger = LoggerImpl::init(&LogConfig::from(&config.logging)).context("Failed to initialize logging")?;

    let ctx = AppContext::new(config, cli.session)?;
    match cli.command {
        Commands::Spec(args) => commands::spec::execute(args, ctx, cli.json).await,
        Commands::Delivery(args) => commands::delivery::execute(args, ctx, cli.json).await,
        Commands::Learn(args) => commands::learn::execute(args, ctx, cli.json).await,
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let json_mode = cli.json;

    if let Err(err) = run(cli).await {
        handle_error(err, json_mode);
    }
}
