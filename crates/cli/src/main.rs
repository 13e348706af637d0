//! luckydraw CLI entry point

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

mod args;
mod commands;
mod config;

use args::{Cli, Commands};
use config::AppConfig;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&log_level(&cli))?;

    match cli.command {
        Commands::Fetch(args) => commands::fetch::execute(args, cli.config).await,
        Commands::Draw(args) => commands::draw::execute(args, cli.config).await,
        Commands::Config(args) => commands::config::execute(args),
    }
}

/// `--log-level` wins, then `general.log_level` from config. A config that
/// fails to load falls back to `info` here; the command reports the error.
fn log_level(cli: &Cli) -> String {
    if let Some(level) = &cli.log_level {
        return level.clone();
    }
    AppConfig::load(cli.config.as_deref())
        .map(|config| config.general.log_level)
        .unwrap_or_else(|_| "info".to_string())
}

/// Compact diagnostics on stderr so stdout stays machine-readable.
/// `RUST_LOG` overrides `level`.
fn init_logging(level: &str) -> Result<()> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(level)?,
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .compact()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();

    Ok(())
}
