//! docplus - DocPlus extension host CLI
//!
//! Developer tooling around the extension host: plugin manifests, think-tag
//! inspection, the command allowlist and extension storage.

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

mod cli;
mod commands;
mod config;

use cli::{Cli, Commands};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env().add_directive("docplus=info".parse()?))
        .init();

    let cli = Cli::parse();

    // Load configuration
    let config = config::Config::load()?;

    // Execute command
    match cli.command {
        Commands::Ext(cmd) => commands::ext::execute(cmd, &config).await,
        Commands::Think { file, json } => commands::think::execute(file, json).await,
        Commands::Commands { check } => commands::allowlist::execute(check.as_deref(), &config),
        Commands::Storage(cmd) => commands::storage::execute(cmd, &config),
        Commands::Doctor => commands::doctor::execute(&config).await,
        Commands::Version => {
            println!("docplus {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}
