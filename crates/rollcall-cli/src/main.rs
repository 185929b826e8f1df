//! rollcall - NFC check-in station
//!
//! Runs the scan and sync loops and exposes the operator maintenance
//! commands (tag registration, queue inspection, reader diagnostics).

mod cli;
mod commands;
mod config;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, Commands};
use crate::config::AppConfig;

const DEFAULT_LOG_FILTER: &str = "info";

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        eprintln!("Error: {error:#}");
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = AppConfig::load(&cli)?;
    let offline = cli.offline;

    match cli.command {
        Commands::Run => commands::run::execute(&config, offline).await?,
        Commands::Status { json } => commands::status::execute(&config, offline, json).await?,
        Commands::Sync => commands::sync::execute(&config, offline).await?,
        Commands::Register {
            guest_id,
            tag,
            rewrite,
        } => {
            commands::tags::register(&config, offline, &guest_id, tag.as_deref(), rewrite).await?;
        }
        Commands::Erase { tag } => commands::tags::erase(&config, offline, tag.as_deref()).await?,
        Commands::Lookup { tag } => commands::tags::lookup(&config, offline, &tag).await?,
        Commands::Absent { guest_id } => {
            commands::tags::absent(&config, offline, &guest_id).await?;
        }
        Commands::Pending { limit, json } => {
            commands::queue::pending(&config, offline, limit, json).await?;
        }
        Commands::Compact => commands::queue::compact(&config, offline).await?,
        Commands::ClearQueue { yes } => {
            commands::queue::clear_queue(&config, offline, yes).await?;
        }
        Commands::Readers => commands::readers::execute(&config).await?,
    }

    Ok(())
}
