//! # Master CRUD Main Entry Point
//!
//! `serve` (the default) runs the HTTP API; `migrate` applies pending
//! migrations and exits.

use clap::{Parser, Subcommand};
use master_crud::{config::ConfigLoader, db, server::run_server, telemetry};

#[derive(Parser)]
#[command(name = "master-crud", version, about = "Atomic entity lifecycle service")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Start the HTTP server (default)
    Serve,
    /// Apply pending database migrations and exit
    Migrate,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load configuration from layered env files and variables
    let config = ConfigLoader::new().load()?;
    telemetry::init_tracing(&config)?;

    tracing::info!(profile = %config.profile, "Loaded configuration");
    if let Ok(redacted_json) = config.redacted_json() {
        tracing::debug!(config = %redacted_json, "Effective configuration");
    }

    let pool = db::init_pool(&config).await?;

    match cli.command.unwrap_or(Command::Serve) {
        Command::Migrate => db::run_migrations(&pool).await,
        Command::Serve => {
            if config.run_migrations {
                db::run_migrations(&pool).await?;
            }
            run_server(config, pool).await
        }
    }
}
