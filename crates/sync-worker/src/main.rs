mod config;
mod sync_loop;
mod telemetry;

use anyhow::Result;
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use common::Watermark;
use std::sync::Arc;
use sync_engine::{MongoStore, PgSource, Replicator, MAPPINGS};
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "sync-worker", about = "Replicates PostgreSQL tables into MongoDB")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Replicate continuously on a fixed interval (default)
    Run {
        /// Resume after this instant instead of resolving it from MongoDB
        #[arg(long)]
        since: Option<DateTime<Utc>>,
    },
    /// Run a single sync pass and exit
    Sync {
        /// Resume after this instant instead of resolving it from MongoDB
        #[arg(long)]
        since: Option<DateTime<Utc>>,
    },
}

/// Worker keeping MongoDB collections in step with the PostgreSQL store of record
#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load configuration
    dotenvy::dotenv().ok();
    let config = config::Config::from_env()?;

    telemetry::init_tracing(config.log_format);
    info!("Starting sync worker...");

    if let Some(addr) = config.metrics_addr {
        telemetry::init_metrics(addr)?;
    }

    let source = PgSource::connect(&config.database, config.sync.source_schema.clone()).await?;
    info!(schema = %config.sync.source_schema, "Connected to PostgreSQL");

    let store = MongoStore::connect(&config.mongo).await?;
    if let Err(e) = store.ensure_indexes(MAPPINGS).await {
        warn!("Failed to ensure destination indexes: {}", e);
    }

    let replicator = Replicator::new(Arc::new(source), Arc::new(store), MAPPINGS);

    match cli.command.unwrap_or(Command::Run { since: None }) {
        Command::Run { since } => {
            sync_loop::run_sync_loop(replicator, &config, since.map(Watermark::at)).await
        }
        Command::Sync { since } => {
            sync_loop::run_one_shot(&replicator, since.map(Watermark::at)).await;
        }
    }

    Ok(())
}
