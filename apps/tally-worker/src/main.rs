//! # Tally Worker
//!
//! Replicates the configured entity collections into the data lake on a
//! fixed schedule, and runs the administrative operations on demand.
//!
//! ## Commands
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  run                      schedule every entity and report             │
//! │  sync <entity> [--full]   one cycle (mode from state unless --full)    │
//! │  reset-state              every namespace back to "needs full sync"    │
//! │  wipe-storage [--entity]  delete written blobs                         │
//! │  columns <entity>         print the output column list                 │
//! │  status                   database health and state of every entity    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Logging
//! - `RUST_LOG=debug` - Show debug logs
//! - `RUST_LOG=tally_sync=trace` - Trace the sync crate only
//! - Default: INFO level

mod commands;
mod scheduler;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use tally_sync::TallyConfig;

/// Replicates GraphQL entity collections into a columnar data lake.
#[derive(Parser)]
#[command(name = "tally-worker")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the configuration file
    #[arg(global = true, short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the scheduler until interrupted
    Run,

    /// Run one cycle for one entity
    Sync {
        /// Entity name
        entity: String,

        /// Force a full sync
        #[arg(long)]
        full: bool,
    },

    /// Reset the sync state of every entity
    ResetState,

    /// Delete written blobs
    WipeStorage {
        /// Only this entity's namespace
        #[arg(short, long)]
        entity: Option<String>,
    },

    /// Print the output columns of an entity
    Columns {
        /// Entity name
        entity: String,
    },

    /// Print the sync state of every entity
    Status,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing();

    let config = TallyConfig::load(cli.config)?;

    match cli.command {
        Commands::Run => {
            let worker = commands::Worker::open(config).await?;
            scheduler::run(worker).await?;
        }
        Commands::Sync { entity, full } => {
            let worker = commands::Worker::open(config).await?;
            let outcome = worker.sync_entity(&entity, full).await;
            worker.close().await;
            println!("{:?}", outcome?);
        }
        Commands::ResetState => {
            let worker = commands::Worker::open(config).await?;
            worker.reset_state().await?;
            worker.close().await;
        }
        Commands::WipeStorage { entity } => {
            let removed = commands::wipe_storage(&config, entity.as_deref()).await?;
            println!("Removed {} namespace(s)", removed);
        }
        Commands::Columns { entity } => {
            for column in commands::columns(&config, &entity)? {
                println!("{}", column);
            }
        }
        Commands::Status => {
            let worker = commands::Worker::open(config).await?;
            let report = worker.status().await;
            worker.close().await;
            let report = report?;

            println!(
                "database: healthy={} migrations={}/{}",
                report.database_healthy, report.migrations.1, report.migrations.0
            );
            for (entity, state) in &report.entities {
                println!(
                    "{}: initial_sync_complete={} initial_sync_cursor={} deltas_cursor={}",
                    entity,
                    state.initial_sync_complete,
                    display_cursor(state.initial_sync_cursor.as_ref()),
                    display_cursor(state.deltas_cursor.as_ref()),
                );
            }
            for namespace in &report.orphaned {
                println!("{}: stored state, not configured", namespace);
            }
        }
    }

    Ok(())
}

fn display_cursor(cursor: Option<&tally_core::Cursor>) -> &str {
    cursor.map_or("-", |c| c.as_str())
}

/// Installs the subscriber; `RUST_LOG` overrides the default filter.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,sqlx=warn"));

    tracing_subscriber::fmt().with_env_filter(filter).init();
}
