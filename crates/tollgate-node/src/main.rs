//! Tollgate node entry point.
//!
//! Starts the Tollgate ledger node with configuration from a TOML file or
//! defaults.

mod api;
mod commands;
mod config;
mod node;
mod state;
mod storage;

use clap::Parser;
use std::path::PathBuf;
use tollgate_core::Address;
use tracing_subscriber::EnvFilter;

use config::NodeConfig;
use node::TollgateNode;

/// Tollgate Node
#[derive(Parser, Debug)]
#[command(name = "tollgate-node", version, about = "Tollgate settlement ledger node")]
struct Args {
    /// Path to the configuration file (TOML).
    #[arg(short, long, default_value = "tollgate.toml")]
    config: PathBuf,

    /// Override the API port.
    #[arg(long)]
    api_port: Option<u16>,

    /// Override the data directory.
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Override the log level (trace, debug, info, warn, error).
    #[arg(long)]
    log_level: Option<String>,

    /// Override the ledger admin account (0x-prefixed hex).
    #[arg(long)]
    admin: Option<Address>,

    /// Generate a default config file and exit.
    #[arg(long)]
    init: bool,
}

fn init_tracing(level: &str, format: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    if format == "json" {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_target(true)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Handle --init flag
    if args.init {
        let config = NodeConfig::default();
        config.save(&args.config)?;
        println!("wrote default config to {}", args.config.display());
        return Ok(());
    }

    // Load configuration
    let mut config = NodeConfig::load(&args.config)?;

    // Apply CLI overrides
    if let Some(api_port) = args.api_port {
        config.api.port = api_port;
    }
    if let Some(ref data_dir) = args.data_dir {
        config.storage.data_dir = data_dir.clone();
    }
    if let Some(level) = args.log_level {
        config.logging.level = level;
    }
    if let Some(admin) = args.admin {
        config.ledger.admin = admin;
    }

    init_tracing(&config.logging.level, &config.logging.format);

    tracing::info!("Tollgate Node v{}", env!("CARGO_PKG_VERSION"));

    // Create and start the node
    let mut node = TollgateNode::new(config)?;
    node.start().await?;

    // Set up graceful shutdown on SIGINT
    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
        tracing::info!("received shutdown signal");
    };

    tokio::select! {
        result = node.run() => {
            if let Err(e) = result {
                tracing::error!(error = %e, "sequencer error");
            }
        }
        _ = shutdown => {
            tracing::info!("initiating graceful shutdown");
        }
    }

    node.shutdown().await?;
    tracing::info!("Tollgate node exited cleanly");
    Ok(())
}
