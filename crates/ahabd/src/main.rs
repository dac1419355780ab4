//! ahabd — keeps a node's container runtime and network proxy healthy.
//!
//! # Usage
//!
//! ```text
//! AHABD_NODE_ID=$(hostname) ahabd run --period 1h
//! ```

use std::time::Duration;

use clap::{Parser, Subcommand};
use tracing::info;

use ahabd::config::{parse_period, DaemonConfig};

#[derive(Parser)]
#[command(name = "ahabd", about = "Node health remediation daemon", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Periodically check and repair node components.
    Run {
        /// Time between health checks, e.g. 1h, 30m, 1h30m.
        #[arg(long, default_value = "1h", value_parser = parse_period)]
        period: Duration,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info,ahabd=debug,ahab=debug")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Run { period } => {
            info!(version = env!("CARGO_PKG_VERSION"), ?period, "ahabd starting");
            let config = DaemonConfig::from_env(period)?;
            ahabd::run(config).await?;
            info!("ahabd stopped");
            Ok(())
        }
    }
}
