//! Treasury Relay
//!
//! Holds a treasury account on an EVM chain, keeps a failover connection to a
//! pool of public JSON-RPC endpoints, sweeps the treasury to a payout account
//! once it crosses a USD threshold, and keeps an in-memory earnings ledger.
//!
//! # Architecture Overview
//!
//! ```text
//!                       ┌──────────────────────────────────────────────┐
//!                       │                TREASURY RELAY                │
//!                       │                                              │
//!    Operator / CLI     │  ┌────────┐     ┌──────────────────────┐     │
//!    ───────────────────┼─▶│  http  │────▶│   TreasuryService    │     │
//!                       │  └────────┘     └──┬─────────┬──────┬──┘     │
//!                       │                    │         │      │        │
//!                       │          ┌─────────▼──┐  ┌───▼────┐ │        │
//!                       │          │  Balance   │  │ Ledger │ │        │
//!                       │          │  Service   │  └────────┘ │        │
//!                       │          └─────┬──────┘             │        │
//!                       │                │      ┌─────────────▼──┐     │
//!                       │  ┌───────────┐ │      │   Withdrawal   │     │
//!                       │  │ Scheduler │─┴─────▶│    Executor    │     │
//!                       │  └───────────┘        └───────┬────────┘     │
//!                       │                               │              │
//!                       │                  ┌────────────▼─────────┐    │    JSON-RPC
//!                       │                  │  ConnectionManager   │────┼──▶ endpoints
//!                       │                  │  (probe + failover)  │    │    (rotation)
//!                       │                  └──────────────────────┘    │
//!                       └──────────────────────────────────────────────┘
//! ```

use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;

use treasury_relay::blockchain::{HttpConnector, Wallet};
use treasury_relay::config::load_or_default;
use treasury_relay::observability::{logging, metrics};
use treasury_relay::{HttpServer, Shutdown, TreasuryService};

#[derive(Parser)]
#[command(name = "treasury-relay", version)]
#[command(about = "Treasury connection and withdrawal service", long_about = None)]
struct Args {
    /// Path to a TOML config file. Missing file means defaults.
    #[arg(short, long, default_value = "treasury.toml")]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let config = load_or_default(Some(&args.config))?;
    logging::init(&config.observability.log_level);

    tracing::info!("treasury-relay v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        bind_address = %config.listener.bind_address,
        endpoints = config.blockchain.endpoints.len(),
        chain_id = config.blockchain.chain_id,
        threshold_usd = %config.scheduler.threshold_usd,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        if let Ok(addr) = config.observability.metrics_address.parse() {
            metrics::init_metrics(addr);
        } else {
            tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            );
        }
    }

    let wallet = Wallet::from_env(config.blockchain.chain_id)?;
    let connector = Arc::new(HttpConnector::new(Duration::from_secs(
        config.blockchain.rpc_timeout_secs,
    )));
    let treasury = Arc::new(TreasuryService::new(&config, connector, wallet)?);

    let shutdown = Shutdown::new();
    tokio::spawn(shutdown.clone().trigger_on_ctrl_c());

    let scheduler = tokio::spawn(treasury.scheduler().run(shutdown.subscribe()));

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let server = HttpServer::new(treasury, &config.listener);
    server.run(listener, shutdown.subscribe()).await?;

    let _ = scheduler.await;

    tracing::info!("Shutdown complete");
    Ok(())
}
