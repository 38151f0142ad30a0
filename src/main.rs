//! Custody agent
//!
//! # Architecture Overview
//!
//! ```text
//!                    ┌──────────────────────────────────────────────┐
//!                    │                 CUSTODY AGENT                │
//!                    │                                              │
//!   OS entropy ─────▶│  Keypair::generate ──▶ Arc<Keypair>          │
//!                    │           │                     │            │
//!                    │           ▼                     ▼            │
//!                    │  ┌────────────────────┐ ┌─────────────────┐  │
//!                    │  │ WithdrawalExecutor │ │ DepositMonitor  │  │
//!                    │  │ blockhash → build  │ │ subscribe →     │  │
//!                    │  │ → sign → submit    │ │ stream → events │  │
//!                    │  └────────┬───────────┘ └───────┬─────────┘  │
//!                    │           │ RpcClient           │ Pubsub     │
//!                    └───────────┼─────────────────────┼────────────┘
//!                                ▼                     ▼
//!                         JSON-RPC (HTTP)        websocket feed
//! ```

use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;

use custody_agent::agent::{CustodyAgent, WithdrawalOutcome};
use custody_agent::blockchain::{Keypair, PubsubClient, RpcClient};
use custody_agent::config::loader;
use custody_agent::lifecycle::{signals, Shutdown};
use custody_agent::observability::{logging, metrics};

#[derive(Parser)]
#[command(name = "custody-agent")]
#[command(
    about = "Generates a custody account, withdraws from it, and watches it for deposits",
    long_about = None
)]
struct Cli {
    /// Path to a TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config = loader::load(cli.config.as_deref())?;
    logging::init(&config.observability.log_level);

    tracing::info!("custody-agent v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        rpc_url = %config.network.rpc_url,
        ws_url = %config.network.ws_url,
        commitment = %config.network.commitment,
        withdrawal_enabled = config.withdrawal.enabled,
        monitor_enabled = config.monitor.enabled,
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

    let keypair = Arc::new(Keypair::generate()?);
    println!("Custody account: {}", keypair.pubkey());

    let rpc = RpcClient::new(config.network.clone())?;
    if !rpc.is_healthy().await {
        tracing::warn!(rpc_url = %config.network.rpc_url, "RPC node reports unhealthy");
    }
    let pubsub = PubsubClient::new(&config.network)?;

    let shutdown = Shutdown::new();
    let signal = shutdown.subscribe();
    let _listener = signals::spawn_signal_listener(shutdown.clone());

    let agent = CustodyAgent::new(config, Arc::new(rpc), Arc::new(pubsub));
    let report = agent.run_with_identity(keypair, signal).await?;

    match &report.withdrawal {
        WithdrawalOutcome::Submitted(signature) => println!("Withdrawal signature: {}", signature),
        WithdrawalOutcome::Failed(e) => eprintln!("Withdrawal failed: {}", e),
        WithdrawalOutcome::Disabled => {}
    }

    tracing::info!(
        account = %report.account,
        balance_updates = report.balance_updates,
        "Shutdown complete"
    );
    Ok(())
}
