//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the agent.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

use crate::blockchain::types::Commitment;

/// Root configuration for the custody agent.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct AgentConfig {
    /// Network endpoints and commitment.
    pub network: NetworkConfig,

    /// Outbound transfer settings.
    pub withdrawal: WithdrawalConfig,

    /// Deposit monitor settings.
    pub monitor: MonitorConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Network endpoint configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// JSON-RPC endpoint URL.
    pub rpc_url: String,

    /// Failover JSON-RPC endpoint URLs.
    pub failover_urls: Vec<String>,

    /// Websocket endpoint URL for subscriptions.
    pub ws_url: String,

    /// Commitment for blockhash fetches, preflight, and subscriptions.
    pub commitment: Commitment,

    /// Per-request timeout in seconds (RPC calls, websocket connect and ack).
    pub rpc_timeout_secs: u64,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            rpc_url: "https://api.mainnet-beta.solana.com".to_string(),
            failover_urls: Vec::new(),
            ws_url: "wss://api.mainnet-beta.solana.com".to_string(),
            commitment: Commitment::Finalized,
            rpc_timeout_secs: 30,
        }
    }
}

/// Withdrawal configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct WithdrawalConfig {
    /// Issue the configured withdrawal at startup.
    pub enabled: bool,

    /// Base58 destination public key.
    pub destination: String,

    /// Amount to transfer in lamports.
    pub amount_lamports: u64,

    /// Refuse transfers whose destination is the agent's own account.
    pub reject_self_transfer: bool,
}

impl Default for WithdrawalConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            destination: String::new(),
            amount_lamports: 100_000_000, // 0.1 SOL
            reject_self_transfer: false,
        }
    }
}

/// Deposit monitor configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct MonitorConfig {
    /// Run the deposit monitor.
    pub enabled: bool,

    /// Consecutive receive failures tolerated before resubscribing.
    pub max_consecutive_receive_errors: u32,

    /// Consecutive failed (re)subscribe attempts before giving up.
    pub max_reconnect_attempts: u32,

    /// Base delay for exponential reconnect backoff in milliseconds.
    pub reconnect_base_delay_ms: u64,

    /// Maximum reconnect delay in milliseconds.
    pub reconnect_max_delay_ms: u64,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_consecutive_receive_errors: 5,
            max_reconnect_attempts: 10,
            reconnect_base_delay_ms: 500,
            reconnect_max_delay_ms: 30_000,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9090".to_string(),
        }
    }
}
