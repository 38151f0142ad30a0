//! Chain-specific types and error definitions.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::blockchain::keys::{Hash, Signature};

/// Lamports in one SOL. Display only; all arithmetic stays in lamports.
pub const LAMPORTS_PER_SOL: u64 = 1_000_000_000;

/// Ledger confidence level for reads and writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Commitment {
    Processed,
    Confirmed,
    #[default]
    Finalized,
}

impl Commitment {
    /// Wire name used in JSON-RPC parameters.
    pub fn as_str(&self) -> &'static str {
        match self {
            Commitment::Processed => "processed",
            Commitment::Confirmed => "confirmed",
            Commitment::Finalized => "finalized",
        }
    }
}

impl fmt::Display for Commitment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Short-lived ordering token a transaction must reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecentBlockhash {
    pub blockhash: Hash,
    /// Last block height at which a transaction using this hash is accepted.
    pub last_valid_block_height: u64,
}

/// Transaction id as reported by the node after submission.
///
/// Kept opaque: the agent only displays it and passes it to status lookups.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(transparent)]
pub struct TransactionSignature(String);

impl TransactionSignature {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for TransactionSignature {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for TransactionSignature {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<Signature> for TransactionSignature {
    fn from(value: Signature) -> Self {
        Self(value.to_string())
    }
}

impl fmt::Display for TransactionSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Options for `sendTransaction`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SendOptions {
    pub skip_preflight: bool,
    pub preflight_commitment: Commitment,
}

impl SendOptions {
    /// Preflight simulation on, at the given commitment.
    pub fn with_preflight(commitment: Commitment) -> Self {
        Self {
            skip_preflight: false,
            preflight_commitment: commitment,
        }
    }
}

/// Errors surfaced by the gateway boundary (RPC and subscription transports).
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum GatewayError {
    /// Network-level request failure.
    #[error("RPC error: {0}")]
    Rpc(String),

    /// Request did not complete within the configured deadline.
    #[error("RPC timeout after {0} seconds")]
    Timeout(u64),

    /// The node answered with a JSON-RPC error (simulation or validator rejection).
    #[error("rejected by node ({code}): {message}")]
    Rejected { code: i64, message: String },

    /// Websocket send/receive failure.
    #[error("transport error: {0}")]
    Transport(String),

    /// Subscription stream ended or was closed by the peer.
    #[error("subscription closed")]
    SubscriptionClosed,

    /// Response did not have the expected shape.
    #[error("malformed response: {0}")]
    Decode(String),
}

/// Result type for gateway operations.
pub type GatewayResult<T> = Result<T, GatewayError>;

/// Render lamports as SOL with full 9-decimal precision.
pub fn format_sol(lamports: u64) -> String {
    format!(
        "{}.{:09}",
        lamports / LAMPORTS_PER_SOL,
        lamports % LAMPORTS_PER_SOL
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_commitment_wire_names() {
        assert_eq!(Commitment::default(), Commitment::Finalized);
        assert_eq!(Commitment::Finalized.to_string(), "finalized");
        let parsed: Commitment = serde_json::from_str("\"confirmed\"").unwrap();
        assert_eq!(parsed, Commitment::Confirmed);
    }

    #[test]
    fn test_format_sol() {
        assert_eq!(format_sol(100_000_000), "0.100000000");
        assert_eq!(format_sol(1_500_000_001), "1.500000001");
        assert_eq!(format_sol(0), "0.000000000");
    }

    #[test]
    fn test_error_display() {
        let err = GatewayError::Timeout(10);
        assert_eq!(err.to_string(), "RPC timeout after 10 seconds");

        let err = GatewayError::Rejected {
            code: -32002,
            message: "Blockhash not found".to_string(),
        };
        assert!(err.to_string().contains("Blockhash not found"));
    }
}
