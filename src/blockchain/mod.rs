//! Blockchain integration subsystem.
//!
//! # Data Flow
//! ```text
//! keys.rs (keypair generation, base58 identities, signatures)
//!     → transaction.rs (transfer instruction, message compile, sign, serialize)
//!     → gateway.rs (capability traits the agent depends on)
//!         → client.rs (JSON-RPC over HTTP: blockhash, sendTransaction)
//!         → pubsub.rs (websocket account subscriptions)
//! ```
//!
//! # Security Constraints
//! - Secret key material is generated in memory and never logged or persisted
//! - Only the fee payer's key may sign a transaction
//! - All RPC calls have configurable timeouts

pub mod client;
pub mod gateway;
pub mod keys;
pub mod pubsub;
pub mod transaction;
pub mod types;

pub use client::RpcClient;
pub use gateway::{AccountSubscription, RawNotification, RpcGateway, SubscriptionGateway};
pub use keys::{Hash, KeyError, Keypair, Pubkey, Signature};
pub use pubsub::PubsubClient;
pub use transaction::{Instruction, SignedTransaction, Transaction, TransactionError};
pub use types::{
    Commitment, GatewayError, RecentBlockhash, SendOptions, TransactionSignature, LAMPORTS_PER_SOL,
};
