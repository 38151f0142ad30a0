//! Capability interfaces the agent consumes from the network.
//!
//! The withdrawal path and the starting balance read use [`RpcGateway`]; the
//! deposit monitor only needs [`SubscriptionGateway`]. Concrete transports live in `client.rs` and
//! `pubsub.rs`; tests substitute scripted stubs.

use async_trait::async_trait;

use crate::blockchain::keys::Pubkey;
use crate::blockchain::transaction::SignedTransaction;
use crate::blockchain::types::{
    Commitment, GatewayResult, RecentBlockhash, SendOptions, TransactionSignature,
};

/// Request/response access to the ledger.
#[async_trait]
pub trait RpcGateway: Send + Sync {
    /// Fetch a blockhash to anchor a new transaction.
    async fn fetch_recent_blockhash(
        &self,
        commitment: Commitment,
    ) -> GatewayResult<RecentBlockhash>;

    /// Current lamport balance of `account`.
    async fn fetch_balance(&self, account: Pubkey, commitment: Commitment) -> GatewayResult<u64>;

    /// Submit a signed transaction, returning its signature once accepted.
    async fn submit_transaction(
        &self,
        transaction: &SignedTransaction,
        options: SendOptions,
    ) -> GatewayResult<TransactionSignature>;
}

/// Raw account notification payload as delivered by the subscription feed.
#[derive(Debug, Clone, PartialEq)]
pub struct RawNotification(pub serde_json::Value);

/// A live account subscription.
#[async_trait]
pub trait AccountSubscription: Send {
    /// Wait for the next notification.
    async fn receive_next(&mut self) -> GatewayResult<RawNotification>;

    /// Release the subscription. Safe to call more than once.
    async fn close(&mut self);
}

/// Opens account subscriptions.
#[async_trait]
pub trait SubscriptionGateway: Send + Sync {
    async fn subscribe_to_account(
        &self,
        account: Pubkey,
        commitment: Commitment,
    ) -> GatewayResult<Box<dyn AccountSubscription>>;
}
