//! Shared gateway stubs for integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use serde_json::json;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use custody_agent::blockchain::gateway::{
    AccountSubscription, RawNotification, RpcGateway, SubscriptionGateway,
};
use custody_agent::blockchain::keys::{Hash, Pubkey};
use custody_agent::blockchain::transaction::SignedTransaction;
use custody_agent::blockchain::types::{
    Commitment, GatewayError, GatewayResult, RecentBlockhash, SendOptions, TransactionSignature,
};
use custody_agent::config::MonitorConfig;

/// Request/response stub that counts calls and keeps submitted transactions.
pub struct StubRpc {
    blockhash: GatewayResult<RecentBlockhash>,
    submit: GatewayResult<TransactionSignature>,
    balance: GatewayResult<u64>,
    pub blockhash_calls: AtomicUsize,
    pub balance_calls: AtomicUsize,
    pub submit_calls: AtomicUsize,
    pub submitted: Mutex<Vec<(SignedTransaction, SendOptions)>>,
}

impl StubRpc {
    pub fn new(submit: GatewayResult<TransactionSignature>) -> Self {
        Self {
            blockhash: Ok(RecentBlockhash {
                blockhash: Hash::new([7u8; 32]),
                last_valid_block_height: 1_000,
            }),
            submit,
            balance: Ok(0),
            blockhash_calls: AtomicUsize::new(0),
            balance_calls: AtomicUsize::new(0),
            submit_calls: AtomicUsize::new(0),
            submitted: Mutex::new(Vec::new()),
        }
    }

    pub fn accepting(signature: &str) -> Self {
        Self::new(Ok(TransactionSignature::from(signature)))
    }

    pub fn with_blockhash_error(mut self, error: GatewayError) -> Self {
        self.blockhash = Err(error);
        self
    }

    pub fn with_balance(mut self, lamports: u64) -> Self {
        self.balance = Ok(lamports);
        self
    }

    pub fn with_balance_error(mut self, error: GatewayError) -> Self {
        self.balance = Err(error);
        self
    }

    pub fn submit_count(&self) -> usize {
        self.submit_calls.load(Ordering::SeqCst)
    }

    pub fn last_submitted(&self) -> Option<(SignedTransaction, SendOptions)> {
        self.submitted.lock().unwrap().last().cloned()
    }
}

#[async_trait]
impl RpcGateway for StubRpc {
    async fn fetch_recent_blockhash(
        &self,
        _commitment: Commitment,
    ) -> GatewayResult<RecentBlockhash> {
        self.blockhash_calls.fetch_add(1, Ordering::SeqCst);
        self.blockhash.clone()
    }

    async fn fetch_balance(&self, _account: Pubkey, _commitment: Commitment) -> GatewayResult<u64> {
        self.balance_calls.fetch_add(1, Ordering::SeqCst);
        self.balance.clone()
    }

    async fn submit_transaction(
        &self,
        transaction: &SignedTransaction,
        options: SendOptions,
    ) -> GatewayResult<TransactionSignature> {
        self.submit_calls.fetch_add(1, Ordering::SeqCst);
        self.submitted.lock().unwrap().push((transaction.clone(), options));
        self.submit.clone()
    }
}

/// One scripted step of a subscription.
#[derive(Debug, Clone)]
pub enum Step {
    Notify(RawNotification),
    Fail(GatewayError),
}

/// Account notification payload carrying `lamports` at `slot`.
pub fn notification(slot: u64, lamports: u64) -> Step {
    Step::Notify(RawNotification(json!({
        "context": { "slot": slot },
        "value": { "lamports": lamports, "owner": "11111111111111111111111111111111" }
    })))
}

pub fn malformed() -> Step {
    Step::Notify(RawNotification(json!({
        "context": { "slot": 1 },
        "value": { "lamports": "n/a" }
    })))
}

/// Subscription gateway replaying one script per subscribe call.
///
/// Once a script is drained, `receive_next` either stays pending forever or
/// reports the stream closed, depending on `close_when_drained`.
pub struct ScriptedSubscriptionGateway {
    scripts: Mutex<VecDeque<GatewayResult<Vec<Step>>>>,
    close_when_drained: bool,
    pub subscribe_calls: Arc<AtomicUsize>,
    pub close_calls: Arc<AtomicUsize>,
    pub receive_calls: Arc<AtomicUsize>,
}

impl ScriptedSubscriptionGateway {
    pub fn new(scripts: Vec<GatewayResult<Vec<Step>>>) -> Self {
        Self {
            scripts: Mutex::new(scripts.into()),
            close_when_drained: false,
            subscribe_calls: Arc::new(AtomicUsize::new(0)),
            close_calls: Arc::new(AtomicUsize::new(0)),
            receive_calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn single(steps: Vec<Step>) -> Self {
        Self::new(vec![Ok(steps)])
    }

    pub fn closing_when_drained(mut self) -> Self {
        self.close_when_drained = true;
        self
    }

    pub fn subscribes(&self) -> usize {
        self.subscribe_calls.load(Ordering::SeqCst)
    }

    pub fn closes(&self) -> usize {
        self.close_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SubscriptionGateway for ScriptedSubscriptionGateway {
    async fn subscribe_to_account(
        &self,
        _account: Pubkey,
        _commitment: Commitment,
    ) -> GatewayResult<Box<dyn AccountSubscription>> {
        self.subscribe_calls.fetch_add(1, Ordering::SeqCst);
        let script = self
            .scripts
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Err(GatewayError::Transport("connection refused".to_string())))?;

        Ok(Box::new(ScriptedSubscription {
            steps: script.into(),
            close_when_drained: self.close_when_drained,
            close_calls: self.close_calls.clone(),
            receive_calls: self.receive_calls.clone(),
        }))
    }
}

struct ScriptedSubscription {
    steps: VecDeque<Step>,
    close_when_drained: bool,
    close_calls: Arc<AtomicUsize>,
    receive_calls: Arc<AtomicUsize>,
}

#[async_trait]
impl AccountSubscription for ScriptedSubscription {
    async fn receive_next(&mut self) -> GatewayResult<RawNotification> {
        self.receive_calls.fetch_add(1, Ordering::SeqCst);
        match self.steps.pop_front() {
            Some(Step::Notify(raw)) => Ok(raw),
            Some(Step::Fail(e)) => Err(e),
            None if self.close_when_drained => Err(GatewayError::SubscriptionClosed),
            None => std::future::pending().await,
        }
    }

    async fn close(&mut self) {
        self.close_calls.fetch_add(1, Ordering::SeqCst);
    }
}

/// Monitor settings with millisecond backoff for fast tests.
pub fn fast_monitor_config() -> MonitorConfig {
    MonitorConfig {
        enabled: true,
        max_consecutive_receive_errors: 2,
        max_reconnect_attempts: 3,
        reconnect_base_delay_ms: 1,
        reconnect_max_delay_ms: 5,
    }
}
