//! Agent orchestration.
//!
//! # Responsibilities
//! - Generate the custody identity
//! - Read the starting balance so the first notification can be classified
//! - Run the withdrawal and the deposit monitor as two supervised tasks
//! - Stop the monitor on shutdown and join both tasks before returning
//!
//! # Design Decisions
//! - Identity failure is fatal; a failed withdrawal is logged and reported
//! - The two tasks share only the read-only keypair
//! - The withdrawal cannot be cancelled once started; shutdown waits for it

use std::sync::Arc;
use thiserror::Error;
use tokio::task::JoinHandle;

use crate::blockchain::gateway::{RpcGateway, SubscriptionGateway};
use crate::blockchain::keys::{KeyError, Keypair, Pubkey};
use crate::blockchain::types::TransactionSignature;
use crate::config::validation::ValidationError;
use crate::config::{AgentConfig, ConfigError};
use crate::deposits::{
    process_balance_update, BalanceChange, BalanceTracker, DepositMonitor, MonitorError,
    MonitorEvent,
};
use crate::lifecycle::ShutdownSignal;
use crate::withdrawal::{WithdrawalError, WithdrawalExecutor};

/// Fatal orchestrator errors.
#[derive(Debug, Error)]
pub enum AgentError {
    #[error("identity generation failed: {0}")]
    Identity(#[from] KeyError),

    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("deposit monitor failed: {0}")]
    Monitor(#[from] MonitorError),

    #[error("{0} task panicked")]
    TaskPanicked(&'static str),
}

/// Result of the one-shot withdrawal task.
#[derive(Debug)]
pub enum WithdrawalOutcome {
    Disabled,
    Submitted(TransactionSignature),
    Failed(WithdrawalError),
}

/// What the agent did before shutting down.
#[derive(Debug)]
pub struct AgentReport {
    pub account: Pubkey,
    pub withdrawal: WithdrawalOutcome,
    /// Balance updates delivered by the monitor.
    pub balance_updates: u64,
    /// Sum of observed balance increases.
    pub deposited_lamports: u64,
}

/// Counters accumulated by the monitor task.
#[derive(Debug, Default)]
struct DepositTally {
    updates: u64,
    deposited_lamports: u64,
}

/// Custody agent wiring.
pub struct CustodyAgent {
    config: AgentConfig,
    rpc: Arc<dyn RpcGateway>,
    subscriptions: Arc<dyn SubscriptionGateway>,
}

impl CustodyAgent {
    pub fn new(
        config: AgentConfig,
        rpc: Arc<dyn RpcGateway>,
        subscriptions: Arc<dyn SubscriptionGateway>,
    ) -> Self {
        Self {
            config,
            rpc,
            subscriptions,
        }
    }

    /// Generate a fresh identity and run until `shutdown` fires.
    pub async fn run(self, shutdown: ShutdownSignal) -> Result<AgentReport, AgentError> {
        let keypair = Keypair::generate()?;
        tracing::info!(account = %keypair.pubkey(), "Generated custody identity");
        self.run_with_identity(Arc::new(keypair), shutdown).await
    }

    /// Run with an existing identity until `shutdown` fires or the monitor fails.
    pub async fn run_with_identity(
        self,
        keypair: Arc<Keypair>,
        mut shutdown: ShutdownSignal,
    ) -> Result<AgentReport, AgentError> {
        let account = keypair.pubkey();
        let withdrawal_task = self.spawn_withdrawal(keypair)?;

        let monitor_result = if self.config.monitor.enabled {
            let monitor = DepositMonitor::new(
                self.subscriptions.clone(),
                account,
                self.config.network.commitment,
                self.config.monitor.clone(),
            );
            let handle = monitor.stop_handle();
            let rpc = self.rpc.clone();
            let commitment = self.config.network.commitment;
            let mut monitor_task = tokio::spawn(async move {
                let mut tracker = match rpc.fetch_balance(account, commitment).await {
                    Ok(lamports) => {
                        tracing::info!(account = %account, lamports, "Starting balance");
                        BalanceTracker::with_balance(lamports)
                    }
                    Err(e) => {
                        tracing::warn!(
                            account = %account,
                            error = %e,
                            "Starting balance unavailable"
                        );
                        BalanceTracker::new()
                    }
                };
                let mut tally = DepositTally::default();
                let result = monitor
                    .run(|event| {
                        if let MonitorEvent::Balance(update) = event {
                            tally.updates += 1;
                            if let BalanceChange::Deposit { lamports } =
                                process_balance_update(&update, &mut tracker)
                            {
                                tally.deposited_lamports += lamports;
                            }
                        }
                    })
                    .await;
                (result, tally)
            });

            let finished = tokio::select! {
                _ = shutdown.recv() => None,
                joined = &mut monitor_task => Some(joined),
            };
            let joined = match finished {
                Some(joined) => joined,
                None => {
                    tracing::info!("Shutdown requested, stopping deposit monitor");
                    handle.stop();
                    monitor_task.await
                }
            };
            Some(joined.map_err(|_| AgentError::TaskPanicked("deposit monitor"))?)
        } else {
            tracing::info!("Deposit monitor disabled");
            shutdown.recv().await;
            None
        };

        let withdrawal = match withdrawal_task {
            Some(task) => task
                .await
                .map_err(|_| AgentError::TaskPanicked("withdrawal"))?,
            None => WithdrawalOutcome::Disabled,
        };

        let tally = match monitor_result {
            Some((Ok(()), tally)) => tally,
            Some((Err(e), _)) => {
                if let WithdrawalOutcome::Submitted(signature) = &withdrawal {
                    tracing::info!(
                        signature = %signature,
                        "Withdrawal had been submitted before monitor failure"
                    );
                }
                return Err(e.into());
            }
            None => DepositTally::default(),
        };

        tracing::info!(
            account = %account,
            balance_updates = tally.updates,
            deposited_lamports = tally.deposited_lamports,
            "Agent stopped"
        );
        Ok(AgentReport {
            account,
            withdrawal,
            balance_updates: tally.updates,
            deposited_lamports: tally.deposited_lamports,
        })
    }

    fn spawn_withdrawal(
        &self,
        keypair: Arc<Keypair>,
    ) -> Result<Option<JoinHandle<WithdrawalOutcome>>, AgentError> {
        let settings = &self.config.withdrawal;
        if !settings.enabled {
            tracing::info!("Withdrawal disabled");
            return Ok(None);
        }

        let destination: Pubkey = settings.destination.parse().map_err(|e: KeyError| {
            ConfigError::Validation(vec![ValidationError {
                field: "withdrawal.destination",
                message: e.to_string(),
            }])
        })?;
        let lamports = settings.amount_lamports;
        let executor = WithdrawalExecutor::from_config(&self.config.network, settings);
        let rpc = self.rpc.clone();

        Ok(Some(tokio::spawn(async move {
            match executor.execute(rpc.as_ref(), &keypair, destination, lamports).await {
                Ok(signature) => WithdrawalOutcome::Submitted(signature),
                Err(e) => WithdrawalOutcome::Failed(e),
            }
        })))
    }
}
