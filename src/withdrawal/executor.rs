//! Withdrawal pipeline: blockhash, build, sign, submit.
//!
//! # Steps
//! ```text
//! 1. fetch_recent_blockhash(commitment)        → ReferenceUnavailable
//! 2. Instruction::system_transfer(amount, from, to)
//! 3. Transaction::new(instructions, blockhash, payer = from)
//!                                              → MalformedTransaction
//! 4. sign with the payer key only              → SigningKeyMismatch
//! 5. submit_transaction(preflight on, commitment)
//!                                              → SubmissionRejected
//! ```
//!
//! Each call is a single attempt. Retrying with a fresh blockhash is the caller's decision.

use thiserror::Error;

use crate::blockchain::gateway::RpcGateway;
use crate::blockchain::keys::{Keypair, Pubkey};
use crate::blockchain::transaction::{Instruction, SignedTransaction, Transaction, TransactionError};
use crate::blockchain::types::{
    format_sol, Commitment, GatewayError, RecentBlockhash, SendOptions, TransactionSignature,
};
use crate::config::{NetworkConfig, WithdrawalConfig};
use crate::observability::metrics;

/// A value transfer out of the custody account.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferRequest {
    /// Account paying the fee and the amount.
    pub source: Pubkey,
    pub destination: Pubkey,
    pub lamports: u64,
}

/// Distinct failure kinds of a withdrawal attempt.
#[derive(Debug, Error)]
pub enum WithdrawalError {
    #[error("withdrawal {from} -> {to}: recent blockhash unavailable: {cause}")]
    ReferenceUnavailable {
        from: Pubkey,
        to: Pubkey,
        #[source]
        cause: GatewayError,
    },

    #[error("withdrawal {from} -> {to}: malformed transaction: {cause}")]
    MalformedTransaction {
        from: Pubkey,
        to: Pubkey,
        #[source]
        cause: TransactionError,
    },

    #[error("withdrawal {from} -> {to}: signing key {signer} does not match fee payer")]
    SigningKeyMismatch { from: Pubkey, to: Pubkey, signer: Pubkey },

    #[error("withdrawal {from} -> {to}: submission rejected: {reason}")]
    SubmissionRejected {
        from: Pubkey,
        to: Pubkey,
        #[source]
        reason: GatewayError,
    },

    #[error("withdrawal {account} -> {account}: self-transfer refused by configuration")]
    SelfTransfer { account: Pubkey },
}

impl WithdrawalError {
    /// Stable label for metrics and logs.
    pub fn kind(&self) -> &'static str {
        match self {
            WithdrawalError::ReferenceUnavailable { .. } => "reference_unavailable",
            WithdrawalError::MalformedTransaction { .. } => "malformed_transaction",
            WithdrawalError::SigningKeyMismatch { .. } => "signing_key_mismatch",
            WithdrawalError::SubmissionRejected { .. } => "submission_rejected",
            WithdrawalError::SelfTransfer { .. } => "self_transfer",
        }
    }
}

/// Builds, signs, and submits single-instruction transfers.
#[derive(Debug, Clone)]
pub struct WithdrawalExecutor {
    commitment: Commitment,
    reject_self_transfer: bool,
}

impl WithdrawalExecutor {
    pub fn new(commitment: Commitment, reject_self_transfer: bool) -> Self {
        Self {
            commitment,
            reject_self_transfer,
        }
    }

    pub fn from_config(network: &NetworkConfig, withdrawal: &WithdrawalConfig) -> Self {
        Self::new(network.commitment, withdrawal.reject_self_transfer)
    }

    /// Transfer `lamports` from the signer's account to `destination`.
    pub async fn execute(
        &self,
        gateway: &dyn RpcGateway,
        signer: &Keypair,
        destination: Pubkey,
        lamports: u64,
    ) -> Result<TransactionSignature, WithdrawalError> {
        let request = TransferRequest {
            source: signer.pubkey(),
            destination,
            lamports,
        };
        self.execute_request(gateway, &request, signer).await
    }

    /// Run the pipeline for an explicit request. `signer` must hold the key of `request.source`.
    pub async fn execute_request(
        &self,
        gateway: &dyn RpcGateway,
        request: &TransferRequest,
        signer: &Keypair,
    ) -> Result<TransactionSignature, WithdrawalError> {
        tracing::info!(
            from = %request.source,
            to = %request.destination,
            lamports = request.lamports,
            sol = %format_sol(request.lamports),
            "Starting withdrawal"
        );

        let result = self.run(gateway, request, signer).await;
        match &result {
            Ok(signature) => {
                metrics::record_withdrawal("submitted");
                tracing::info!(
                    from = %request.source,
                    to = %request.destination,
                    signature = %signature,
                    "Withdrawal submitted"
                );
            }
            Err(e) => {
                metrics::record_withdrawal(e.kind());
                tracing::error!(kind = e.kind(), error = %e, "Withdrawal failed");
            }
        }
        result
    }

    async fn run(
        &self,
        gateway: &dyn RpcGateway,
        request: &TransferRequest,
        signer: &Keypair,
    ) -> Result<TransactionSignature, WithdrawalError> {
        if self.reject_self_transfer && request.source == request.destination {
            return Err(WithdrawalError::SelfTransfer {
                account: request.source,
            });
        }

        let blockhash = gateway
            .fetch_recent_blockhash(self.commitment)
            .await
            .map_err(|cause| WithdrawalError::ReferenceUnavailable {
                from: request.source,
                to: request.destination,
                cause,
            })?;

        let signed = build_transfer(request, &blockhash, signer)?;

        let signature = gateway
            .submit_transaction(&signed, SendOptions::with_preflight(self.commitment))
            .await
            .map_err(|reason| WithdrawalError::SubmissionRejected {
                from: request.source,
                to: request.destination,
                reason,
            })?;

        let local = TransactionSignature::from(signed.signature());
        if signature != local {
            tracing::warn!(
                returned = %signature,
                expected = %local,
                "Node returned a signature different from the one signed locally"
            );
        }
        Ok(signature)
    }
}

/// Build the transfer envelope and sign it with the payer key.
pub fn build_transfer(
    request: &TransferRequest,
    blockhash: &RecentBlockhash,
    signer: &Keypair,
) -> Result<SignedTransaction, WithdrawalError> {
    let malformed = |cause| WithdrawalError::MalformedTransaction {
        from: request.source,
        to: request.destination,
        cause,
    };

    let instruction =
        Instruction::system_transfer(request.source, request.destination, request.lamports);
    let transaction =
        Transaction::new(&[instruction], blockhash.blockhash, request.source).map_err(malformed)?;

    transaction.sign(signer).map_err(|e| match e {
        TransactionError::SignerMismatch { actual, .. } => WithdrawalError::SigningKeyMismatch {
            from: request.source,
            to: request.destination,
            signer: actual,
        },
        other => malformed(other),
    })
}
