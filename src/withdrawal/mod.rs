//! Withdrawal subsystem.
//!
//! Outbound transfers from the custody account. The executor borrows the
//! keypair for signing and holds no key material of its own.

pub mod executor;

pub use executor::{build_transfer, TransferRequest, WithdrawalError, WithdrawalExecutor};
