//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Subscription failure in the deposit monitor:
//!     → backoff.rs (jittered exponential delay, attempt budget)
//!     → resubscribe, or give up once the budget is spent
//! ```
//!
//! # Design Decisions
//! - Timeouts live with each transport call (`tokio::time::timeout`)
//! - Withdrawals are never retried internally; a resubmission is the caller's decision
//! - Reconnects are bounded so a dead endpoint surfaces as an error

pub mod backoff;
