//! Custody agent library.
//!
//! Generates an in-memory account identity, submits an optional one-shot
//! withdrawal from it, and watches the account for balance changes.

pub mod agent;
pub mod blockchain;
pub mod config;
pub mod deposits;
pub mod lifecycle;
pub mod observability;
pub mod resilience;
pub mod withdrawal;

pub use agent::{AgentError, AgentReport, CustodyAgent};
pub use config::AgentConfig;
pub use lifecycle::Shutdown;
