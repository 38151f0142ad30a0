//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Shutdown::trigger
//!
//! Shutdown (shutdown.rs):
//!     trigger → every ShutdownSignal resolves
//!             → deposit monitor releases its subscription
//!             → agent joins its tasks and returns
//! ```
//!
//! # Design Decisions
//! - One broadcast coordinator per process
//! - An in-flight withdrawal is not cancelled once submitted; shutdown waits for it

pub mod shutdown;
pub mod signals;

pub use shutdown::{Shutdown, ShutdownSignal};
