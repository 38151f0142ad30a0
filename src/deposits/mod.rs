//! Deposit monitoring subsystem.
//!
//! # Data Flow
//! ```text
//! SubscriptionGateway (account notifications)
//!     → monitor.rs (subscribe, receive, reconnect, stop)
//!     → types.rs (decode to BalanceUpdateEvent, sequence numbering)
//!     → processor.rs (deposit / debit classification, logging)
//! ```

pub mod monitor;
pub mod processor;
pub mod types;

pub use monitor::{DepositMonitor, MonitorHandle, MonitorState};
pub use processor::{process_balance_update, BalanceChange, BalanceTracker};
pub use types::{BalanceUpdateEvent, MonitorError, MonitorEvent, NotificationDecodeError};
