//! Deposit monitoring types.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::blockchain::gateway::RawNotification;
use crate::blockchain::keys::Pubkey;
use crate::blockchain::types::GatewayError;

/// Normalized balance observation for the watched account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalanceUpdateEvent {
    /// The watched account.
    pub account: Pubkey,
    /// Balance after the update.
    pub lamports: u64,
    /// Local arrival order, strictly increasing from 1.
    pub sequence: u64,
    /// Ledger slot reported with the notification, when present.
    pub slot: Option<u64>,
}

/// A notification payload that could not be turned into a balance.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum NotificationDecodeError {
    #[error("notification payload has no account value")]
    MissingValue,

    #[error("notification payload is malformed: {0}")]
    Malformed(String),
}

/// What the monitor reports to its caller.
#[derive(Debug, Clone, PartialEq)]
pub enum MonitorEvent {
    Balance(BalanceUpdateEvent),
    /// A notification was skipped.
    DecodeError(NotificationDecodeError),
    /// A receive or subscribe call failed.
    TransportError(GatewayError),
    /// The monitor is about to resubscribe after `delay`.
    Reconnecting { attempt: u32, delay: std::time::Duration },
}

/// Terminal monitor failures.
#[derive(Debug, Error)]
pub enum MonitorError {
    #[error("gave up resubscribing after {attempts} attempts: {last_error}")]
    ReconnectExhausted {
        attempts: u32,
        #[source]
        last_error: GatewayError,
    },
}

/// Lamports and slot extracted from one notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccountUpdate {
    pub lamports: u64,
    pub slot: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct NotificationBody {
    context: Option<NotificationContext>,
    value: Option<AccountValue>,
}

#[derive(Debug, Deserialize)]
struct NotificationContext {
    slot: u64,
}

#[derive(Debug, Deserialize)]
struct AccountValue {
    lamports: u64,
}

/// Decode the `result` object of an `accountNotification`.
pub fn decode_notification(
    raw: &RawNotification,
) -> Result<AccountUpdate, NotificationDecodeError> {
    let body: NotificationBody = serde_json::from_value(raw.0.clone())
        .map_err(|e| NotificationDecodeError::Malformed(e.to_string()))?;
    let value = body.value.ok_or(NotificationDecodeError::MissingValue)?;

    Ok(AccountUpdate {
        lamports: value.lamports,
        slot: body.context.map(|c| c.slot),
    })
}
