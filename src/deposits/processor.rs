use tracing::info;

use crate::blockchain::types::format_sol;
use crate::deposits::types::BalanceUpdateEvent;

/// How a balance moved relative to the previous event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BalanceChange {
    /// First observation, nothing to compare against.
    Initial,
    Deposit { lamports: u64 },
    Debit { lamports: u64 },
    Unchanged,
}

/// Classifies consecutive balance events for one account.
#[derive(Debug, Default)]
pub struct BalanceTracker {
    last: Option<u64>,
}

impl BalanceTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from a balance read before the first notification.
    pub fn with_balance(lamports: u64) -> Self {
        Self { last: Some(lamports) }
    }

    /// Last observed balance.
    pub fn balance(&self) -> Option<u64> {
        self.last
    }

    pub fn observe(&mut self, event: &BalanceUpdateEvent) -> BalanceChange {
        let change = match self.last {
            None => BalanceChange::Initial,
            Some(prev) if event.lamports > prev => BalanceChange::Deposit {
                lamports: event.lamports - prev,
            },
            Some(prev) if event.lamports < prev => BalanceChange::Debit {
                lamports: prev - event.lamports,
            },
            Some(_) => BalanceChange::Unchanged,
        };
        self.last = Some(event.lamports);
        change
    }
}

/// Process a delivered balance update.
pub fn process_balance_update(
    event: &BalanceUpdateEvent,
    tracker: &mut BalanceTracker,
) -> BalanceChange {
    let change = tracker.observe(event);
    match change {
        BalanceChange::Initial => info!(
            account = %event.account,
            sequence = event.sequence,
            lamports = event.lamports,
            sol = %format_sol(event.lamports),
            "Initial balance"
        ),
        BalanceChange::Deposit { lamports } => info!(
            account = %event.account,
            sequence = event.sequence,
            amount_lamports = lamports,
            amount_sol = %format_sol(lamports),
            balance_sol = %format_sol(event.lamports),
            "Deposit received"
        ),
        BalanceChange::Debit { lamports } => info!(
            account = %event.account,
            sequence = event.sequence,
            amount_lamports = lamports,
            amount_sol = %format_sol(lamports),
            balance_sol = %format_sol(event.lamports),
            "Balance debited"
        ),
        BalanceChange::Unchanged => info!(
            account = %event.account,
            sequence = event.sequence,
            lamports = event.lamports,
            "Account updated, balance unchanged"
        ),
    }
    change
}
