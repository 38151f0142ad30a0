//! Account subscription monitor.
//!
//! # States
//! ```text
//! Idle ──run──▶ Subscribing ──ack──▶ Streaming ──notification──▶ Streaming
//!                   ▲                    │
//!                   │      stream closed / too many receive errors
//!                   │                    ▼
//!                   └──── backoff ── Reconnecting ── attempts spent ──▶ error
//!
//! any state ──stop()──▶ Closed
//! ```
//!
//! Every opened subscription is closed exactly once before the monitor
//! resubscribes or returns. The attempt budget counts consecutive failed
//! subscribes and is refilled on every acknowledged subscription.

use std::sync::Arc;
use tokio::sync::watch;

use crate::blockchain::gateway::{AccountSubscription, RawNotification, SubscriptionGateway};
use crate::blockchain::keys::Pubkey;
use crate::blockchain::types::{Commitment, GatewayError};
use crate::config::MonitorConfig;
use crate::deposits::types::{
    decode_notification, AccountUpdate, BalanceUpdateEvent, MonitorError, MonitorEvent,
    NotificationDecodeError,
};
use crate::lifecycle::{Shutdown, ShutdownSignal};
use crate::observability::metrics;
use crate::resilience::backoff::ReconnectBackoff;

/// Lifecycle state of a monitor session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorState {
    Idle,
    Subscribing,
    Streaming,
    Reconnecting,
    Closed,
}

/// Control handle for a running monitor.
#[derive(Debug, Clone)]
pub struct MonitorHandle {
    shutdown: Shutdown,
    state: watch::Receiver<MonitorState>,
}

impl MonitorHandle {
    /// Ask the monitor to release its subscription and return. Idempotent.
    pub fn stop(&self) {
        self.shutdown.trigger();
    }

    pub fn state(&self) -> MonitorState {
        *self.state.borrow()
    }
}

/// Drops notifications replayed after a resubscribe.
#[derive(Debug, Default)]
struct ReplayFilter {
    last: Option<AccountUpdate>,
}

impl ReplayFilter {
    /// Returns true if `update` should be delivered, and remembers it.
    fn admit(&mut self, update: AccountUpdate) -> bool {
        if let Some(last) = self.last {
            if let (Some(slot), Some(last_slot)) = (update.slot, last.slot) {
                if slot < last_slot || (slot == last_slot && update.lamports == last.lamports) {
                    return false;
                }
            }
        }
        self.last = Some(update);
        true
    }
}

enum StreamEnd {
    Stopped,
    Lost(GatewayError),
}

/// Watches one account and reports balance updates in arrival order.
pub struct DepositMonitor {
    gateway: Arc<dyn SubscriptionGateway>,
    account: Pubkey,
    commitment: Commitment,
    config: MonitorConfig,
    shutdown: Shutdown,
    stop: ShutdownSignal,
    state: watch::Sender<MonitorState>,
    next_sequence: u64,
    replay: ReplayFilter,
}

impl DepositMonitor {
    pub fn new(
        gateway: Arc<dyn SubscriptionGateway>,
        account: Pubkey,
        commitment: Commitment,
        config: MonitorConfig,
    ) -> Self {
        let shutdown = Shutdown::new();
        let stop = shutdown.subscribe();
        let (state, _) = watch::channel(MonitorState::Idle);

        Self {
            gateway,
            account,
            commitment,
            config,
            shutdown,
            stop,
            state,
            next_sequence: 1,
            replay: ReplayFilter::default(),
        }
    }

    /// Handle for stopping the monitor from another task.
    pub fn stop_handle(&self) -> MonitorHandle {
        MonitorHandle {
            shutdown: self.shutdown.clone(),
            state: self.state.subscribe(),
        }
    }

    /// Run until stopped.
    ///
    /// Returns `Ok(())` after `stop()`, or an error once resubscribing has
    /// failed `max_reconnect_attempts` times in a row.
    pub async fn run<F>(mut self, mut on_event: F) -> Result<(), MonitorError>
    where
        F: FnMut(MonitorEvent) + Send,
    {
        let mut backoff = ReconnectBackoff::from_config(&self.config);
        tracing::info!(
            account = %self.account,
            commitment = %self.commitment,
            "Starting deposit monitor"
        );

        loop {
            self.set_state(MonitorState::Subscribing);
            let subscribed = tokio::select! {
                _ = self.stop.recv() => None,
                result = self.gateway.subscribe_to_account(self.account, self.commitment) => {
                    Some(result)
                }
            };

            let last_error = match subscribed {
                None => break,
                Some(Ok(mut subscription)) => {
                    backoff.reset();
                    self.set_state(MonitorState::Streaming);
                    tracing::info!(account = %self.account, "Account subscription active");

                    let end = self.stream(subscription.as_mut(), &mut on_event).await;
                    subscription.close().await;

                    match end {
                        StreamEnd::Stopped => break,
                        StreamEnd::Lost(e) => e,
                    }
                }
                Some(Err(e)) => {
                    tracing::warn!(account = %self.account, error = %e, "Subscribe failed");
                    metrics::record_monitor_error("subscribe");
                    on_event(MonitorEvent::TransportError(e.clone()));
                    e
                }
            };

            let Some(delay) = backoff.next_delay() else {
                self.set_state(MonitorState::Closed);
                tracing::error!(
                    account = %self.account,
                    attempts = backoff.attempts(),
                    error = %last_error,
                    "Reconnect attempts exhausted"
                );
                return Err(MonitorError::ReconnectExhausted {
                    attempts: backoff.attempts(),
                    last_error,
                });
            };

            self.set_state(MonitorState::Reconnecting);
            metrics::record_reconnect();
            tracing::info!(
                attempt = backoff.attempts(),
                delay_ms = delay.as_millis() as u64,
                "Resubscribing after backoff"
            );
            on_event(MonitorEvent::Reconnecting {
                attempt: backoff.attempts(),
                delay,
            });

            let stopped = tokio::select! {
                _ = self.stop.recv() => true,
                _ = tokio::time::sleep(delay) => false,
            };
            if stopped {
                break;
            }
        }

        self.set_state(MonitorState::Closed);
        tracing::info!(account = %self.account, "Deposit monitor stopped");
        Ok(())
    }

    async fn stream<F>(
        &mut self,
        subscription: &mut dyn AccountSubscription,
        on_event: &mut F,
    ) -> StreamEnd
    where
        F: FnMut(MonitorEvent) + Send,
    {
        let mut consecutive_errors = 0u32;

        loop {
            let received = tokio::select! {
                _ = self.stop.recv() => None,
                result = subscription.receive_next() => Some(result),
            };
            let Some(result) = received else {
                return StreamEnd::Stopped;
            };

            match result {
                Ok(raw) => {
                    consecutive_errors = 0;
                    self.deliver(&raw, on_event);
                }
                Err(GatewayError::Decode(message)) => {
                    consecutive_errors = 0;
                    self.report_decode_error(NotificationDecodeError::Malformed(message), on_event);
                }
                Err(GatewayError::SubscriptionClosed) => {
                    tracing::warn!(account = %self.account, "Subscription closed by remote");
                    return StreamEnd::Lost(GatewayError::SubscriptionClosed);
                }
                Err(e) => {
                    consecutive_errors += 1;
                    metrics::record_monitor_error("transport");
                    tracing::warn!(
                        account = %self.account,
                        error = %e,
                        consecutive = consecutive_errors,
                        "Receive failed"
                    );
                    on_event(MonitorEvent::TransportError(e.clone()));

                    if consecutive_errors >= self.config.max_consecutive_receive_errors {
                        return StreamEnd::Lost(e);
                    }
                }
            }
        }
    }

    /// Decode and emit one notification.
    fn deliver<F>(&mut self, raw: &RawNotification, on_event: &mut F)
    where
        F: FnMut(MonitorEvent),
    {
        let update = match decode_notification(raw) {
            Ok(update) => update,
            Err(e) => {
                self.report_decode_error(e, on_event);
                return;
            }
        };

        if !self.replay.admit(update) {
            tracing::debug!(
                slot = ?update.slot,
                lamports = update.lamports,
                "Dropping replayed notification"
            );
            return;
        }

        let event = BalanceUpdateEvent {
            account: self.account,
            lamports: update.lamports,
            sequence: self.next_sequence,
            slot: update.slot,
        };
        self.next_sequence += 1;

        metrics::record_balance_update(event.lamports);
        tracing::debug!(
            sequence = event.sequence,
            lamports = event.lamports,
            slot = ?event.slot,
            "Balance update"
        );
        on_event(MonitorEvent::Balance(event));
    }

    fn report_decode_error<F>(&self, error: NotificationDecodeError, on_event: &mut F)
    where
        F: FnMut(MonitorEvent),
    {
        metrics::record_monitor_error("decode");
        tracing::warn!(account = %self.account, error = %error, "Skipping malformed notification");
        on_event(MonitorEvent::DecodeError(error));
    }

    fn set_state(&self, state: MonitorState) {
        self.state.send_replace(state);
    }
}
