//! Websocket account subscriptions.
//!
//! # Responsibilities
//! - Open a websocket connection per subscription
//! - Send `accountSubscribe` and wait for the subscription id
//! - Yield `accountNotification` payloads for that id
//! - Send `accountUnsubscribe` and close the socket exactly once
//!
//! # Data Flow
//! ```text
//! subscribe_to_account ─▶ connect ─▶ accountSubscribe ─▶ ack (subscription id)
//!                                                          │
//!          receive_next ◀── accountNotification frames ◀───┘
//!          close ─▶ accountUnsubscribe ─▶ close frame
//! ```

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

use crate::blockchain::gateway::{AccountSubscription, RawNotification, SubscriptionGateway};
use crate::blockchain::keys::Pubkey;
use crate::blockchain::types::{Commitment, GatewayError, GatewayResult};
use crate::config::NetworkConfig;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

#[derive(Debug, Deserialize)]
struct PubsubMessage {
    id: Option<u64>,
    result: Option<Value>,
    error: Option<PubsubError>,
    method: Option<String>,
    params: Option<NotificationParams>,
}

#[derive(Debug, Deserialize)]
struct PubsubError {
    code: i64,
    message: String,
}

#[derive(Debug, Deserialize)]
struct NotificationParams {
    subscription: u64,
    result: Value,
}

fn transport(e: impl std::fmt::Display) -> GatewayError {
    GatewayError::Transport(e.to_string())
}

/// Extract the notification payload if `text` is an account notification for `subscription_id`.
fn parse_notification(text: &str, subscription_id: u64) -> GatewayResult<Option<RawNotification>> {
    let msg: PubsubMessage =
        serde_json::from_str(text).map_err(|e| GatewayError::Decode(e.to_string()))?;

    if msg.method.as_deref() != Some("accountNotification") {
        return Ok(None);
    }
    match msg.params {
        Some(params) if params.subscription == subscription_id => {
            Ok(Some(RawNotification(params.result)))
        }
        _ => Ok(None),
    }
}

/// Subscription gateway over the node's websocket endpoint.
#[derive(Debug, Clone)]
pub struct PubsubClient {
    ws_url: String,
    timeout_duration: Duration,
    next_id: Arc<AtomicU64>,
}

impl PubsubClient {
    pub fn new(config: &NetworkConfig) -> GatewayResult<Self> {
        let url: url::Url = config.ws_url.parse().map_err(|e| {
            GatewayError::Transport(format!("Invalid websocket URL '{}': {}", config.ws_url, e))
        })?;
        if !matches!(url.scheme(), "ws" | "wss") {
            return Err(GatewayError::Transport(format!(
                "Websocket URL must use ws:// or wss://, got '{}'",
                config.ws_url
            )));
        }

        Ok(Self {
            ws_url: config.ws_url.clone(),
            timeout_duration: Duration::from_secs(config.rpc_timeout_secs),
            next_id: Arc::new(AtomicU64::new(1)),
        })
    }

    async fn await_ack(stream: &mut WsStream, request_id: u64) -> GatewayResult<u64> {
        while let Some(frame) = stream.next().await {
            match frame.map_err(transport)? {
                Message::Text(text) => {
                    let Ok(msg) = serde_json::from_str::<PubsubMessage>(text.as_str()) else {
                        continue;
                    };
                    if msg.id != Some(request_id) {
                        continue;
                    }
                    if let Some(err) = msg.error {
                        return Err(GatewayError::Rejected {
                            code: err.code,
                            message: err.message,
                        });
                    }
                    return msg.result.as_ref().and_then(Value::as_u64).ok_or_else(|| {
                        GatewayError::Decode("subscription ack without numeric id".to_string())
                    });
                }
                Message::Ping(data) => stream.send(Message::Pong(data)).await.map_err(transport)?,
                Message::Close(_) => return Err(GatewayError::SubscriptionClosed),
                _ => {}
            }
        }
        Err(GatewayError::SubscriptionClosed)
    }
}

#[async_trait]
impl SubscriptionGateway for PubsubClient {
    async fn subscribe_to_account(
        &self,
        account: Pubkey,
        commitment: Commitment,
    ) -> GatewayResult<Box<dyn AccountSubscription>> {
        let secs = self.timeout_duration.as_secs();
        let (mut stream, _) = timeout(self.timeout_duration, connect_async(self.ws_url.as_str()))
            .await
            .map_err(|_| GatewayError::Timeout(secs))?
            .map_err(transport)?;

        let request_id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let request = json!({
            "jsonrpc": "2.0",
            "id": request_id,
            "method": "accountSubscribe",
            "params": [
                account.to_string(),
                { "encoding": "base64", "commitment": commitment.as_str() }
            ],
        });
        stream
            .send(Message::Text(request.to_string().into()))
            .await
            .map_err(transport)?;

        let ack = Self::await_ack(&mut stream, request_id);
        let subscription_id = timeout(self.timeout_duration, ack)
            .await
            .map_err(|_| GatewayError::Timeout(secs))??;

        tracing::debug!(
            account = %account,
            subscription_id,
            commitment = %commitment,
            "Account subscription acknowledged"
        );

        Ok(Box::new(WsAccountSubscription {
            stream,
            subscription_id,
            next_id: self.next_id.clone(),
            timeout_duration: self.timeout_duration,
            closed: false,
        }))
    }
}

/// One websocket connection carrying one account subscription.
struct WsAccountSubscription {
    stream: WsStream,
    subscription_id: u64,
    next_id: Arc<AtomicU64>,
    timeout_duration: Duration,
    closed: bool,
}

#[async_trait]
impl AccountSubscription for WsAccountSubscription {
    async fn receive_next(&mut self) -> GatewayResult<RawNotification> {
        if self.closed {
            return Err(GatewayError::SubscriptionClosed);
        }
        loop {
            let frame = self
                .stream
                .next()
                .await
                .ok_or(GatewayError::SubscriptionClosed)?
                .map_err(transport)?;

            match frame {
                Message::Text(text) => {
                    let parsed = parse_notification(text.as_str(), self.subscription_id)?;
                    if let Some(notification) = parsed {
                        return Ok(notification);
                    }
                }
                Message::Ping(data) => {
                    self.stream.send(Message::Pong(data)).await.map_err(transport)?;
                }
                Message::Close(_) => return Err(GatewayError::SubscriptionClosed),
                _ => {}
            }
        }
    }

    async fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;

        let request = json!({
            "jsonrpc": "2.0",
            "id": self.next_id.fetch_add(1, Ordering::Relaxed),
            "method": "accountUnsubscribe",
            "params": [self.subscription_id],
        });
        let unsubscribe = self.stream.send(Message::Text(request.to_string().into()));
        match timeout(self.timeout_duration, unsubscribe).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => tracing::debug!(error = %e, "accountUnsubscribe not sent"),
            Err(_) => tracing::debug!("accountUnsubscribe timed out"),
        }
        let _ = timeout(self.timeout_duration, self.stream.close(None)).await;

        tracing::debug!(subscription_id = self.subscription_id, "Account subscription closed");
    }
}
