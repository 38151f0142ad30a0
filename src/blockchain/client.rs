//! JSON-RPC client with timeout, failover, and error mapping.
//!
//! # Responsibilities
//! - POST JSON-RPC requests to the configured endpoint(s)
//! - Fetch the latest blockhash and account balances, submit signed transactions
//! - Distinguish node rejections from transport failures
//! - Provide a health probe for startup diagnostics
//!
//! Reads fail over across endpoints. `sendTransaction` goes to the primary
//! endpoint only: a timed-out submission may still land, so resending it is
//! left to the caller.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;

use crate::blockchain::gateway::RpcGateway;
use crate::blockchain::keys::{Hash, Pubkey};
use crate::blockchain::transaction::SignedTransaction;
use crate::blockchain::types::{
    Commitment, GatewayError, GatewayResult, RecentBlockhash, SendOptions, TransactionSignature,
};
use crate::config::NetworkConfig;
use crate::observability::metrics;

#[derive(Debug, Deserialize)]
struct RpcResponse<T> {
    result: Option<T>,
    error: Option<RpcErrorObject>,
}

#[derive(Debug, Deserialize)]
struct RpcErrorObject {
    code: i64,
    message: String,
}

#[derive(Debug, Deserialize)]
struct WithContext<T> {
    value: T,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BlockhashValue {
    blockhash: Hash,
    last_valid_block_height: u64,
}

/// Extract `result` from a JSON-RPC response body, mapping `error` to a rejection.
fn parse_response<T: DeserializeOwned>(body: Value) -> GatewayResult<T> {
    let response: RpcResponse<T> =
        serde_json::from_value(body).map_err(|e| GatewayError::Decode(e.to_string()))?;

    if let Some(err) = response.error {
        return Err(GatewayError::Rejected {
            code: err.code,
            message: err.message,
        });
    }
    response
        .result
        .ok_or_else(|| GatewayError::Decode("response has neither result nor error".to_string()))
}

/// JSON-RPC client over HTTP with failover endpoints.
#[derive(Clone)]
pub struct RpcClient {
    /// Primary endpoint followed by failovers.
    endpoints: Vec<url::Url>,
    http: reqwest::Client,
    config: NetworkConfig,
    timeout_duration: Duration,
    next_id: Arc<AtomicU64>,
}

impl RpcClient {
    /// Create a new client.
    ///
    /// Invalid failover URLs are skipped with a warning; an invalid primary URL is an error.
    pub fn new(config: NetworkConfig) -> GatewayResult<Self> {
        let timeout_duration = Duration::from_secs(config.rpc_timeout_secs);

        let primary: url::Url = config.rpc_url.parse().map_err(|e| {
            GatewayError::Rpc(format!("Invalid RPC URL '{}': {}", config.rpc_url, e))
        })?;
        let mut endpoints = vec![primary];
        for url_str in &config.failover_urls {
            match url_str.parse() {
                Ok(url) => endpoints.push(url),
                Err(_) => tracing::warn!(url = %url_str, "Ignoring invalid failover RPC URL"),
            }
        }

        let http = reqwest::Client::builder()
            .timeout(timeout_duration)
            .build()
            .map_err(|e| GatewayError::Rpc(format!("Failed to build HTTP client: {}", e)))?;

        tracing::info!(
            rpc_url = %config.rpc_url,
            failovers = endpoints.len() - 1,
            "RPC client initialized"
        );

        Ok(Self {
            endpoints,
            http,
            config,
            timeout_duration,
            next_id: Arc::new(AtomicU64::new(1)),
        })
    }

    /// Issue a read, trying each endpoint in order.
    async fn call<T: DeserializeOwned>(
        &self,
        method: &'static str,
        params: Value,
    ) -> GatewayResult<T> {
        self.call_on(&self.endpoints, method, params).await
    }

    /// Issue a call against `endpoints` in order.
    ///
    /// A node rejection is authoritative and returned immediately; only
    /// transport failures and timeouts fall through to the next endpoint.
    async fn call_on<T: DeserializeOwned>(
        &self,
        endpoints: &[url::Url],
        method: &'static str,
        params: Value,
    ) -> GatewayResult<T> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let body = json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": method,
            "params": params,
        });

        let mut last_error = None;
        for (i, endpoint) in endpoints.iter().enumerate() {
            let fut = self.http.post(endpoint.clone()).json(&body).send();
            let response = match timeout(self.timeout_duration, fut).await {
                Ok(Ok(response)) => response,
                Ok(Err(e)) => {
                    tracing::warn!(
                        endpoint_idx = i,
                        method,
                        error = %e,
                        "RPC error, trying next endpoint"
                    );
                    last_error = Some(GatewayError::Rpc(e.to_string()));
                    continue;
                }
                Err(_) => {
                    tracing::warn!(endpoint_idx = i, method, "RPC timeout, trying next endpoint");
                    last_error = Some(GatewayError::Timeout(self.config.rpc_timeout_secs));
                    continue;
                }
            };

            let payload: Value = match response.json().await {
                Ok(v) => v,
                Err(e) => {
                    tracing::warn!(endpoint_idx = i, method, error = %e, "Unreadable RPC response");
                    last_error = Some(GatewayError::Decode(e.to_string()));
                    continue;
                }
            };
            return parse_response(payload);
        }

        Err(match last_error {
            Some(e) if endpoints.len() == 1 => e,
            Some(e) => GatewayError::Rpc(format!("All RPC endpoints failed for {}: {}", method, e)),
            None => GatewayError::Rpc(format!("All RPC endpoints failed for {}", method)),
        })
    }

    /// Check if the node reports itself healthy.
    pub async fn is_healthy(&self) -> bool {
        let healthy = self.call::<String>("getHealth", json!([])).await.is_ok();
        metrics::record_rpc_health(healthy);
        healthy
    }
}

#[async_trait]
impl RpcGateway for RpcClient {
    async fn fetch_recent_blockhash(
        &self,
        commitment: Commitment,
    ) -> GatewayResult<RecentBlockhash> {
        let result: WithContext<BlockhashValue> = self
            .call(
                "getLatestBlockhash",
                json!([{ "commitment": commitment.as_str() }]),
            )
            .await?;
        Ok(RecentBlockhash {
            blockhash: result.value.blockhash,
            last_valid_block_height: result.value.last_valid_block_height,
        })
    }

    async fn fetch_balance(&self, account: Pubkey, commitment: Commitment) -> GatewayResult<u64> {
        let result: WithContext<u64> = self
            .call(
                "getBalance",
                json!([account.to_string(), { "commitment": commitment.as_str() }]),
            )
            .await?;
        Ok(result.value)
    }

    async fn submit_transaction(
        &self,
        transaction: &SignedTransaction,
        options: SendOptions,
    ) -> GatewayResult<TransactionSignature> {
        self.call_on(
            &self.endpoints[..1],
            "sendTransaction",
            json!([
                transaction.to_base64(),
                {
                    "encoding": "base64",
                    "skipPreflight": options.skip_preflight,
                    "preflightCommitment": options.preflight_commitment.as_str(),
                }
            ]),
        )
        .await
    }
}

impl std::fmt::Debug for RpcClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RpcClient")
            .field("rpc_url", &self.config.rpc_url)
            .field("endpoints", &self.endpoints.len())
            .field("timeout_secs", &self.config.rpc_timeout_secs)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blockchain::keys::Keypair;
    use crate::blockchain::transaction::{Instruction, Transaction};
    use tokio::io::AsyncReadExt;
    use tokio::net::TcpListener;

    fn test_config() -> NetworkConfig {
        NetworkConfig {
            rpc_url: "http://127.0.0.1:1".to_string(),
            rpc_timeout_secs: 2,
            ..NetworkConfig::default()
        }
    }

    #[test]
    fn test_parse_blockhash_response() {
        let body = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "result": {
                "context": { "slot": 2792 },
                "value": {
                    "blockhash": "EkSnNWid2cvwEVnVx9aBqawnmiCNiDgp3gUdkDPTKN1N",
                    "lastValidBlockHeight": 3090
                }
            }
        });
        let parsed: WithContext<BlockhashValue> = parse_response(body).unwrap();
        assert_eq!(parsed.value.last_valid_block_height, 3090);
        assert_eq!(
            parsed.value.blockhash.to_string(),
            "EkSnNWid2cvwEVnVx9aBqawnmiCNiDgp3gUdkDPTKN1N"
        );
    }

    #[test]
    fn test_parse_rejection() {
        let body = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "error": {
                "code": -32002,
                "message": "Transaction simulation failed: Blockhash not found",
                "data": { "err": "BlockhashNotFound" }
            }
        });
        let err = parse_response::<String>(body).unwrap_err();
        assert_eq!(
            err,
            GatewayError::Rejected {
                code: -32002,
                message: "Transaction simulation failed: Blockhash not found".to_string(),
            }
        );
    }

    #[test]
    fn test_parse_balance_response() {
        let body = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "result": { "context": { "slot": 1 }, "value": 100_000_500u64 }
        });
        let parsed: WithContext<u64> = parse_response(body).unwrap();
        assert_eq!(parsed.value, 100_000_500);
    }

    #[test]
    fn test_parse_missing_result() {
        let err = parse_response::<String>(json!({ "jsonrpc": "2.0", "id": 1 })).unwrap_err();
        assert!(matches!(err, GatewayError::Decode(_)));
    }

    #[test]
    fn test_invalid_primary_url() {
        let config = NetworkConfig {
            rpc_url: "not a url".to_string(),
            ..NetworkConfig::default()
        };
        assert!(RpcClient::new(config).is_err());
    }

    #[tokio::test]
    async fn test_rpc_failover() {
        let mut config = test_config();
        config.failover_urls.push("http://127.0.0.1:2".to_string());
        config.failover_urls.push("::invalid::".to_string());

        let client = RpcClient::new(config).unwrap();
        assert_eq!(client.endpoints.len(), 2);

        // Both endpoints refuse connections.
        let result = client.fetch_recent_blockhash(Commitment::Finalized).await;
        assert!(result.unwrap_err().to_string().contains("All RPC endpoints failed"));
        assert!(!client.is_healthy().await);
    }

    #[tokio::test]
    async fn test_send_transaction_stays_on_primary() {
        let primary = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let failover = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let config = NetworkConfig {
            rpc_url: format!("http://{}", primary.local_addr().unwrap()),
            failover_urls: vec![format!("http://{}", failover.local_addr().unwrap())],
            rpc_timeout_secs: 1,
            ..NetworkConfig::default()
        };

        // Primary reads the request and never answers.
        let stalled = tokio::spawn(async move {
            let (mut socket, _) = primary.accept().await.unwrap();
            let mut buf = vec![0u8; 8192];
            let _ = socket.read(&mut buf).await;
            tokio::time::sleep(Duration::from_secs(30)).await;
            drop((socket, primary));
        });

        let failover_hits = Arc::new(AtomicU64::new(0));
        let hits = failover_hits.clone();
        let backup = tokio::spawn(async move {
            loop {
                let conn = failover.accept().await;
                hits.fetch_add(1, Ordering::SeqCst);
                drop(conn);
            }
        });

        let client = RpcClient::new(config).unwrap();
        let signer = Keypair::from_secret_bytes(&[1u8; 32]);
        let transfer = Instruction::system_transfer(signer.pubkey(), Pubkey::new([2u8; 32]), 10);
        let signed = Transaction::new(&[transfer], Hash::new([4u8; 32]), signer.pubkey())
            .unwrap()
            .sign(&signer)
            .unwrap();

        let result = client
            .submit_transaction(&signed, SendOptions::with_preflight(Commitment::Finalized))
            .await;
        assert!(result.is_err());
        assert_eq!(failover_hits.load(Ordering::SeqCst), 0);

        // Reads still fall through to the failover.
        let read = client.fetch_recent_blockhash(Commitment::Finalized).await;
        assert!(read.is_err());
        assert!(failover_hits.load(Ordering::SeqCst) >= 1);

        stalled.abort();
        backup.abort();
    }
}
