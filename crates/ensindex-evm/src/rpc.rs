//! JSON-RPC 2.0 client for the chain endpoints the indexer consumes:
//! `eth_getLogs` and `eth_call`.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use alloy_primitives::{Address, B256};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use thiserror::Error;

use crate::fetcher::RawLog;

// ─── Wire types ───────────────────────────────────────────────────────────────

/// JSON-RPC request ID — string, number, or null.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RpcId {
    Number(u64),
    String(String),
    Null,
}

/// A JSON-RPC 2.0 request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcRequest {
    pub jsonrpc: String,
    pub method: String,
    pub params: Vec<Value>,
    pub id: RpcId,
}

impl JsonRpcRequest {
    pub fn new(id: u64, method: impl Into<String>, params: Vec<Value>) -> Self {
        Self {
            jsonrpc: "2.0".into(),
            method: method.into(),
            params,
            id: RpcId::Number(id),
        }
    }
}

/// A JSON-RPC 2.0 error object.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcError {
    pub code: i64,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

/// A JSON-RPC 2.0 response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcResponse {
    pub jsonrpc: String,
    pub id: RpcId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
}

impl JsonRpcResponse {
    /// Unwrap the result value or surface the node's error.
    pub fn into_result(self) -> Result<Value, JsonRpcError> {
        if let Some(err) = self.error {
            Err(err)
        } else {
            Ok(self.result.unwrap_or(Value::Null))
        }
    }
}

// ─── Errors ───────────────────────────────────────────────────────────────────

/// Errors from the RPC transport layer.
#[derive(Debug, Error)]
pub enum RpcError {
    /// HTTP request failed (connection refused, timeout, bad status).
    #[error("HTTP error: {0}")]
    Http(String),

    /// JSON-RPC protocol-level error returned by the node.
    #[error("RPC error {}: {}", .0.code, .0.message)]
    Rpc(JsonRpcError),

    /// Response could not be deserialized.
    #[error("deserialization error: {0}")]
    Deserialization(#[from] serde_json::Error),
}

impl RpcError {
    /// Returns `true` if this error is transient at the transport level.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Http(_))
    }
}

// ─── Retry policy ─────────────────────────────────────────────────────────────

/// Exponential backoff configuration for transient failures.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum retry attempts (not counting the first try).
    pub max_retries: u32,
    pub initial_backoff: Duration,
    /// Caps exponential growth.
    pub max_backoff: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_backoff: Duration::from_millis(200),
            max_backoff: Duration::from_secs(10),
        }
    }
}

impl RetryConfig {
    /// Delay before the `attempt`-th retry (1-based); `None` when exhausted.
    pub fn next_delay(&self, attempt: u32) -> Option<Duration> {
        if attempt > self.max_retries {
            return None;
        }
        let base = self.initial_backoff.as_millis() as u64;
        let ms = base.saturating_mul(1 << (attempt - 1).min(16));
        Some(Duration::from_millis(ms).min(self.max_backoff))
    }
}

// ─── ChainClient ──────────────────────────────────────────────────────────────

/// A log filter scoped to a single block.
#[derive(Debug, Clone)]
pub struct LogFilter {
    /// Block hash of the header being processed.
    pub block_hash: String,
    /// Emitting contract addresses.
    pub addresses: Vec<Address>,
    /// Accepted topics[0] values.
    pub topic0: Vec<B256>,
}

/// The chain RPCs the indexer consumes, as an object-safe async trait.
#[async_trait]
pub trait ChainClient: Send + Sync {
    /// `eth_getLogs` restricted to one block by hash.
    async fn get_logs(&self, filter: &LogFilter) -> Result<Vec<RawLog>, RpcError>;

    /// `eth_call` against `to` with raw calldata at `block`
    /// (`block < 0` means latest). Returns the raw return data.
    async fn eth_call(&self, to: Address, data: &[u8], block: i64) -> Result<Vec<u8>, RpcError>;
}

// ─── HttpClient ───────────────────────────────────────────────────────────────

/// HTTP JSON-RPC client with exponential-backoff retry on transport errors.
pub struct HttpClient {
    url: String,
    http: reqwest::Client,
    retry: RetryConfig,
    next_id: AtomicU64,
}

impl HttpClient {
    pub fn new(url: impl Into<String>, retry: RetryConfig) -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .expect("failed to build reqwest client");
        Self {
            url: url.into(),
            http,
            retry,
            next_id: AtomicU64::new(1),
        }
    }

    pub fn default_for(url: impl Into<String>) -> Self {
        Self::new(url, RetryConfig::default())
    }

    async fn send_once(&self, req: &JsonRpcRequest) -> Result<JsonRpcResponse, RpcError> {
        let resp = self
            .http
            .post(&self.url)
            .json(req)
            .send()
            .await
            .map_err(|e| RpcError::Http(e.to_string()))?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            return Err(RpcError::Http(format!("HTTP {status}: {body}")));
        }

        resp.json::<JsonRpcResponse>()
            .await
            .map_err(|e| RpcError::Http(e.to_string()))
    }

    async fn send(&self, method: &str, params: Vec<Value>) -> Result<Value, RpcError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let req = JsonRpcRequest::new(id, method, params);

        let mut attempt = 0u32;
        loop {
            match self.send_once(&req).await {
                Ok(resp) => return resp.into_result().map_err(RpcError::Rpc),
                Err(e) if e.is_retryable() => {
                    attempt += 1;
                    match self.retry.next_delay(attempt) {
                        Some(delay) => {
                            tracing::warn!(
                                attempt,
                                delay_ms = delay.as_millis() as u64,
                                method,
                                error = %e,
                                "retrying RPC request"
                            );
                            tokio::time::sleep(delay).await;
                        }
                        None => return Err(e),
                    }
                }
                Err(e) => return Err(e),
            }
        }
    }
}

#[async_trait]
impl ChainClient for HttpClient {
    async fn get_logs(&self, filter: &LogFilter) -> Result<Vec<RawLog>, RpcError> {
        let addresses: Vec<String> =
            filter.addresses.iter().map(|a| format!("{a:#x}")).collect();
        let topic0: Vec<String> = filter.topic0.iter().map(|t| format!("{t:#x}")).collect();
        let params = vec![json!({
            "blockHash": filter.block_hash,
            "address": addresses,
            "topics": [topic0],
        })];
        let result = self.send("eth_getLogs", params).await?;
        serde_json::from_value(result).map_err(RpcError::Deserialization)
    }

    async fn eth_call(&self, to: Address, data: &[u8], block: i64) -> Result<Vec<u8>, RpcError> {
        let block_tag = if block < 0 {
            Value::String("latest".into())
        } else {
            Value::String(format!("0x{block:x}"))
        };
        let params = vec![
            json!({
                "to": format!("{to:#x}"),
                "data": format!("0x{}", hex::encode(data)),
            }),
            block_tag,
        ];
        let result = self.send("eth_call", params).await?;
        let hex_str: String = serde_json::from_value(result).map_err(RpcError::Deserialization)?;
        let stripped = hex_str.strip_prefix("0x").unwrap_or(&hex_str);
        hex::decode(stripped).map_err(|e| RpcError::Http(format!("invalid call result hex: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_serialization() {
        let req = JsonRpcRequest::new(7, "eth_getLogs", vec![]);
        let json = serde_json::to_string(&req).unwrap();
        assert!(json.contains("\"jsonrpc\":\"2.0\""));
        assert!(json.contains("\"method\":\"eth_getLogs\""));
        assert!(json.contains("\"id\":7"));
    }

    #[test]
    fn response_into_result_surfaces_error() {
        let resp = JsonRpcResponse {
            jsonrpc: "2.0".into(),
            id: RpcId::Number(1),
            result: None,
            error: Some(JsonRpcError {
                code: -32000,
                message: "header not found".into(),
                data: None,
            }),
        };
        let err = resp.into_result().unwrap_err();
        assert_eq!(err.code, -32000);
    }

    #[test]
    fn retry_backoff_doubles_and_caps() {
        let retry = RetryConfig {
            max_retries: 5,
            initial_backoff: Duration::from_millis(100),
            max_backoff: Duration::from_millis(500),
        };
        assert_eq!(retry.next_delay(1).unwrap().as_millis(), 100);
        assert_eq!(retry.next_delay(2).unwrap().as_millis(), 200);
        assert_eq!(retry.next_delay(3).unwrap().as_millis(), 400);
        assert_eq!(retry.next_delay(4).unwrap().as_millis(), 500);
        assert!(retry.next_delay(6).is_none());
    }

    #[test]
    fn rpc_error_retryability() {
        assert!(RpcError::Http("connection refused".into()).is_retryable());
        assert!(!RpcError::Rpc(JsonRpcError {
            code: -32000,
            message: "execution reverted".into(),
            data: None
        })
        .is_retryable());
    }
}
