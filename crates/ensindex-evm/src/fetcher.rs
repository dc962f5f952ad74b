//! Per-header log fetching via `eth_getLogs`.
//!
//! Logs are filtered by the header's block hash rather than its number, so
//! a header row always maps to exactly the logs of the block it names.

use std::sync::Arc;

use alloy_primitives::{Address, B256};
use serde::{Deserialize, Serialize};

use ensindex_core::error::IndexError;
use ensindex_core::repo::Header;

use crate::rpc::{ChainClient, LogFilter, RpcError};

/// A raw EVM log as returned by `eth_getLogs`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawLog {
    pub address: String,
    pub topics: Vec<String>,
    pub data: String,
    #[serde(rename = "blockNumber")]
    pub block_number: String,
    #[serde(rename = "blockHash")]
    pub block_hash: String,
    #[serde(rename = "transactionHash")]
    pub tx_hash: String,
    #[serde(rename = "logIndex")]
    pub log_index: String,
    pub removed: Option<bool>,
}

impl RawLog {
    /// Block-relative log index as u64.
    pub fn log_index_u64(&self) -> u64 {
        parse_hex_u64(&self.log_index)
    }

    /// topics[0], if present and well-formed.
    pub fn topic0(&self) -> Option<B256> {
        parse_b256(self.topics.first()?)
    }

    /// All topics as 32-byte values; fails on malformed hex.
    pub fn topics_b256(&self) -> Result<Vec<B256>, String> {
        self.topics
            .iter()
            .map(|t| parse_b256(t).ok_or_else(|| format!("malformed topic: {t}")))
            .collect()
    }

    /// The data payload as raw bytes.
    pub fn data_bytes(&self) -> Result<Vec<u8>, String> {
        let hex_str = self.data.strip_prefix("0x").unwrap_or(&self.data);
        hex::decode(hex_str).map_err(|e| format!("malformed log data: {e}"))
    }

    /// `true` if this log was flagged removed by the node.
    pub fn is_removed(&self) -> bool {
        self.removed.unwrap_or(false)
    }
}

/// Parse a hex-encoded string (with or without `0x`) to u64.
pub fn parse_hex_u64(s: &str) -> u64 {
    let s = s.strip_prefix("0x").unwrap_or(s);
    u64::from_str_radix(s, 16).unwrap_or(0)
}

fn parse_b256(s: &str) -> Option<B256> {
    let hex_str = s.strip_prefix("0x").unwrap_or(s);
    if hex_str.len() != 64 {
        return None;
    }
    let bytes = hex::decode(hex_str).ok()?;
    Some(B256::from_slice(&bytes))
}

/// Fetches the logs of one header for an address + topic0 filter set.
#[derive(Clone)]
pub struct LogFetcher {
    client: Arc<dyn ChainClient>,
}

impl LogFetcher {
    pub fn new(client: Arc<dyn ChainClient>) -> Self {
        Self { client }
    }

    /// Every log in the header's block matching the filter, in emission
    /// order (ascending block-relative log index).
    pub async fn fetch(
        &self,
        addresses: &[Address],
        topic0: &[B256],
        header: &Header,
    ) -> Result<Vec<RawLog>, IndexError> {
        let filter = LogFilter {
            block_hash: header.hash.clone(),
            addresses: addresses.to_vec(),
            topic0: topic0.to_vec(),
        };
        let mut logs = self.client.get_logs(&filter).await.map_err(|e| match &e {
            RpcError::Rpc(rpc) if is_unknown_block(&rpc.message) => IndexError::NoSuchBlock {
                block_hash: header.hash.clone(),
            },
            _ => IndexError::FetchFailed(e.to_string()),
        })?;

        logs.retain(|l| !l.is_removed());
        logs.sort_by_key(RawLog::log_index_u64);
        Ok(logs)
    }
}

fn is_unknown_block(message: &str) -> bool {
    let m = message.to_ascii_lowercase();
    m.contains("unknown block") || m.contains("not found") || m.contains("cannot be found")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rpc::JsonRpcError;
    use async_trait::async_trait;
    use std::sync::Mutex;

    fn raw(log_index: &str) -> RawLog {
        RawLog {
            address: "0x314159265dd8dbb310642f98f50c066173c1259b".into(),
            topics: vec![format!("0x{}", "ab".repeat(32))],
            data: "0x".into(),
            block_number: "0x64".into(),
            block_hash: format!("0x{}", "11".repeat(32)),
            tx_hash: format!("0x{}", "22".repeat(32)),
            log_index: log_index.into(),
            removed: None,
        }
    }

    struct ScriptedClient {
        result: Mutex<Option<Result<Vec<RawLog>, RpcError>>>,
    }

    #[async_trait]
    impl ChainClient for ScriptedClient {
        async fn get_logs(&self, _filter: &LogFilter) -> Result<Vec<RawLog>, RpcError> {
            self.result.lock().unwrap().take().unwrap()
        }

        async fn eth_call(
            &self,
            _to: Address,
            _data: &[u8],
            _block: i64,
        ) -> Result<Vec<u8>, RpcError> {
            unimplemented!("not used here")
        }
    }

    fn header() -> Header {
        Header {
            id: 1,
            block_number: 100,
            hash: format!("0x{}", "11".repeat(32)),
        }
    }

    #[test]
    fn hex_helpers() {
        assert_eq!(parse_hex_u64("0x1"), 1);
        assert_eq!(parse_hex_u64("0xff"), 255);
        let log = raw("0x5");
        assert_eq!(log.log_index_u64(), 5);
        assert!(log.topic0().is_some());
        assert!(log.data_bytes().unwrap().is_empty());
    }

    #[tokio::test]
    async fn fetch_sorts_by_log_index() {
        let client = Arc::new(ScriptedClient {
            result: Mutex::new(Some(Ok(vec![raw("0x3"), raw("0x1"), raw("0x2")]))),
        });
        let fetcher = LogFetcher::new(client);
        let logs = fetcher.fetch(&[], &[], &header()).await.unwrap();
        let indexes: Vec<u64> = logs.iter().map(RawLog::log_index_u64).collect();
        assert_eq!(indexes, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn fetch_drops_removed_logs() {
        let mut removed = raw("0x1");
        removed.removed = Some(true);
        let client = Arc::new(ScriptedClient {
            result: Mutex::new(Some(Ok(vec![removed, raw("0x2")]))),
        });
        let fetcher = LogFetcher::new(client);
        let logs = fetcher.fetch(&[], &[], &header()).await.unwrap();
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].log_index_u64(), 2);
    }

    #[tokio::test]
    async fn unknown_block_maps_to_no_such_block() {
        let client = Arc::new(ScriptedClient {
            result: Mutex::new(Some(Err(RpcError::Rpc(JsonRpcError {
                code: -32000,
                message: "header not found".into(),
                data: None,
            })))),
        });
        let fetcher = LogFetcher::new(client);
        let err = fetcher.fetch(&[], &[], &header()).await.unwrap_err();
        assert!(matches!(err, IndexError::NoSuchBlock { .. }));
    }

    #[tokio::test]
    async fn transport_error_maps_to_fetch_failed() {
        let client = Arc::new(ScriptedClient {
            result: Mutex::new(Some(Err(RpcError::Http("connection refused".into())))),
        });
        let fetcher = LogFetcher::new(client);
        let err = fetcher.fetch(&[], &[], &header()).await.unwrap_err();
        assert!(matches!(err, IndexError::FetchFailed(_)));
        assert!(err.is_retryable());
    }
}
