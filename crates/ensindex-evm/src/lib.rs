//! ensindex-evm — the EVM wire layer and the two-tier indexing loop.
//!
//! ```text
//! HttpClient (JSON-RPC + retry)
//!     ├── LogFetcher        eth_getLogs by header hash
//!     └── InterfaceGetter   supportsInterface probes → resolver ABI
//! AbiParser                 ABI JSON → EventCatalog
//! LogDecoder                raw logs → per-event DecodedEvent batches
//! Indexer                   registry pass → resolver discovery → resolver pass
//! ```

pub mod abi;
pub mod decoder;
pub mod fetcher;
pub mod getter;
pub mod indexer;
pub mod rpc;

pub use abi::AbiParser;
pub use decoder::LogDecoder;
pub use fetcher::{LogFetcher, RawLog};
pub use getter::InterfaceGetter;
pub use indexer::{Indexer, RegistryConfig};
pub use rpc::{ChainClient, HttpClient, LogFilter, RetryConfig, RpcError};
