//! ensindex — ENS domain-record indexer daemon.
//!
//! Follows a registry contract and every resolver it announces,
//! reconstructing the `ens.domain_records` table from their event logs.
//!
//! ```bash
//! ensindex --rpc-url https://mainnet.infura.io/v3/<key> \
//!     --database-url postgresql://localhost/ensindex \
//!     --registry-address 0x314159265dD8dbb310642f98f50C066173C1259b \
//!     --registry-abi ./registry.abi.json \
//!     --starting-block 3327417
//! ```
//!
//! Requires a header-synced database and a reachable eth node.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use alloy_primitives::Address;
use ensindex_evm::{HttpClient, Indexer, RegistryConfig};
use ensindex_storage::PostgresStorage;

/// ENS domain-record indexer.
#[derive(Parser, Debug)]
#[command(name = "ensindex")]
#[command(about = "Index ENS registry and resolver events into domain records", long_about = None)]
struct Config {
    /// Ethereum JSON-RPC endpoint
    #[arg(long, env = "ETH_RPC_URL")]
    rpc_url: String,

    /// PostgreSQL connection URL
    #[arg(long, env = "DATABASE_URL")]
    database_url: String,

    /// Registry contract address
    #[arg(long, default_value = "0x314159265dD8dbb310642f98f50C066173C1259b")]
    registry_address: String,

    /// Path to the registry ABI JSON file
    #[arg(long)]
    registry_abi: String,

    /// First block to watch the registry from
    #[arg(long, default_value = "3327417")]
    starting_block: i64,

    /// Network tag stored with contract descriptors
    #[arg(long, default_value = "mainnet")]
    network: String,

    /// Seconds between indexing passes
    #[arg(long, default_value = "30")]
    poll_interval_secs: u64,

    /// Run a single pass and exit
    #[arg(long)]
    once: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(true)
        .init();

    let registry_address: Address = config
        .registry_address
        .parse()
        .with_context(|| format!("invalid registry address '{}'", config.registry_address))?;
    let registry_abi = std::fs::read_to_string(&config.registry_abi)
        .with_context(|| format!("reading registry ABI from '{}'", config.registry_abi))?;

    tracing::info!(rpc = %config.rpc_url, "starting ensindex");
    tracing::info!(registry = %config.registry_address, from_block = config.starting_block, "watching registry");

    let storage = Arc::new(
        PostgresStorage::connect(&config.database_url)
            .await
            .context("connecting to postgres")?,
    );
    let client = Arc::new(HttpClient::default_for(&config.rpc_url));

    let mut indexer = Indexer::new(
        RegistryConfig {
            address: registry_address,
            abi: registry_abi,
            starting_block: config.starting_block,
            network: config.network,
        },
        client,
        storage.clone(),
        storage,
    )
    .await
    .context("initializing indexer")?;

    let poll_interval = Duration::from_secs(config.poll_interval_secs);
    loop {
        match indexer.execute().await {
            Ok(()) => {
                tracing::debug!(
                    registry_cursor = indexer.registry_cursor(),
                    resolvers = indexer.resolver_addresses().len(),
                    "pass complete"
                );
                if config.once {
                    return Ok(());
                }
            }
            Err(e) if e.is_fatal() => {
                tracing::error!(error = %e, "unrecoverable error");
                anyhow::bail!(e);
            }
            Err(e) if e.is_retryable() => {
                tracing::warn!(error = %e, "pass aborted; retrying next tick");
                if config.once {
                    anyhow::bail!(e);
                }
            }
            Err(e) => {
                // Data-model mismatches and missing coverage need an
                // operator; keep polling so healthy contracts stay current.
                tracing::error!(error = %e, "pass aborted; operator attention required");
                if config.once {
                    anyhow::bail!(e);
                }
            }
        }
        tokio::time::sleep(poll_interval).await;
    }
}
