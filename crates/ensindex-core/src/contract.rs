//! Watched-contract descriptors.

use alloy_primitives::{Address, B256};

use crate::catalog::EventCatalog;

/// Which tier of the indexer a contract belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContractKind {
    /// The single root registry, configured at init.
    Registry,
    /// A resolver discovered from a `NewResolver` event.
    Resolver,
}

/// An immutable description of one watched contract.
///
/// Built once — at init for the registry, at first sight for a resolver —
/// and never mutated afterwards. The checkpoint event ids and the topic0
/// filter set are derived at construction.
#[derive(Debug, Clone)]
pub struct ContractDescriptor {
    pub kind: ContractKind,
    pub address: Address,
    pub network: String,
    /// The raw ABI JSON the catalog was parsed from.
    pub abi: String,
    pub catalog: EventCatalog,
    /// First block at which this contract is watched.
    pub starting_block: i64,
    /// Checkpoint ids, one per event: `lowercase(name) + "_" + address`.
    event_ids: Vec<String>,
    topic0_set: Vec<B256>,
}

impl ContractDescriptor {
    pub fn new(
        kind: ContractKind,
        address: Address,
        network: impl Into<String>,
        abi: impl Into<String>,
        catalog: EventCatalog,
        starting_block: i64,
    ) -> Self {
        let event_ids = catalog
            .schemas()
            .iter()
            .map(|s| event_id(&s.name, &address))
            .collect();
        let topic0_set = catalog.topic0_set();
        Self {
            kind,
            address,
            network: network.into(),
            abi: abi.into(),
            catalog,
            starting_block,
            event_ids,
            topic0_set,
        }
    }

    /// Checkpoint event ids in catalog order.
    pub fn event_ids(&self) -> &[String] {
        &self.event_ids
    }

    /// topic0 filter values in catalog order.
    pub fn topic0_set(&self) -> &[B256] {
        &self.topic0_set
    }
}

/// The key under which checkpoint state is tracked:
/// `lowercase(event-name + "_" + contract-address)`.
pub fn event_id(event_name: &str, address: &Address) -> String {
    format!("{}_{:#x}", event_name.to_lowercase(), address)
}
