//! The two-tier indexing loop.
//!
//! One `execute()` pass:
//!
//! 1. **Registry pass** — advance over the registry's unchecked headers,
//!    fold its events into domain records, mark checkpoints, and collect
//!    resolver addresses announced by `NewResolver`; then move the registry
//!    cursor past the last header seen.
//! 2. **Resolver pass** — each configured resolver catches up over the span
//!    the registry has already covered, in ascending address order; the
//!    trailing resolver cursor commits once the whole tier succeeds.
//!
//! Checkpoint flags make every (header, event-id) pair at-most-once within
//! a pass and eventually exactly-once across passes; domain-record writes
//! are idempotent under their `(name_hash, block_number)` key, so a crash
//! between record persistence and checkpoint marking replays cleanly.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use alloy_primitives::Address;

use ensindex_core::contract::{ContractDescriptor, ContractKind};
use ensindex_core::error::IndexError;
use ensindex_core::event::{DecodedEvent, EventBatch};
use ensindex_core::folder::{self, REGISTRY_EVENT_ORDER, RESOLVER_EVENT_ORDER};
use ensindex_core::record::DomainRecord;
use ensindex_core::repo::{DomainRecordRepository, Header, HeaderRepository};

use crate::abi::AbiParser;
use crate::decoder::LogDecoder;
use crate::fetcher::LogFetcher;
use crate::getter::InterfaceGetter;
use crate::rpc::ChainClient;

/// Static configuration for the watched registry.
#[derive(Debug, Clone)]
pub struct RegistryConfig {
    pub address: Address,
    /// Registry ABI JSON.
    pub abi: String,
    /// First block the registry is watched from.
    pub starting_block: i64,
    /// Network tag stored with contract descriptors.
    pub network: String,
}

/// The two-tier indexer: one registry, dynamically discovered resolvers.
pub struct Indexer {
    registry: ContractDescriptor,
    registry_cursor: i64,
    resolver_cursor: i64,

    /// Configured resolvers, iterated in ascending address order.
    resolvers: BTreeMap<Address, ContractDescriptor>,
    /// Addresses that support none of the resolver interfaces; never
    /// probed again. Pre-seeded with the zero address.
    invalid_resolvers: BTreeSet<Address>,
    /// Addresses seen in NewResolver events, configured after each header.
    pending_resolvers: BTreeSet<Address>,

    parser: AbiParser,
    decoder: LogDecoder,
    fetcher: LogFetcher,
    getter: InterfaceGetter,
    headers: Arc<dyn HeaderRepository>,
    records: Arc<dyn DomainRecordRepository>,
    network: String,
}

impl Indexer {
    /// Build the indexer and register the registry's checkpoint columns.
    ///
    /// Fails with [`IndexError::BadAbi`] when the registry ABI does not
    /// parse — fatal at init.
    pub async fn new(
        config: RegistryConfig,
        client: Arc<dyn ChainClient>,
        headers: Arc<dyn HeaderRepository>,
        records: Arc<dyn DomainRecordRepository>,
    ) -> Result<Self, IndexError> {
        let parser = AbiParser::new();
        let catalog = parser.parse(&config.abi)?;
        let registry = ContractDescriptor::new(
            ContractKind::Registry,
            config.address,
            &config.network,
            &config.abi,
            catalog,
            config.starting_block,
        );

        for event_id in registry.event_ids() {
            headers.add_check_column(event_id).await?;
        }

        let mut invalid_resolvers = BTreeSet::new();
        invalid_resolvers.insert(Address::ZERO);

        Ok(Self {
            registry_cursor: registry.starting_block,
            resolver_cursor: registry.starting_block,
            registry,
            resolvers: BTreeMap::new(),
            invalid_resolvers,
            pending_resolvers: BTreeSet::new(),
            parser,
            decoder: LogDecoder::new(),
            fetcher: LogFetcher::new(client.clone()),
            getter: InterfaceGetter::new(client),
            headers,
            records,
            network: config.network,
        })
    }

    /// Run one pass: registry tier, then every resolver tier.
    ///
    /// Any failure aborts the pass with cursors untouched past the last
    /// committed checkpoint; the next invocation resumes there.
    pub async fn execute(&mut self) -> Result<(), IndexError> {
        let missing = self
            .headers
            .missing_headers_for_all(self.registry_cursor, -1, self.registry.event_ids())
            .await?;

        tracing::debug!(
            headers = missing.len(),
            cursor = self.registry_cursor,
            "registry pass"
        );

        for header in &missing {
            self.process_registry_header(header).await?;
        }

        if let Some(last) = missing.last() {
            self.registry_cursor = last.block_number + 1;
        }

        self.watch_resolvers().await?;

        // Every resolver is now caught up to the registry tier. Committing
        // the trailing cursor only here keeps a failed resolver span
        // enumerable by the next pass.
        self.resolver_cursor = self.registry_cursor;
        Ok(())
    }

    async fn process_registry_header(&mut self, header: &Header) -> Result<(), IndexError> {
        let logs = self
            .fetcher
            .fetch(
                &[self.registry.address],
                self.registry.topic0_set(),
                header,
            )
            .await?;

        if logs.is_empty() {
            self.headers
                .mark_checked_for_all(header.id, self.registry.event_ids())
                .await?;
            return Ok(());
        }

        let batch = self
            .decoder
            .decode_batch(&logs, &self.registry.catalog, header.id)?;

        for kind in REGISTRY_EVENT_ORDER {
            let Some(events) = batch.get(kind) else {
                continue;
            };
            for event in events {
                self.fold_and_persist(event, header.block_number).await?;
                if kind == "NewResolver" {
                    self.note_new_resolver(event);
                }
            }
        }

        self.headers
            .mark_checked_for_all(header.id, self.registry.event_ids())
            .await?;

        self.configure_pending_resolvers(header.block_number).await
    }

    /// Queue the resolver address a NewResolver event announced.
    fn note_new_resolver(&mut self, event: &DecodedEvent) {
        if let Some(addr) = event.value("resolver").and_then(|v| v.as_address()) {
            self.pending_resolvers.insert(addr);
        }
    }

    /// Configure every pending resolver not yet known: probe its interfaces
    /// at `block`, poison it on an empty probe, otherwise register its
    /// checkpoint columns and descriptor starting at `block`.
    async fn configure_pending_resolvers(&mut self, block: i64) -> Result<(), IndexError> {
        let candidates: Vec<Address> = self
            .pending_resolvers
            .iter()
            .copied()
            .filter(|a| !self.resolvers.contains_key(a) && !self.invalid_resolvers.contains(a))
            .collect();

        for addr in candidates {
            let Some(abi) = self.getter.get_abi(addr, block).await? else {
                tracing::info!(resolver = %format!("{addr:#x}"), "no supported interfaces; poisoning");
                self.invalid_resolvers.insert(addr);
                continue;
            };

            let catalog = self.parser.parse(&abi)?;
            let descriptor = ContractDescriptor::new(
                ContractKind::Resolver,
                addr,
                &self.network,
                &abi,
                catalog,
                block,
            );
            for event_id in descriptor.event_ids() {
                self.headers.add_check_column(event_id).await?;
            }

            tracing::info!(
                resolver = %format!("{addr:#x}"),
                starting_block = block,
                events = descriptor.event_ids().len(),
                "resolver configured"
            );
            self.resolvers.insert(addr, descriptor);
        }
        Ok(())
    }

    /// Catch every configured resolver up to the block span the registry
    /// has already covered.
    async fn watch_resolvers(&mut self) -> Result<(), IndexError> {
        let end = self.registry_cursor - 1;
        let addresses: Vec<Address> = self.resolvers.keys().copied().collect();

        for addr in addresses {
            let resolver = self.resolvers[&addr].clone();
            // A resolver is never enumerated before the block that
            // announced it.
            let start = self.resolver_cursor.max(resolver.starting_block);

            let missing = self
                .headers
                .missing_headers_for_all(start, end, resolver.event_ids())
                .await?;

            tracing::debug!(
                resolver = %format!("{addr:#x}"),
                headers = missing.len(),
                start,
                end,
                "resolver pass"
            );

            for header in &missing {
                self.process_resolver_header(&resolver, header).await?;
            }
        }
        Ok(())
    }

    async fn process_resolver_header(
        &mut self,
        resolver: &ContractDescriptor,
        header: &Header,
    ) -> Result<(), IndexError> {
        let logs = self
            .fetcher
            .fetch(&[resolver.address], resolver.topic0_set(), header)
            .await?;

        if logs.is_empty() {
            self.headers
                .mark_checked_for_all(header.id, resolver.event_ids())
                .await?;
            return Ok(());
        }

        let batch = self.decoder.decode_batch(&logs, &resolver.catalog, header.id)?;
        self.process_resolver_batch(&batch, header.block_number).await?;

        self.headers
            .mark_checked_for_all(header.id, resolver.event_ids())
            .await
    }

    async fn process_resolver_batch(
        &mut self,
        batch: &EventBatch,
        block: i64,
    ) -> Result<(), IndexError> {
        for kind in RESOLVER_EVENT_ORDER {
            let Some(events) = batch.get(kind) else {
                continue;
            };
            for event in events {
                self.fold_and_persist(event, block).await?;
            }
        }
        Ok(())
    }

    /// Fold one event into its name's latest record and persist the new
    /// version row.
    async fn fold_and_persist(
        &mut self,
        event: &DecodedEvent,
        block: i64,
    ) -> Result<(), IndexError> {
        let node = folder::event_node(event)?;

        let prev = if event.event == "NewOwner" {
            if self.records.exists(&node).await? {
                Some(self.records.get_latest(&node, block).await?)
            } else {
                None
            }
        } else {
            Some(self.records.get_latest(&node, block).await?)
        };

        let record = folder::apply(event, block, prev)?;
        self.create_with_retry(&record).await
    }

    /// Persist a record, retrying a write conflict once before escalating.
    async fn create_with_retry(&self, record: &DomainRecord) -> Result<(), IndexError> {
        match self.records.create(record).await {
            Err(IndexError::WriteConflict(first)) => {
                tracing::warn!(
                    name_hash = %format!("{:#x}", record.name_hash),
                    block = record.block_number,
                    error = %first,
                    "write conflict; retrying once"
                );
                self.records
                    .create(record)
                    .await
                    .map_err(|e| IndexError::Checkpoint(format!("write conflict persisted: {e}")))
            }
            other => other,
        }
    }

    /// Current registry cursor (next unprocessed registry block).
    pub fn registry_cursor(&self) -> i64 {
        self.registry_cursor
    }

    /// Current resolver cursor (start of the next resolver span).
    pub fn resolver_cursor(&self) -> i64 {
        self.resolver_cursor
    }

    /// Addresses of configured resolvers, ascending.
    pub fn resolver_addresses(&self) -> Vec<Address> {
        self.resolvers.keys().copied().collect()
    }

    /// The poison set.
    pub fn invalid_resolvers(&self) -> &BTreeSet<Address> {
        &self.invalid_resolvers
    }
}
