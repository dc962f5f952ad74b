//! ensindex-core — foundation for the two-tier ENS domain-record indexer.
//!
//! # Architecture
//!
//! ```text
//! Indexer (ensindex-evm)
//!     ├── EventCatalog      (per-contract event schemas, topic0 filters)
//!     ├── DecodedEvent      (event-name → typed argument map)
//!     ├── fold::apply       (event × previous record → next record)
//!     ├── HeaderRepository  (checked-header flags, cursor enumeration)
//!     └── DomainRecordRepository (versioned name-state rows)
//! ```
//!
//! This crate holds the pure data model and the repository traits; the EVM
//! wire layer lives in `ensindex-evm`, the Postgres backend in
//! `ensindex-storage`.

pub mod catalog;
pub mod contract;
pub mod error;
pub mod event;
pub mod folder;
pub mod namehash;
pub mod record;
pub mod repo;
pub mod value;

pub use catalog::{EventArg, EventCatalog, EventSchema};
pub use contract::{ContractDescriptor, ContractKind};
pub use error::IndexError;
pub use event::{DecodedEvent, EventBatch};
pub use folder::{apply, event_node, REGISTRY_EVENT_ORDER, RESOLVER_EVENT_ORDER};
pub use namehash::subnode;
pub use record::DomainRecord;
pub use repo::{DomainRecordRepository, Header, HeaderRepository};
pub use value::ScalarValue;
