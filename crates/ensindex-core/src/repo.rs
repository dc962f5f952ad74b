//! Repository traits — the persistence seams of the indexer.

use alloy_primitives::B256;
use async_trait::async_trait;

use crate::error::IndexError;
use crate::record::DomainRecord;

/// A synced block header row, maintained by the header-sync subsystem.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    /// Database id (the checkpoint foreign key).
    pub id: i64,
    pub block_number: i64,
    /// Block hash, `0x…` hex.
    pub hash: String,
}

/// Checkpoint store: per-(header, event-id) "checked" flags.
///
/// Implementations include `PostgresStorage` and the in-memory test store
/// in `ensindex-storage`.
#[async_trait]
pub trait HeaderRepository: Send + Sync {
    /// Idempotently register a checkpoint column for `event_id`.
    ///
    /// New flags default to unchecked for every existing and future header.
    async fn add_check_column(&self, event_id: &str) -> Result<(), IndexError>;

    /// Headers in `[start_block, end_block]` with at least one of the given
    /// flags unchecked, ordered by ascending block number.
    ///
    /// `end_block == -1` leaves the range open-ended.
    async fn missing_headers_for_all(
        &self,
        start_block: i64,
        end_block: i64,
        event_ids: &[String],
    ) -> Result<Vec<Header>, IndexError>;

    /// Set every given flag on `header_id`, atomically.
    async fn mark_checked_for_all(
        &self,
        header_id: i64,
        event_ids: &[String],
    ) -> Result<(), IndexError>;
}

/// Versioned domain-record store.
#[async_trait]
pub trait DomainRecordRepository: Send + Sync {
    /// Whether any version exists for `name_hash`.
    async fn exists(&self, name_hash: &B256) -> Result<bool, IndexError>;

    /// The version of `name_hash` with the highest block number ≤ `block`.
    ///
    /// Fails with [`IndexError::RecordMissing`] when no such row exists.
    async fn get_latest(&self, name_hash: &B256, block: i64) -> Result<DomainRecord, IndexError>;

    /// Insert a version row. Idempotent under the `(name_hash, block_number)`
    /// key: replaying the same fold after a crash converges on the same row.
    async fn create(&self, record: &DomainRecord) -> Result<(), IndexError>;
}
