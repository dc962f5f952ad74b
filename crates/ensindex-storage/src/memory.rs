//! In-memory storage backend.
//!
//! Implements both repository traits with the same observable semantics as
//! the Postgres backend: a header with no checked flags counts as missing
//! for every event id, and record writes upsert by
//! `(name_hash, block_number)`.

use std::collections::{BTreeMap, HashSet};
use std::sync::Mutex;

use alloy_primitives::B256;
use async_trait::async_trait;

use ensindex_core::error::IndexError;
use ensindex_core::record::DomainRecord;
use ensindex_core::repo::{DomainRecordRepository, Header, HeaderRepository};

/// In-memory indexer storage. All data is lost when the process exits.
#[derive(Default)]
pub struct MemoryStorage {
    headers: Mutex<Vec<Header>>,
    columns: Mutex<HashSet<String>>,
    checked: Mutex<HashSet<(i64, String)>>,
    records: Mutex<BTreeMap<(B256, i64), DomainRecord>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a synced header (stand-in for the header-sync subsystem).
    pub fn add_header(&self, id: i64, block_number: i64, hash: impl Into<String>) {
        self.headers.lock().unwrap().push(Header {
            id,
            block_number,
            hash: hash.into(),
        });
    }

    /// Whether the flag for `(header_id, event_id)` is set.
    pub fn is_checked(&self, header_id: i64, event_id: &str) -> bool {
        self.checked
            .lock()
            .unwrap()
            .contains(&(header_id, event_id.to_string()))
    }

    /// All version rows for a name, ascending by block number.
    pub fn records_for(&self, name_hash: &B256) -> Vec<DomainRecord> {
        self.records
            .lock()
            .unwrap()
            .iter()
            .filter(|((h, _), _)| h == name_hash)
            .map(|(_, r)| r.clone())
            .collect()
    }

    /// Total stored version rows.
    pub fn record_count(&self) -> usize {
        self.records.lock().unwrap().len()
    }

    /// Registered checkpoint column names.
    pub fn columns(&self) -> Vec<String> {
        let mut cols: Vec<String> = self.columns.lock().unwrap().iter().cloned().collect();
        cols.sort();
        cols
    }
}

#[async_trait]
impl HeaderRepository for MemoryStorage {
    async fn add_check_column(&self, event_id: &str) -> Result<(), IndexError> {
        self.columns.lock().unwrap().insert(event_id.to_string());
        Ok(())
    }

    async fn missing_headers_for_all(
        &self,
        start_block: i64,
        end_block: i64,
        event_ids: &[String],
    ) -> Result<Vec<Header>, IndexError> {
        let checked = self.checked.lock().unwrap();
        let mut missing: Vec<Header> = self
            .headers
            .lock()
            .unwrap()
            .iter()
            .filter(|h| h.block_number >= start_block)
            .filter(|h| end_block == -1 || h.block_number <= end_block)
            .filter(|h| {
                event_ids
                    .iter()
                    .any(|id| !checked.contains(&(h.id, id.clone())))
            })
            .cloned()
            .collect();
        missing.sort_by_key(|h| h.block_number);
        Ok(missing)
    }

    async fn mark_checked_for_all(
        &self,
        header_id: i64,
        event_ids: &[String],
    ) -> Result<(), IndexError> {
        let mut checked = self.checked.lock().unwrap();
        for id in event_ids {
            checked.insert((header_id, id.clone()));
        }
        Ok(())
    }
}

#[async_trait]
impl DomainRecordRepository for MemoryStorage {
    async fn exists(&self, name_hash: &B256) -> Result<bool, IndexError> {
        Ok(self
            .records
            .lock()
            .unwrap()
            .keys()
            .any(|(h, _)| h == name_hash))
    }

    async fn get_latest(&self, name_hash: &B256, block: i64) -> Result<DomainRecord, IndexError> {
        self.records
            .lock()
            .unwrap()
            .range((*name_hash, i64::MIN)..=(*name_hash, block))
            .next_back()
            .map(|(_, r)| r.clone())
            .ok_or(IndexError::RecordMissing {
                node: *name_hash,
                block,
            })
    }

    async fn create(&self, record: &DomainRecord) -> Result<(), IndexError> {
        self.records
            .lock()
            .unwrap()
            .insert((record.name_hash, record.block_number), record.clone());
        Ok(())
    }
}
