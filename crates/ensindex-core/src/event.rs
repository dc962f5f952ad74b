//! Decoded event types.

use std::collections::BTreeMap;

use crate::value::ScalarValue;

/// A fully decoded log: one event occurrence bound to its header.
///
/// Indexed and data arguments are merged into a single name → value map;
/// argument order is irrelevant to consumers.
#[derive(Debug, Clone)]
pub struct DecodedEvent {
    /// The event name as declared in the contract ABI (e.g. `"NewOwner"`).
    pub event: String,
    /// Database id of the header this log belongs to.
    pub header_id: i64,
    /// Block number of that header.
    pub block_number: i64,
    /// Block-relative log index, the intra-kind tie-break.
    pub log_index: u64,
    /// Decoded argument values keyed by argument name.
    pub values: BTreeMap<String, ScalarValue>,
}

impl DecodedEvent {
    /// Get an argument value by name.
    pub fn value(&self, name: &str) -> Option<&ScalarValue> {
        self.values.get(name)
    }
}

/// All decoded events of one header, grouped by event name.
///
/// Vectors are ordered by ascending block-relative log index.
pub type EventBatch = BTreeMap<String, Vec<DecodedEvent>>;
