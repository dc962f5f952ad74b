//! The versioned domain-record row.

use alloy_primitives::{Address, B256};

/// The folded state of one name at one block height.
///
/// Rows are immutable once written: every change appends a new row sharing
/// `name_hash` at a higher-or-equal `block_number`. All fields except the
/// identity pair are nullable — they fill in as events arrive.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DomainRecord {
    /// The 32-byte namehash — the row's subject. Zero only in the unset default.
    pub name_hash: B256,
    /// Block height this version was produced at.
    pub block_number: i64,

    // Identity lineage, set by NewOwner.
    pub parent_hash: Option<B256>,
    pub label_hash: Option<B256>,

    // Registry-sourced fields.
    pub owner: Option<Address>,
    pub resolver_addr: Option<Address>,
    pub ttl: Option<u64>,

    // Resolver-sourced fields.
    pub points_to_addr: Option<Address>,
    pub name: Option<String>,
    pub content: Option<B256>,
    /// uint256 content type from ABIChanged, decimal string.
    pub content_type: Option<String>,
    pub pub_key_x: Option<B256>,
    pub pub_key_y: Option<B256>,
    pub text_key: Option<String>,
    /// keccak256 of the text key (indexed string topic), hex.
    pub indexed_text_key: Option<String>,
    /// Legacy multihash payload, hex.
    pub multihash: Option<String>,
    /// EIP-1577 contenthash payload, hex.
    pub contenthash: Option<String>,
}
