//! The domain-record fold: one decoded event applied to the latest record
//! for its name yields the next version row.
//!
//! Pure — repositories stay outside. The caller looks up the previous
//! record (keyed by [`event_node`]) and persists the result.

use alloy_primitives::B256;

use crate::error::IndexError;
use crate::event::DecodedEvent;
use crate::namehash::subnode;
use crate::record::DomainRecord;
use crate::value::ScalarValue;

/// Registry event kinds in their fixed per-header processing order.
pub const REGISTRY_EVENT_ORDER: [&str; 4] = ["NewOwner", "Transfer", "NewTTL", "NewResolver"];

/// Resolver event kinds in their fixed per-header processing order.
pub const RESOLVER_EVENT_ORDER: [&str; 8] = [
    "AddrChanged",
    "NameChanged",
    "ContentChanged",
    "ABIChanged",
    "PubkeyChanged",
    "TextChanged",
    "MultihashChanged",
    "ContenthashChanged",
];

/// The name-hash an event row belongs to.
///
/// For `NewOwner` this is the derived subnode; every other kind carries the
/// node directly.
pub fn event_node(event: &DecodedEvent) -> Result<B256, IndexError> {
    if event.event == "NewOwner" {
        let parent = arg_hash(event, "node")?;
        let label = arg_hash(event, "label")?;
        Ok(subnode(&parent, &label))
    } else {
        arg_hash(event, "node")
    }
}

/// Fold `event` into `prev`, producing the version row at `block`.
///
/// `prev` is the latest record for the event's node, or `None` when no row
/// exists yet. Only `NewOwner` may start a lineage; any other kind without a
/// previous record is a missing-coverage bug surfaced as
/// [`IndexError::RecordMissing`].
pub fn apply(
    event: &DecodedEvent,
    block: i64,
    prev: Option<DomainRecord>,
) -> Result<DomainRecord, IndexError> {
    let mut record = match (&prev, event.event.as_str()) {
        (Some(r), _) => r.clone(),
        (None, "NewOwner") => DomainRecord::default(),
        (None, _) => {
            return Err(IndexError::RecordMissing {
                node: event_node(event)?,
                block,
            })
        }
    };
    record.block_number = block;

    match event.event.as_str() {
        "NewOwner" => {
            let parent = arg_hash(event, "node")?;
            let label = arg_hash(event, "label")?;
            record.name_hash = subnode(&parent, &label);
            record.parent_hash = Some(parent);
            record.label_hash = Some(label);
            record.owner = Some(arg_address(event, "owner")?);
        }
        "Transfer" => {
            record.owner = Some(arg_address(event, "owner")?);
        }
        "NewTTL" => {
            record.ttl = Some(arg_u64(event, "ttl")?);
        }
        "NewResolver" => {
            record.resolver_addr = Some(arg_address(event, "resolver")?);
        }
        "AddrChanged" => {
            record.points_to_addr = Some(arg_address(event, "a")?);
        }
        "NameChanged" => {
            record.name = Some(arg_str(event, "name")?);
        }
        "ContentChanged" => {
            record.content = Some(arg_hash(event, "hash")?);
        }
        "ABIChanged" => {
            record.content_type = Some(arg_uint_string(event, "contentType")?);
        }
        "PubkeyChanged" => {
            record.pub_key_x = Some(arg_hash(event, "x")?);
            record.pub_key_y = Some(arg_hash(event, "y")?);
        }
        "TextChanged" => {
            record.text_key = Some(arg_str(event, "key")?);
            record.indexed_text_key = Some(format!("{:#x}", arg_hash(event, "indexedKey")?));
        }
        "MultihashChanged" => {
            record.multihash = Some(arg_hex(event, "hash")?);
        }
        "ContenthashChanged" => {
            record.contenthash = Some(arg_hex(event, "hash")?);
        }
        other => {
            return Err(IndexError::DecodeFailed {
                event: other.to_string(),
                reason: "event kind has no fold rule".into(),
            })
        }
    }

    Ok(record)
}

fn arg<'a>(event: &'a DecodedEvent, name: &str) -> Result<&'a ScalarValue, IndexError> {
    event.value(name).ok_or_else(|| IndexError::DecodeFailed {
        event: event.event.clone(),
        reason: format!("missing argument '{name}'"),
    })
}

fn arg_hash(event: &DecodedEvent, name: &str) -> Result<B256, IndexError> {
    arg(event, name)?
        .as_hash()
        .ok_or_else(|| type_mismatch(event, name, "bytes32"))
}

fn arg_address(event: &DecodedEvent, name: &str) -> Result<alloy_primitives::Address, IndexError> {
    arg(event, name)?
        .as_address()
        .ok_or_else(|| type_mismatch(event, name, "address"))
}

fn arg_u64(event: &DecodedEvent, name: &str) -> Result<u64, IndexError> {
    arg(event, name)?
        .as_u64()
        .ok_or_else(|| type_mismatch(event, name, "uint64"))
}

fn arg_uint_string(event: &DecodedEvent, name: &str) -> Result<String, IndexError> {
    arg(event, name)?
        .as_uint_string()
        .ok_or_else(|| type_mismatch(event, name, "uint256"))
}

fn arg_str(event: &DecodedEvent, name: &str) -> Result<String, IndexError> {
    arg(event, name)?
        .as_str()
        .map(str::to_owned)
        .ok_or_else(|| type_mismatch(event, name, "string"))
}

fn arg_hex(event: &DecodedEvent, name: &str) -> Result<String, IndexError> {
    arg(event, name)?
        .as_bytes()
        .map(|b| format!("0x{}", hex::encode(b)))
        .ok_or_else(|| type_mismatch(event, name, "bytes"))
}

fn type_mismatch(event: &DecodedEvent, name: &str, expected: &str) -> IndexError {
    IndexError::DecodeFailed {
        event: event.event.clone(),
        reason: format!("argument '{name}' is not {expected}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::{Address, U256};
    use std::collections::BTreeMap;

    fn ev(name: &str, log_index: u64, values: Vec<(&str, ScalarValue)>) -> DecodedEvent {
        DecodedEvent {
            event: name.into(),
            header_id: 1,
            block_number: 100,
            log_index,
            values: values
                .into_iter()
                .map(|(k, v)| (k.to_string(), v))
                .collect::<BTreeMap<_, _>>(),
        }
    }

    fn owner_addr() -> Address {
        Address::repeat_byte(0xaa)
    }

    #[test]
    fn genesis_new_owner_creates_record() {
        let label = B256::repeat_byte(0xab);
        let event = ev(
            "NewOwner",
            0,
            vec![
                ("node", ScalarValue::Hash(B256::ZERO)),
                ("label", ScalarValue::Hash(label)),
                ("owner", ScalarValue::Address(owner_addr())),
            ],
        );
        let record = apply(&event, 100, None).unwrap();
        assert_eq!(record.name_hash, subnode(&B256::ZERO, &label));
        assert_eq!(record.parent_hash, Some(B256::ZERO));
        assert_eq!(record.label_hash, Some(label));
        assert_eq!(record.owner, Some(owner_addr()));
        assert_eq!(record.block_number, 100);
    }

    #[test]
    fn new_owner_on_existing_record_keeps_other_fields() {
        let label = B256::repeat_byte(0xab);
        let node = subnode(&B256::ZERO, &label);
        let prev = DomainRecord {
            name_hash: node,
            block_number: 90,
            ttl: Some(3600),
            ..Default::default()
        };
        let event = ev(
            "NewOwner",
            0,
            vec![
                ("node", ScalarValue::Hash(B256::ZERO)),
                ("label", ScalarValue::Hash(label)),
                ("owner", ScalarValue::Address(owner_addr())),
            ],
        );
        let record = apply(&event, 110, Some(prev)).unwrap();
        assert_eq!(record.ttl, Some(3600));
        assert_eq!(record.owner, Some(owner_addr()));
        assert_eq!(record.block_number, 110);
    }

    #[test]
    fn transfer_without_prior_record_is_missing_coverage() {
        let event = ev(
            "Transfer",
            0,
            vec![
                ("node", ScalarValue::Hash(B256::repeat_byte(0x01))),
                ("owner", ScalarValue::Address(owner_addr())),
            ],
        );
        let err = apply(&event, 100, None).unwrap_err();
        assert!(matches!(err, IndexError::RecordMissing { block: 100, .. }));
    }

    #[test]
    fn resolver_events_update_their_fields_only() {
        let node = B256::repeat_byte(0x01);
        let base = DomainRecord {
            name_hash: node,
            block_number: 100,
            owner: Some(owner_addr()),
            ..Default::default()
        };

        let addr_changed = ev(
            "AddrChanged",
            0,
            vec![
                ("node", ScalarValue::Hash(node)),
                ("a", ScalarValue::Address(Address::repeat_byte(0xcc))),
            ],
        );
        let r = apply(&addr_changed, 110, Some(base.clone())).unwrap();
        assert_eq!(r.points_to_addr, Some(Address::repeat_byte(0xcc)));
        assert_eq!(r.owner, Some(owner_addr()));

        let pubkey = ev(
            "PubkeyChanged",
            1,
            vec![
                ("node", ScalarValue::Hash(node)),
                ("x", ScalarValue::Hash(B256::repeat_byte(0x0f))),
                ("y", ScalarValue::Hash(B256::repeat_byte(0x10))),
            ],
        );
        let r = apply(&pubkey, 110, Some(r)).unwrap();
        assert!(r.pub_key_x.is_some());
        assert!(r.pub_key_y.is_some());
        assert_eq!(r.points_to_addr, Some(Address::repeat_byte(0xcc)));
    }

    #[test]
    fn text_changed_records_key_and_hashed_key() {
        let node = B256::repeat_byte(0x01);
        let key_hash = B256::repeat_byte(0x2a);
        let prev = DomainRecord { name_hash: node, block_number: 100, ..Default::default() };
        let event = ev(
            "TextChanged",
            0,
            vec![
                ("node", ScalarValue::Hash(node)),
                ("indexedKey", ScalarValue::Hash(key_hash)),
                ("key", ScalarValue::Str("url".into())),
            ],
        );
        let r = apply(&event, 120, Some(prev)).unwrap();
        assert_eq!(r.text_key.as_deref(), Some("url"));
        assert_eq!(r.indexed_text_key, Some(format!("{key_hash:#x}")));
    }

    #[test]
    fn same_block_sequence_folds_in_kind_order() {
        // Transfer then AddrChanged at one height: the second row carries both
        // the new owner and the new target, mirroring the tie-break rule.
        let node = B256::repeat_byte(0x01);
        let genesis = DomainRecord { name_hash: node, block_number: 90, ..Default::default() };

        let transfer = ev(
            "Transfer",
            1,
            vec![
                ("node", ScalarValue::Hash(node)),
                ("owner", ScalarValue::Address(Address::repeat_byte(0xdd))),
            ],
        );
        let after_transfer = apply(&transfer, 107, Some(genesis)).unwrap();

        let addr_changed = ev(
            "AddrChanged",
            3,
            vec![
                ("node", ScalarValue::Hash(node)),
                ("a", ScalarValue::Address(Address::repeat_byte(0xcc))),
            ],
        );
        let final_row = apply(&addr_changed, 107, Some(after_transfer.clone())).unwrap();

        assert_eq!(after_transfer.owner, Some(Address::repeat_byte(0xdd)));
        assert_eq!(final_row.owner, Some(Address::repeat_byte(0xdd)));
        assert_eq!(final_row.points_to_addr, Some(Address::repeat_byte(0xcc)));
        assert_eq!(final_row.block_number, 107);
    }

    #[test]
    fn missing_argument_is_decode_failure() {
        let event = ev("NewTTL", 0, vec![("node", ScalarValue::Hash(B256::ZERO))]);
        let prev = DomainRecord::default();
        let err = apply(&event, 100, Some(prev)).unwrap_err();
        assert!(matches!(err, IndexError::DecodeFailed { .. }));
    }

    #[test]
    fn ttl_wider_than_u64_is_rejected() {
        let prev = DomainRecord { name_hash: B256::repeat_byte(1), ..Default::default() };
        let event = ev(
            "NewTTL",
            0,
            vec![
                ("node", ScalarValue::Hash(B256::repeat_byte(1))),
                ("ttl", ScalarValue::Uint(U256::MAX)),
            ],
        );
        assert!(apply(&event, 100, Some(prev)).is_err());
    }

    #[test]
    fn event_node_derives_subnode_for_new_owner() {
        let label = B256::repeat_byte(0xab);
        let new_owner = ev(
            "NewOwner",
            0,
            vec![
                ("node", ScalarValue::Hash(B256::ZERO)),
                ("label", ScalarValue::Hash(label)),
                ("owner", ScalarValue::Address(owner_addr())),
            ],
        );
        assert_eq!(event_node(&new_owner).unwrap(), subnode(&B256::ZERO, &label));

        let transfer = ev(
            "Transfer",
            0,
            vec![
                ("node", ScalarValue::Hash(B256::repeat_byte(0x07))),
                ("owner", ScalarValue::Address(owner_addr())),
            ],
        );
        assert_eq!(event_node(&transfer).unwrap(), B256::repeat_byte(0x07));
    }
}
