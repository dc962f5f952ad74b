//! Log decoding: raw logs + event catalog → typed per-event batches.
//!
//! Binding is by topics[0]; logs whose topic0 matches no catalog entry are
//! dropped silently so newer contract versions with extra events keep
//! indexing.

use std::collections::BTreeMap;

use alloy_core::dyn_abi::{DynSolType, DynSolValue};
use alloy_primitives::B256;

use ensindex_core::catalog::{EventCatalog, EventSchema};
use ensindex_core::error::IndexError;
use ensindex_core::event::{DecodedEvent, EventBatch};
use ensindex_core::value::ScalarValue;

use crate::fetcher::{parse_hex_u64, RawLog};

/// Decodes raw logs against an event catalog.
///
/// Stateless and cheap to clone.
#[derive(Debug, Default, Clone)]
pub struct LogDecoder;

impl LogDecoder {
    pub fn new() -> Self {
        Self
    }

    /// Decode every log of one header, grouped by event name.
    ///
    /// Fails with [`IndexError::DecodeFailed`] when topic0 matched a schema
    /// but the log did not unpack against it.
    pub fn decode_batch(
        &self,
        logs: &[RawLog],
        catalog: &EventCatalog,
        header_id: i64,
    ) -> Result<EventBatch, IndexError> {
        let mut batch = EventBatch::new();
        for log in logs {
            let Some(topic0) = log.topic0() else {
                continue;
            };
            let Some(schema) = catalog.by_topic0(&topic0) else {
                // Forward-compatibility: unknown event kinds are skipped.
                continue;
            };
            let event = self.decode_log(log, schema, header_id)?;
            batch.entry(schema.name.clone()).or_default().push(event);
        }
        Ok(batch)
    }

    fn decode_log(
        &self,
        log: &RawLog,
        schema: &EventSchema,
        header_id: i64,
    ) -> Result<DecodedEvent, IndexError> {
        let topics = log.topics_b256().map_err(|reason| decode_failed(schema, reason))?;
        let data = log.data_bytes().map_err(|reason| decode_failed(schema, reason))?;

        let mut values: BTreeMap<String, ScalarValue> = BTreeMap::new();

        // Indexed arguments live in topics[1..].
        let indexed = schema.indexed_args();
        for (i, arg) in indexed.iter().enumerate() {
            let topic = topics.get(i + 1).ok_or_else(|| {
                decode_failed(schema, format!("missing topic for indexed argument '{}'", arg.name))
            })?;
            values.insert(arg.name.clone(), decode_topic(schema, &arg.ty, topic)?);
        }

        // Data arguments are an ABI-encoded tuple.
        let data_args = schema.data_args();
        if !data_args.is_empty() {
            let types: Vec<DynSolType> = data_args
                .iter()
                .map(|a| {
                    a.ty.parse::<DynSolType>()
                        .map_err(|e| decode_failed(schema, format!("argument '{}': {e}", a.name)))
                })
                .collect::<Result<_, _>>()?;
            let tuple = DynSolType::Tuple(types);
            let decoded = tuple
                .abi_decode(&data)
                .map_err(|e| decode_failed(schema, format!("data payload: {e}")))?;
            let fields = match decoded {
                DynSolValue::Tuple(vals) => vals,
                other => vec![other],
            };
            for (arg, val) in data_args.iter().zip(fields) {
                values.insert(arg.name.clone(), normalize(val));
            }
        }

        Ok(DecodedEvent {
            event: schema.name.clone(),
            header_id,
            block_number: parse_hex_u64(&log.block_number) as i64,
            log_index: log.log_index_u64(),
            values,
        })
    }
}

/// Decode a single indexed topic (always 32 bytes).
///
/// Value types are recovered from the padded word. Reference types (string,
/// bytes, arrays, tuples) arrive as the keccak256 of their encoding — the
/// original value is unrecoverable, so the hash itself is the value.
fn decode_topic(
    schema: &EventSchema,
    ty: &str,
    topic: &B256,
) -> Result<ScalarValue, IndexError> {
    let sol_type = ty
        .parse::<DynSolType>()
        .map_err(|e| decode_failed(schema, format!("topic type '{ty}': {e}")))?;

    if is_reference_type(&sol_type) {
        return Ok(ScalarValue::Hash(*topic));
    }

    let decoded = sol_type
        .abi_decode(topic.as_slice())
        .map_err(|e| decode_failed(schema, format!("topic decode as '{ty}': {e}")))?;
    Ok(normalize(decoded))
}

fn is_reference_type(ty: &DynSolType) -> bool {
    matches!(
        ty,
        DynSolType::String
            | DynSolType::Bytes
            | DynSolType::Array(_)
            | DynSolType::FixedArray(..)
            | DynSolType::Tuple(_)
    )
}

/// Map a decoded `DynSolValue` into the indexer's scalar value space.
fn normalize(val: DynSolValue) -> ScalarValue {
    match val {
        DynSolValue::Bool(b) => ScalarValue::Bool(b),
        DynSolValue::Uint(u, _) => ScalarValue::Uint(u),
        DynSolValue::Int(i, _) => ScalarValue::Str(i.to_string()),
        DynSolValue::Address(a) => ScalarValue::Address(a),
        DynSolValue::FixedBytes(word, size) => {
            if size == 32 {
                ScalarValue::Hash(word)
            } else {
                ScalarValue::Bytes(word.as_slice()[..size].to_vec())
            }
        }
        DynSolValue::Bytes(b) => ScalarValue::Bytes(b),
        DynSolValue::String(s) => ScalarValue::Str(s),
        // Composite values never appear in the watched ABIs; keep their
        // encoding so nothing is lost.
        other => ScalarValue::Bytes(other.abi_encode()),
    }
}

fn decode_failed(schema: &EventSchema, reason: impl Into<String>) -> IndexError {
    IndexError::DecodeFailed {
        event: schema.name.clone(),
        reason: reason.into(),
    }
}
