//! ABI parsing: contract interface JSON → event catalog.
//!
//! topic0 is the keccak256 of the canonical event signature
//! (`name(type1,type2,…)`, no spaces), exactly what the chain puts in
//! `topics[0]`.

use alloy_core::dyn_abi::DynSolType;
use alloy_json_abi::JsonAbi;

use ensindex_core::catalog::{EventArg, EventCatalog, EventSchema};
use ensindex_core::error::IndexError;

/// Parses standard Ethereum ABI JSON into an [`EventCatalog`].
///
/// Stateless; functions and constructors in the ABI are ignored.
#[derive(Debug, Default, Clone)]
pub struct AbiParser;

impl AbiParser {
    pub fn new() -> Self {
        Self
    }

    /// Parse `abi_json`, failing with [`IndexError::BadAbi`] on malformed
    /// JSON or an event argument type the decoder cannot handle.
    pub fn parse(&self, abi_json: &str) -> Result<EventCatalog, IndexError> {
        let abi: JsonAbi = serde_json::from_str(abi_json)
            .map_err(|e| IndexError::BadAbi(format!("invalid ABI JSON: {e}")))?;

        let mut schemas = Vec::new();
        for event in abi.events() {
            let mut args = Vec::with_capacity(event.inputs.len());
            for (i, input) in event.inputs.iter().enumerate() {
                input.ty.parse::<DynSolType>().map_err(|e| {
                    IndexError::BadAbi(format!(
                        "event '{}' argument '{}': unrecognised type '{}': {e}",
                        event.name, input.name, input.ty
                    ))
                })?;
                let name = if input.name.is_empty() {
                    format!("arg{i}")
                } else {
                    input.name.clone()
                };
                args.push(EventArg {
                    name,
                    ty: input.ty.clone(),
                    indexed: input.indexed,
                });
            }
            schemas.push(EventSchema {
                name: event.name.clone(),
                signature: event.signature(),
                topic0: event.selector(),
                args,
            });
        }
        Ok(EventCatalog::new(schemas))
    }
}
