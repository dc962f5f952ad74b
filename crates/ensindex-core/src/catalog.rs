//! Event catalog types — the in-memory representation of a contract's
//! event interface.

use alloy_primitives::B256;

/// Definition of a single event argument.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventArg {
    /// Argument name as declared in the ABI.
    pub name: String,
    /// Solidity type string, e.g. `"bytes32"`, `"address"`, `"uint64"`.
    pub ty: String,
    /// EVM: does this argument occupy a topic slot?
    pub indexed: bool,
}

/// One event's schema: name, topic0 signature hash, ordered arguments.
#[derive(Debug, Clone)]
pub struct EventSchema {
    /// Event name, unique within a contract (e.g. `"NewOwner"`).
    pub name: String,
    /// Canonical signature, `name(type1,type2,…)` with no spaces.
    pub signature: String,
    /// keccak256 of the canonical signature — the log's topics[0].
    pub topic0: B256,
    /// Arguments in declaration order (order matters for ABI decode).
    pub args: Vec<EventArg>,
}

impl EventSchema {
    /// Arguments that occupy topic slots, in declaration order.
    pub fn indexed_args(&self) -> Vec<&EventArg> {
        self.args.iter().filter(|a| a.indexed).collect()
    }

    /// Arguments packed into the data payload, in declaration order.
    pub fn data_args(&self) -> Vec<&EventArg> {
        self.args.iter().filter(|a| !a.indexed).collect()
    }
}

/// Ordered set of event schemas for one contract.
#[derive(Debug, Clone, Default)]
pub struct EventCatalog {
    schemas: Vec<EventSchema>,
}

impl EventCatalog {
    pub fn new(schemas: Vec<EventSchema>) -> Self {
        Self { schemas }
    }

    pub fn schemas(&self) -> &[EventSchema] {
        &self.schemas
    }

    pub fn is_empty(&self) -> bool {
        self.schemas.is_empty()
    }

    /// Look up a schema by its topic0 signature hash.
    pub fn by_topic0(&self, topic0: &B256) -> Option<&EventSchema> {
        self.schemas.iter().find(|s| s.topic0 == *topic0)
    }

    /// Look up a schema by event name.
    pub fn by_name(&self, name: &str) -> Option<&EventSchema> {
        self.schemas.iter().find(|s| s.name == name)
    }

    /// The topic0 filter set, in schema order.
    pub fn topic0_set(&self) -> Vec<B256> {
        self.schemas.iter().map(|s| s.topic0).collect()
    }

    /// Event names in schema order.
    pub fn event_names(&self) -> Vec<&str> {
        self.schemas.iter().map(|s| s.name.as_str()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn schema(name: &str, topic_byte: u8) -> EventSchema {
        EventSchema {
            name: name.into(),
            signature: format!("{name}(bytes32)"),
            topic0: B256::repeat_byte(topic_byte),
            args: vec![EventArg {
                name: "node".into(),
                ty: "bytes32".into(),
                indexed: true,
            }],
        }
    }

    #[test]
    fn lookup_by_topic0_and_name() {
        let catalog = EventCatalog::new(vec![schema("Transfer", 0x01), schema("NewTTL", 0x02)]);
        assert_eq!(
            catalog.by_topic0(&B256::repeat_byte(0x02)).unwrap().name,
            "NewTTL"
        );
        assert!(catalog.by_topic0(&B256::repeat_byte(0x03)).is_none());
        assert_eq!(catalog.by_name("Transfer").unwrap().topic0, B256::repeat_byte(0x01));
    }

    #[test]
    fn arg_projections_split_on_indexed() {
        let s = EventSchema {
            name: "NewOwner".into(),
            signature: "NewOwner(bytes32,bytes32,address)".into(),
            topic0: B256::ZERO,
            args: vec![
                EventArg { name: "node".into(), ty: "bytes32".into(), indexed: true },
                EventArg { name: "label".into(), ty: "bytes32".into(), indexed: true },
                EventArg { name: "owner".into(), ty: "address".into(), indexed: false },
            ],
        };
        assert_eq!(s.indexed_args().len(), 2);
        assert_eq!(s.data_args().len(), 1);
        assert_eq!(s.data_args()[0].name, "owner");
    }
}
