//! Resolver interface detection.
//!
//! Resolvers advertise capabilities through ERC-165
//! `supportsInterface(bytes4)`. The getter probes each interface the
//! indexer can fold and assembles an ABI covering exactly the supported
//! union. An empty union means the address is not a usable resolver; the
//! caller poisons it and never probes again.

use std::sync::Arc;

use alloy_primitives::Address;

use ensindex_core::error::IndexError;

use crate::rpc::{ChainClient, RpcError};

/// `supportsInterface(bytes4)` — keccak("supportsInterface(bytes4)")[..4].
pub const SUPPORTS_INTERFACE_SELECTOR: [u8; 4] = [0x01, 0xff, 0xc9, 0xa7];

struct ResolverInterface {
    /// ERC-165 interface id.
    id: [u8; 4],
    /// The event fragment contributed when the interface is supported.
    event_json: &'static str,
}

/// The resolver interfaces the folder understands, probe order fixed.
const RESOLVER_INTERFACES: [ResolverInterface; 8] = [
    // addr(bytes32)
    ResolverInterface {
        id: [0x3b, 0x3b, 0x57, 0xde],
        event_json: r#"{"type":"event","name":"AddrChanged","anonymous":false,"inputs":[{"name":"node","type":"bytes32","indexed":true},{"name":"a","type":"address","indexed":false}]}"#,
    },
    // name(bytes32)
    ResolverInterface {
        id: [0x69, 0x1f, 0x34, 0x31],
        event_json: r#"{"type":"event","name":"NameChanged","anonymous":false,"inputs":[{"name":"node","type":"bytes32","indexed":true},{"name":"name","type":"string","indexed":false}]}"#,
    },
    // content(bytes32)
    ResolverInterface {
        id: [0xd8, 0x38, 0x9d, 0xc5],
        event_json: r#"{"type":"event","name":"ContentChanged","anonymous":false,"inputs":[{"name":"node","type":"bytes32","indexed":true},{"name":"hash","type":"bytes32","indexed":false}]}"#,
    },
    // ABI(bytes32,uint256)
    ResolverInterface {
        id: [0x22, 0x03, 0xab, 0x56],
        event_json: r#"{"type":"event","name":"ABIChanged","anonymous":false,"inputs":[{"name":"node","type":"bytes32","indexed":true},{"name":"contentType","type":"uint256","indexed":true}]}"#,
    },
    // pubkey(bytes32)
    ResolverInterface {
        id: [0xc8, 0x69, 0x02, 0x33],
        event_json: r#"{"type":"event","name":"PubkeyChanged","anonymous":false,"inputs":[{"name":"node","type":"bytes32","indexed":true},{"name":"x","type":"bytes32","indexed":false},{"name":"y","type":"bytes32","indexed":false}]}"#,
    },
    // text(bytes32,string)
    ResolverInterface {
        id: [0x59, 0xd1, 0xd4, 0x3c],
        event_json: r#"{"type":"event","name":"TextChanged","anonymous":false,"inputs":[{"name":"node","type":"bytes32","indexed":true},{"name":"indexedKey","type":"string","indexed":true},{"name":"key","type":"string","indexed":false}]}"#,
    },
    // multihash(bytes32)
    ResolverInterface {
        id: [0xe8, 0x94, 0x01, 0xa1],
        event_json: r#"{"type":"event","name":"MultihashChanged","anonymous":false,"inputs":[{"name":"node","type":"bytes32","indexed":true},{"name":"hash","type":"bytes","indexed":false}]}"#,
    },
    // contenthash(bytes32)
    ResolverInterface {
        id: [0xbc, 0x1c, 0x58, 0xd1],
        event_json: r#"{"type":"event","name":"ContenthashChanged","anonymous":false,"inputs":[{"name":"node","type":"bytes32","indexed":true},{"name":"hash","type":"bytes","indexed":false}]}"#,
    },
];

/// Probes a resolver address for its supported interfaces.
#[derive(Clone)]
pub struct InterfaceGetter {
    client: Arc<dyn ChainClient>,
}

impl InterfaceGetter {
    pub fn new(client: Arc<dyn ChainClient>) -> Self {
        Self { client }
    }

    /// The ABI covering the union of interfaces `resolver` supports at
    /// `block` (`block < 0` = latest), or `None` when it supports none.
    ///
    /// "Doesn't implement" is never an error — reverts and empty return
    /// data read as unsupported. Only transport failures surface, as
    /// [`IndexError::FetchFailed`].
    pub async fn get_abi(
        &self,
        resolver: Address,
        block: i64,
    ) -> Result<Option<String>, IndexError> {
        let mut fragments = Vec::new();
        for iface in &RESOLVER_INTERFACES {
            if self.supports(resolver, iface.id, block).await? {
                fragments.push(iface.event_json);
            }
        }
        if fragments.is_empty() {
            Ok(None)
        } else {
            Ok(Some(format!("[{}]", fragments.join(","))))
        }
    }

    async fn supports(
        &self,
        resolver: Address,
        interface_id: [u8; 4],
        block: i64,
    ) -> Result<bool, IndexError> {
        // supportsInterface(bytes4): selector ++ interface id right-padded
        // to one word.
        let mut data = Vec::with_capacity(36);
        data.extend_from_slice(&SUPPORTS_INTERFACE_SELECTOR);
        data.extend_from_slice(&interface_id);
        data.extend_from_slice(&[0u8; 28]);

        match self.client.eth_call(resolver, &data, block).await {
            Ok(ret) => Ok(ret.len() >= 32 && ret[31] != 0),
            // Reverts and execution errors mean "not ERC-165", not failure.
            Err(RpcError::Rpc(_)) => Ok(false),
            Err(e) => Err(IndexError::FetchFailed(e.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::abi::AbiParser;
    use crate::fetcher::RawLog;
    use crate::rpc::{JsonRpcError, LogFilter};
    use async_trait::async_trait;
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Answers supportsInterface from a fixed set of supported ids.
    struct ProbeClient {
        supported: HashSet<[u8; 4]>,
        calls: AtomicUsize,
        fail_transport: bool,
        revert: bool,
    }

    impl ProbeClient {
        fn supporting(ids: &[[u8; 4]]) -> Self {
            Self {
                supported: ids.iter().copied().collect(),
                calls: AtomicUsize::new(0),
                fail_transport: false,
                revert: false,
            }
        }
    }

    #[async_trait]
    impl ChainClient for ProbeClient {
        async fn get_logs(&self, _filter: &LogFilter) -> Result<Vec<RawLog>, RpcError> {
            unimplemented!("not used here")
        }

        async fn eth_call(
            &self,
            _to: Address,
            data: &[u8],
            _block: i64,
        ) -> Result<Vec<u8>, RpcError> {
            self.calls.fetch_add(1, Ordering::Relaxed);
            if self.fail_transport {
                return Err(RpcError::Http("connection reset".into()));
            }
            if self.revert {
                return Err(RpcError::Rpc(JsonRpcError {
                    code: -32000,
                    message: "execution reverted".into(),
                    data: None,
                }));
            }
            assert_eq!(&data[..4], &SUPPORTS_INTERFACE_SELECTOR);
            let mut id = [0u8; 4];
            id.copy_from_slice(&data[4..8]);
            let mut word = vec![0u8; 32];
            if self.supported.contains(&id) {
                word[31] = 1;
            }
            Ok(word)
        }
    }

    fn resolver() -> Address {
        Address::repeat_byte(0x77)
    }

    #[tokio::test]
    async fn supported_interfaces_produce_parseable_abi() {
        let client = Arc::new(ProbeClient::supporting(&[
            [0x3b, 0x3b, 0x57, 0xde], // addr
            [0x59, 0xd1, 0xd4, 0x3c], // text
        ]));
        let getter = InterfaceGetter::new(client.clone());
        let abi = getter.get_abi(resolver(), 110).await.unwrap().unwrap();

        let catalog = AbiParser::new().parse(&abi).unwrap();
        assert_eq!(catalog.schemas().len(), 2);
        assert!(catalog.by_name("AddrChanged").is_some());
        assert!(catalog.by_name("TextChanged").is_some());
        assert!(catalog.by_name("PubkeyChanged").is_none());
        // One probe per candidate interface.
        assert_eq!(client.calls.load(Ordering::Relaxed), RESOLVER_INTERFACES.len());
    }

    #[tokio::test]
    async fn every_fragment_parses() {
        let client = Arc::new(ProbeClient::supporting(&[
            [0x3b, 0x3b, 0x57, 0xde],
            [0x69, 0x1f, 0x34, 0x31],
            [0xd8, 0x38, 0x9d, 0xc5],
            [0x22, 0x03, 0xab, 0x56],
            [0xc8, 0x69, 0x02, 0x33],
            [0x59, 0xd1, 0xd4, 0x3c],
            [0xe8, 0x94, 0x01, 0xa1],
            [0xbc, 0x1c, 0x58, 0xd1],
        ]));
        let getter = InterfaceGetter::new(client);
        let abi = getter.get_abi(resolver(), -1).await.unwrap().unwrap();
        let catalog = AbiParser::new().parse(&abi).unwrap();
        assert_eq!(catalog.schemas().len(), 8);
    }

    #[tokio::test]
    async fn unsupported_resolver_yields_none() {
        let getter = InterfaceGetter::new(Arc::new(ProbeClient::supporting(&[])));
        assert!(getter.get_abi(resolver(), 110).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn revert_reads_as_unsupported() {
        let mut client = ProbeClient::supporting(&[]);
        client.revert = true;
        let getter = InterfaceGetter::new(Arc::new(client));
        assert!(getter.get_abi(resolver(), 110).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn transport_error_is_fetch_failed() {
        let mut client = ProbeClient::supporting(&[]);
        client.fail_transport = true;
        let getter = InterfaceGetter::new(Arc::new(client));
        let err = getter.get_abi(resolver(), 110).await.unwrap_err();
        assert!(matches!(err, IndexError::FetchFailed(_)));
    }
}
