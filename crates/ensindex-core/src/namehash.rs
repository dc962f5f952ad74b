//! ENS name-hash algebra.
//!
//! A name's identifier is derived recursively:
//!   namehash(root)          = 0x00…00
//!   namehash(label.parent)  = keccak256(namehash(parent) ‖ keccak256(label))
//!
//! The registry only ever emits (parent, label-hash) pairs, so the single
//! operation needed here is the subnode step over two 32-byte hashes.

use alloy_primitives::B256;
use tiny_keccak::{Hasher, Keccak};

/// Derive the subnode hash for `label` under `parent`.
///
/// Exactly `keccak256(parent ‖ label)` over the concatenated 64 bytes.
pub fn subnode(parent: &B256, label: &B256) -> B256 {
    let mut hasher = Keccak::v256();
    let mut output = [0u8; 32];
    hasher.update(parent.as_slice());
    hasher.update(label.as_slice());
    hasher.finalize(&mut output);
    B256::from(output)
}

/// keccak256 of a raw label string (the "label hash" side of a subnode).
pub fn label_hash(label: &str) -> B256 {
    let mut hasher = Keccak::v256();
    let mut output = [0u8; 32];
    hasher.update(label.as_bytes());
    hasher.finalize(&mut output);
    B256::from(output)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn eth_tld_namehash() {
        // Well-known vector: namehash("eth") under the zero root.
        let root = B256::ZERO;
        let eth_label = label_hash("eth");
        assert_eq!(
            format!("{eth_label:#x}"),
            "0x4f5b812789fc606be1b3b16908db13fc7a9adf7ca72641f84d75b47069d3d7f0"
        );
        let node = subnode(&root, &eth_label);
        assert_eq!(
            format!("{node:#x}"),
            "0x93cdeb708b7545dc668eb9280176169d1c33cfd8ed6f04690a0bcc88a93fc4ae"
        );
    }

    #[test]
    fn subnode_is_order_sensitive() {
        let a = B256::repeat_byte(0xaa);
        let b = B256::repeat_byte(0xbb);
        assert_ne!(subnode(&a, &b), subnode(&b, &a));
    }

    #[test]
    fn subnode_differs_per_parent() {
        let label = label_hash("wallet");
        let under_root = subnode(&B256::ZERO, &label);
        let eth = subnode(&B256::ZERO, &label_hash("eth"));
        let under_eth = subnode(&eth, &label);
        assert_ne!(under_root, under_eth);
    }

    #[test]
    fn deterministic_over_fuzzed_pairs() {
        // Pseudo-random 32-byte pairs via a tiny LCG; same inputs must always
        // produce the same subnode and never collide with the swapped pair.
        let mut state = 0x5eed_1234_u64;
        let mut next_hash = || {
            let mut bytes = [0u8; 32];
            for chunk in bytes.chunks_mut(8) {
                state = state.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
                chunk.copy_from_slice(&state.to_be_bytes());
            }
            B256::from(bytes)
        };
        for _ in 0..64 {
            let parent = next_hash();
            let label = next_hash();
            assert_eq!(subnode(&parent, &label), subnode(&parent, &label));
            assert_ne!(subnode(&parent, &label), subnode(&label, &parent));
        }
    }
}
