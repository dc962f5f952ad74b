//! Typed scalar values carried in decoded event argument maps.

use alloy_primitives::{Address, B256, U256};
use std::fmt;

/// A decoded log argument value.
///
/// Indexed reference types (string, bytes, arrays) only surface their
/// keccak256 hash on the wire, so they arrive here as [`ScalarValue::Hash`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScalarValue {
    Bool(bool),
    Uint(U256),
    Address(Address),
    /// A 32-byte value: `bytes32` arguments and hashed indexed arguments.
    Hash(B256),
    Bytes(Vec<u8>),
    Str(String),
}

impl ScalarValue {
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_address(&self) -> Option<Address> {
        match self {
            Self::Address(a) => Some(*a),
            _ => None,
        }
    }

    pub fn as_hash(&self) -> Option<B256> {
        match self {
            Self::Hash(h) => Some(*h),
            _ => None,
        }
    }

    /// Coerce to u64 if this is a Uint that fits.
    pub fn as_u64(&self) -> Option<u64> {
        match self {
            Self::Uint(u) => u64::try_from(*u).ok(),
            _ => None,
        }
    }

    /// Decimal string rendering of a Uint (used for uint256 columns).
    pub fn as_uint_string(&self) -> Option<String> {
        match self {
            Self::Uint(u) => Some(u.to_string()),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Self::Bytes(b) => Some(b.as_slice()),
            _ => None,
        }
    }
}

impl fmt::Display for ScalarValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(b) => write!(f, "{b}"),
            Self::Uint(u) => write!(f, "{u}"),
            Self::Address(a) => write!(f, "{a:#x}"),
            Self::Hash(h) => write!(f, "{h:#x}"),
            Self::Bytes(b) => write!(f, "0x{}", hex::encode(b)),
            Self::Str(s) => write!(f, "{s}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn u64_coercion_bounds() {
        assert_eq!(ScalarValue::Uint(U256::from(300u64)).as_u64(), Some(300));
        assert_eq!(ScalarValue::Uint(U256::MAX).as_u64(), None);
        assert_eq!(ScalarValue::Bool(true).as_u64(), None);
    }

    #[test]
    fn display_hex_forms() {
        let h = ScalarValue::Hash(B256::repeat_byte(0x11));
        assert!(h.to_string().starts_with("0x1111"));
        let b = ScalarValue::Bytes(vec![0xde, 0xad]);
        assert_eq!(b.to_string(), "0xdead");
    }
}
