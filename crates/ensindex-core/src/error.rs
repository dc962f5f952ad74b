//! Error taxonomy for the indexing pipeline.

use alloy_primitives::B256;
use thiserror::Error;

/// Errors that can occur during an indexing pass.
#[derive(Debug, Error)]
pub enum IndexError {
    /// ABI JSON was malformed or declared an unrecognised event type.
    /// Fatal at init — the process should abort.
    #[error("bad ABI: {0}")]
    BadAbi(String),

    /// Log fetch or contract call failed at the transport level.
    /// Transient — the next pass retries from the last checkpoint.
    #[error("fetch failed: {0}")]
    FetchFailed(String),

    /// The node reports no block for a header hash we hold.
    #[error("no such block: {block_hash}")]
    NoSuchBlock { block_hash: String },

    /// topic0 matched a schema but the payload did not unpack against it.
    /// A data-model mismatch, not transient.
    #[error("decode failed for '{event}': {reason}")]
    DecodeFailed { event: String, reason: String },

    /// A non-NewOwner event referenced a name with no prior record —
    /// NewOwner coverage is missing. Requires operator attention.
    #[error("no record for node {node:#x} at or before block {block}")]
    RecordMissing { node: B256, block: i64 },

    /// Checkpoint store failure. Transient — the next pass retries.
    #[error("checkpoint error: {0}")]
    Checkpoint(String),

    /// Domain-record write conflict; retried once, then escalated.
    #[error("write conflict: {0}")]
    WriteConflict(String),
}

impl IndexError {
    /// Returns `true` if the next pass is expected to succeed without
    /// operator intervention.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::FetchFailed(_) | Self::Checkpoint(_) | Self::WriteConflict(_)
        )
    }

    /// Returns `true` if the process should exit rather than keep polling.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::BadAbi(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryable_classification() {
        assert!(IndexError::FetchFailed("timeout".into()).is_retryable());
        assert!(IndexError::Checkpoint("pool closed".into()).is_retryable());
        assert!(!IndexError::BadAbi("not json".into()).is_retryable());
        assert!(!IndexError::DecodeFailed {
            event: "Transfer".into(),
            reason: "short data".into()
        }
        .is_retryable());
        assert!(!IndexError::RecordMissing { node: B256::ZERO, block: 5 }.is_retryable());
    }

    #[test]
    fn only_bad_abi_is_fatal() {
        assert!(IndexError::BadAbi("x".into()).is_fatal());
        assert!(!IndexError::FetchFailed("x".into()).is_fatal());
    }
}
