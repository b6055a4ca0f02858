//! Error types for the knowledge store

/// Knowledge store errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// Signature is empty or otherwise unusable as a key
    #[error("invalid signature: {0:?}")]
    InvalidSignature(String),

    /// Backend could not be reached
    #[error("knowledge store unavailable: {0}")]
    Unavailable(String),

    /// Persisted fields could not be decoded
    #[error("corrupt record at {key}: {reason}")]
    CorruptRecord {
        /// Backend key of the record
        key: String,
        /// What failed to decode
        reason: String,
    },

    /// Snapshot could not be read or written
    #[error("snapshot error: {0}")]
    Snapshot(String),
}

impl StoreError {
    /// Whether retrying the same call later may succeed
    #[inline]
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Unavailable(_))
    }
}
