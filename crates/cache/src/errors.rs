//! Error types for the cache crate

/// Result type for cache operations
pub type Result<T> = std::result::Result<T, CacheError>;

#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    /// A cache that can hold nothing cannot satisfy its own invariants
    #[error("invalid cache capacity {capacity}: must be at least 1")]
    InvalidCapacity { capacity: usize },

    /// Input could not be encoded for fingerprinting
    #[error("failed to fingerprint input: {source}")]
    Fingerprint {
        #[source]
        source: serde_json::Error,
    },
}

impl From<CacheError> for esoworker_core::Error {
    fn from(error: CacheError) -> Self {
        esoworker_core::Error::configuration(error.to_string())
    }
}
