/// Configuration faults: detected at construction, fatal, fail the
/// collective launch rather than surfacing mid-probe.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("chunk size {s} must not exceed block size {b}")]
    ChunkLargerThanBlock { s: u32, b: u64 },

    #[error("chunk size (S) must be nonzero")]
    ZeroChunkSize,

    #[error("probe budget (Cmax) must be nonzero")]
    ZeroProbeBudget,
}

/// Errors `find_or_put` can return. `FULL` (capacity exhaustion) is
/// deliberately not a member of this enum: it is a caller-observable
/// return value, not a fault.
#[derive(Debug, thiserror::Error)]
pub enum ShardSetError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Transport(#[from] shardset_transport::TransportError),
}
