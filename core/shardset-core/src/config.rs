use crate::error::ConfigError;
use serde::{Deserialize, Serialize};

/// The three tuning constants: process-wide invariants, frozen for the
/// lifetime of a [`crate::Context`]. [`Config::validate`] must be called
/// (and pass) before a context is constructed; there is no setter exposed
/// afterward, so a validated `Config` consumed into a `Context` cannot
/// drift during the context's lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Chunk size: buckets fetched per prefetch, reference value 32.
    pub s: u32,
    /// Max probe chunks per `find_or_put` call, reference value 64.
    pub c_max: u32,
    /// Per-shard block size, reference value 2^27.
    pub b: u64,
}

impl Config {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.s == 0 {
            return Err(ConfigError::ZeroChunkSize);
        }
        if self.c_max == 0 {
            return Err(ConfigError::ZeroProbeBudget);
        }
        if self.s as u64 > self.b {
            return Err(ConfigError::ChunkLargerThanBlock { s: self.s, b: self.b });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn reference_configuration_validates() {
        let config = Config { s: 32, c_max: 64, b: 1 << 27 };
        assert_matches!(config.validate(), Ok(()));
    }

    #[test]
    fn chunk_larger_than_block_is_rejected() {
        let config = Config { s: 32, c_max: 4, b: 16 };
        assert_matches!(config.validate(), Err(ConfigError::ChunkLargerThanBlock { s: 32, b: 16 }));
    }

    #[test]
    fn zero_chunk_size_is_rejected() {
        let config = Config { s: 0, c_max: 4, b: 16 };
        assert_matches!(config.validate(), Err(ConfigError::ZeroChunkSize));
    }

    #[test]
    fn zero_probe_budget_is_rejected() {
        let config = Config { s: 4, c_max: 0, b: 16 };
        assert_matches!(config.validate(), Err(ConfigError::ZeroProbeBudget));
    }
}
