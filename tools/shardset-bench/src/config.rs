use serde::Deserialize;

/// On-disk, CLI-overridable subset of [`shardset_core::Config`] plus the
/// parameters of a throughput run, following `nearcore/src/config.rs`'s
/// file-plus-CLI-overrides layering (here YAML rather than JSON, since
/// this tool has no need for the comment-stripping/JSON-specific
/// machinery `near_config_utils` provides).
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FileConfig {
    pub s: u32,
    pub c_max: u32,
    pub b: u64,
    pub world_size: usize,
    pub limit: u64,
}

impl Default for FileConfig {
    fn default() -> Self {
        Self { s: 32, c_max: 64, b: 1 << 27, world_size: 4, limit: 2_000_000 }
    }
}

impl FileConfig {
    pub fn from_file(path: &std::path::Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("failed to read {}: {e}", path.display()))?;
        let config: FileConfig = serde_yaml::from_str(&text)
            .map_err(|e| anyhow::anyhow!("failed to parse {}: {e}", path.display()))?;
        Ok(config)
    }

    pub fn to_shardset_config(&self) -> shardset_core::Config {
        shardset_core::Config { s: self.s, c_max: self.c_max, b: self.b }
    }
}
