use serde::{Deserialize, Serialize};

/// Upper bound on the length of any ancestor chain. Walks exceeding it are reported as suspected cycles.
pub const DEFAULT_MAX_CHAIN_LEN: usize = 4096;

/// Number of content nodes kept in the store cache
pub const DEFAULT_CACHE_SIZE: usize = 100_000;

/// Number of record lines handed to the verifier pool per batch
pub const DEFAULT_VERIFY_CHUNK_SIZE: usize = 1024;

/// Tunables shared by the store, navigator and verifier
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct ContentConfig {
    pub cache_size: usize,
    pub max_chain_len: usize,
    pub verify_chunk_size: usize,
}

impl Default for ContentConfig {
    fn default() -> Self {
        Self { cache_size: DEFAULT_CACHE_SIZE, max_chain_len: DEFAULT_MAX_CHAIN_LEN, verify_chunk_size: DEFAULT_VERIFY_CHUNK_SIZE }
    }
}

impl ContentConfig {
    pub fn with_max_chain_len(mut self, max_chain_len: usize) -> Self {
        self.max_chain_len = max_chain_len;
        self
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct BuildConfig {
    /// Expand sibling subtrees on the rayon pool
    pub parallel: bool,
}

impl BuildConfig {
    pub fn parallel() -> Self {
        Self { parallel: true }
    }
}
