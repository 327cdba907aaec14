//! Configuration types deserialized from `ember.toml`.

use serde::Deserialize;

/// Default read-only region chunk size in bytes.
pub const DEFAULT_CHUNK_SIZE: u32 = 256 * 1024;

/// The top-level runtime configuration parsed from `ember.toml`.
///
/// Every setting that influences the bytes of a cache entry lives here, so
/// two processes loading the same file produce and accept the same entries.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct EmberConfig {
    /// Build identity and active runtime flags.
    pub runtime: RuntimeConfig,
    /// Cache codec settings.
    #[serde(default)]
    pub codec: CodecConfig,
    /// Heap limits.
    #[serde(default)]
    pub heap: HeapConfig,
    /// Read-only region layout.
    #[serde(default)]
    pub read_only: ReadOnlyConfig,
}

/// Identity of the runtime build producing or consuming cache entries.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RuntimeConfig {
    /// Version string of the build. Entries from other versions are rejected.
    pub version: String,
    /// Runtime flags that affect code generation. Order does not matter.
    #[serde(default)]
    pub flags: Vec<String>,
}

/// Cache codec settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CodecConfig {
    /// Whether entries carry and are checked against a payload checksum.
    #[serde(default = "default_verify_checksum")]
    pub verify_checksum: bool,
}

impl Default for CodecConfig {
    fn default() -> Self {
        Self {
            verify_checksum: default_verify_checksum(),
        }
    }
}

fn default_verify_checksum() -> bool {
    true
}

/// Heap limits.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct HeapConfig {
    /// Maximum bytes the shared heap may hold. Unlimited when absent.
    #[serde(default)]
    pub limit_bytes: Option<usize>,
}

/// Read-only region layout.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ReadOnlyConfig {
    /// Size of each region chunk in bytes.
    #[serde(default = "default_chunk_size")]
    pub chunk_size: u32,
}

impl Default for ReadOnlyConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
        }
    }
}

fn default_chunk_size() -> u32 {
    DEFAULT_CHUNK_SIZE
}

impl EmberConfig {
    /// Returns a configuration for `version` with no flags and default settings.
    pub fn for_version(version: &str) -> Self {
        Self {
            runtime: RuntimeConfig {
                version: version.to_string(),
                flags: Vec::new(),
            },
            codec: CodecConfig::default(),
            heap: HeapConfig::default(),
            read_only: ReadOnlyConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn for_version_uses_defaults() {
        let config = EmberConfig::for_version("1.2.3");
        assert_eq!(config.runtime.version, "1.2.3");
        assert!(config.runtime.flags.is_empty());
        assert!(config.codec.verify_checksum);
        assert_eq!(config.heap.limit_bytes, None);
        assert_eq!(config.read_only.chunk_size, DEFAULT_CHUNK_SIZE);
    }
}
