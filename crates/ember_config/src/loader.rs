//! Configuration file loading and validation.

use crate::error::ConfigError;
use crate::types::EmberConfig;
use std::path::Path;

/// File name looked up by [`load_config`].
pub const CONFIG_FILE_NAME: &str = "ember.toml";

/// Loads and validates an `ember.toml` configuration from a directory.
pub fn load_config(dir: &Path) -> Result<EmberConfig, ConfigError> {
    let content = std::fs::read_to_string(dir.join(CONFIG_FILE_NAME))?;
    load_config_from_str(&content)
}

/// Parses and validates an `ember.toml` configuration from a string.
pub fn load_config_from_str(content: &str) -> Result<EmberConfig, ConfigError> {
    let config: EmberConfig =
        toml::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string()))?;
    validate_config(&config)?;
    Ok(config)
}

fn validate_config(config: &EmberConfig) -> Result<(), ConfigError> {
    if config.runtime.version.is_empty() {
        return Err(ConfigError::MissingField("runtime.version".to_string()));
    }
    if let Some(flag) = config.runtime.flags.iter().find(|f| f.trim().is_empty()) {
        return Err(ConfigError::ValidationError(format!(
            "runtime flag {flag:?} is blank"
        )));
    }
    if config.read_only.chunk_size == 0 {
        return Err(ConfigError::ValidationError(
            "read_only.chunk_size must be non-zero".to_string(),
        ));
    }
    if config.heap.limit_bytes == Some(0) {
        return Err(ConfigError::ValidationError(
            "heap.limit_bytes must be non-zero".to_string(),
        ));
    }
    Ok(())
}
