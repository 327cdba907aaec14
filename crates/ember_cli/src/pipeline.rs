//! Shared helpers for CLI commands: configuration lookup and file loading.

use std::path::{Path, PathBuf};

use ember_config::{load_config, load_config_from_str, EmberConfig, CONFIG_FILE_NAME};

use crate::GlobalArgs;

/// Walks up from `start` looking for the nearest directory containing `ember.toml`.
pub fn find_config_dir(start: &Path) -> Result<PathBuf, Box<dyn std::error::Error>> {
    let mut current = start.to_path_buf();
    loop {
        if current.join(CONFIG_FILE_NAME).exists() {
            return Ok(current);
        }
        if !current.pop() {
            return Err(format!(
                "could not find {CONFIG_FILE_NAME} in {} or any parent directory",
                start.display()
            )
            .into());
        }
    }
}

/// Loads the configuration selected by the global CLI args.
///
/// `--config` may name a file or a directory holding `ember.toml`. Without
/// it, the nearest `ember.toml` above the current directory is used.
pub fn resolve_config(global: &GlobalArgs) -> Result<EmberConfig, Box<dyn std::error::Error>> {
    let config = match global.config {
        Some(ref path) => {
            let path = PathBuf::from(path);
            if path.is_file() {
                load_config_from_str(&std::fs::read_to_string(&path)?)?
            } else {
                load_config(&path)?
            }
        }
        None => load_config(&find_config_dir(&std::env::current_dir()?)?)?,
    };
    tracing::debug!(
        version = %config.runtime.version,
        flags = config.runtime.flags.len(),
        "loaded configuration"
    );
    Ok(config)
}

/// Reads a file, naming it in the error.
pub fn read_file(path: &str) -> Result<Vec<u8>, Box<dyn std::error::Error>> {
    std::fs::read(path).map_err(|e| format!("cannot read {path}: {e}").into())
}
