//! Parsing and validation of `ember.toml` runtime configuration files.
//!
//! This crate reads the runtime configuration and produces a strongly-typed
//! [`EmberConfig`] describing the build identity, active runtime flags,
//! checksum policy and memory limits that cache entries are bound to.

#![warn(missing_docs)]

pub mod error;
pub mod loader;
pub mod types;

pub use error::ConfigError;
pub use loader::{load_config, load_config_from_str, CONFIG_FILE_NAME};
pub use types::*;
