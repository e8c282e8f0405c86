//! Configuration system for the Conduit agent service.
//!
//! Provides TOML-based configuration with:
//! - Config file layering (user config + project-local overrides)
//! - Command-line overrides applied last
//! - API key resolution (flag → env var → config file)
//! - One-shot validation before anything is built from the config

pub mod discovery;
pub mod error;
pub mod secrets;
pub mod types;

pub use discovery::{
    ConfigSource, Layer, LoadedConfig, load_config, load_config_file, load_config_with_options,
    load_explicit, xdg_config_dir, xdg_config_path,
};
pub use error::{ConfigError, Result};
pub use secrets::{API_KEY_ENV, ResolvedSecret, SecretSource, resolve_api_key};
pub use types::*;
