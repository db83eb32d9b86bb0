// src/config/loader.rs

use std::fs;
use std::path::{Path, PathBuf};

use crate::config::model::{ConfigFile, RawConfigFile};
use crate::errors::{PipelineError, Result};

/// Load a configuration file from a given path and return the raw
/// `RawConfigFile`.
///
/// This only performs TOML deserialization; it does **not** perform semantic
/// validation. Use [`load_and_validate`] for that.
pub fn load_from_path(path: impl AsRef<Path>) -> Result<RawConfigFile> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path).map_err(|e| {
        PipelineError::ConfigError(format!("cannot read {}: {e}", path.display()))
    })?;

    let config: RawConfigFile = toml::from_str(&contents)?;

    Ok(config)
}

/// Load a configuration file from path and validate it.
///
/// - Reads TOML.
/// - Applies defaults (handled by `serde` + `Default` impls).
/// - Checks groups, routes, transform names, chain order, required tools and
///   the output-to-input ordering between tasks.
///
/// Checks that need the filesystem (mandatory sources matching nothing) run
/// later, in `TaskGraph::preflight`, but still before any build starts.
pub fn load_and_validate(path: impl AsRef<Path>) -> Result<ConfigFile> {
    let raw_config = load_from_path(&path)?;
    let config = ConfigFile::try_from(raw_config)?;
    Ok(config)
}

/// Default config location: `Assetpipe.toml` in the working directory.
pub fn default_config_path() -> PathBuf {
    PathBuf::from("Assetpipe.toml")
}
