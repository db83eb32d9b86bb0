// src/config/mod.rs

//! Configuration loading and validation for assetpipe.
//!
//! Responsibilities:
//! - Define the TOML-backed data model (`model.rs`).
//! - Load a config file from disk (`loader.rs`).
//! - Validate groups, transform chains, tools and stage ordering
//!   (`validate.rs`).

pub mod loader;
pub mod model;
pub mod validate;

pub use loader::{default_config_path, load_and_validate, load_from_path};
pub use model::{
    ConfigFile, ConfigSection, GroupConfig, RawConfigFile, RouteConfig, ServerSection,
    TaskConfig,
};
