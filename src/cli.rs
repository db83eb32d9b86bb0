// src/cli.rs

//! CLI argument parsing using `clap`.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

use crate::config::default_config_path;

/// Command-line arguments for `assetpipe`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "assetpipe",
    version,
    about = "Build front-end assets and keep a live browser session in sync.",
    long_about = None
)]
pub struct CliArgs {
    /// Path to the config file (TOML).
    ///
    /// Paths inside the config are relative to the directory holding it.
    #[arg(long, global = true, value_name = "PATH", default_value_os_t = default_config_path())]
    pub config: PathBuf,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `ASSETPIPE_LOG` or a default level will be used.
    #[arg(long, global = true, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Build only the vendor/library group, then exit.
    BuildLibs,

    /// Build everything once, then serve the build tree and rebuild on change.
    BuildApp,

    /// Build everything (or a single group) once, then exit.
    Build {
        /// Run only the named group.
        #[arg(long, value_name = "NAME")]
        group: Option<String>,
    },

    /// Serve the build tree and rebuild on change, without an initial build.
    Watch,

    /// Parse + validate, print groups, tasks and routes, but run nothing.
    Check,
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}
