// src/logging.rs

//! Logging setup for `assetpipe` using `tracing` + `tracing-subscriber`.
//!
//! The filter is chosen in this order:
//! 1. `--log-level` sets one level for the whole process.
//! 2. `ASSETPIPE_LOG` accepts full filter directives, e.g.
//!    `assetpipe=debug,tower_http=warn`.
//! 3. Otherwise `info` for this crate and `warn` for everything else.
//!
//! Logs go to STDERR; stdout is reserved for `check` output.

use anyhow::{Context, Result};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt;

use crate::cli::LogLevel;

/// Name of the environment variable consulted when no flag is given.
pub const LOG_ENV_VAR: &str = "ASSETPIPE_LOG";

const DEFAULT_DIRECTIVES: &str = "warn,assetpipe=info";

/// Initialise global logging subscriber. Call once at startup.
pub fn init_logging(cli_level: Option<LogLevel>) -> Result<()> {
    let env_value = std::env::var(LOG_ENV_VAR).ok();
    let filter = build_filter(cli_level, env_value.as_deref())?;

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| anyhow::anyhow!("installing log subscriber: {e}"))
}

fn build_filter(cli_level: Option<LogLevel>, env_value: Option<&str>) -> Result<EnvFilter> {
    if let Some(level) = cli_level {
        return Ok(EnvFilter::new(level_directive(level)));
    }
    match env_value.map(str::trim).filter(|s| !s.is_empty()) {
        Some(directives) => EnvFilter::try_new(directives)
            .with_context(|| format!("invalid {LOG_ENV_VAR} value {directives:?}")),
        None => Ok(EnvFilter::new(DEFAULT_DIRECTIVES)),
    }
}

fn level_directive(level: LogLevel) -> &'static str {
    match level {
        LogLevel::Error => "error",
        LogLevel::Warn => "warn",
        LogLevel::Info => "info",
        LogLevel::Debug => "debug",
        LogLevel::Trace => "trace",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flag_wins_over_environment() {
        let filter = build_filter(Some(LogLevel::Debug), Some("error")).unwrap();
        assert_eq!(filter.to_string(), "debug");
    }

    #[test]
    fn environment_accepts_directives() {
        let filter = build_filter(None, Some("assetpipe=trace,tower_http=warn")).unwrap();
        let text = filter.to_string();
        assert!(text.contains("assetpipe=trace"), "{text}");
        assert!(text.contains("tower_http=warn"), "{text}");
    }

    #[test]
    fn blank_environment_falls_back_to_default() {
        let filter = build_filter(None, Some("  ")).unwrap();
        assert!(filter.to_string().contains("assetpipe=info"));
    }

    #[test]
    fn malformed_environment_is_an_error() {
        assert!(build_filter(None, Some("assetpipe=loud")).is_err());
    }
}
