// src/lib.rs

pub mod cli;
pub mod config;
pub mod context;
pub mod engine;
pub mod errors;
pub mod exec;
pub mod fs;
pub mod graph;
pub mod logging;
pub mod pathset;
pub mod reload;
pub mod server;
pub mod task;
pub mod transform;
pub mod types;
pub mod watch;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, error, info};

use crate::cli::{CliArgs, Command};
use crate::config::loader::load_and_validate;
use crate::config::model::ConfigFile;
use crate::context::AppContext;
use crate::errors::Result;
use crate::fs::RealFileSystem;
use crate::graph::GraphReport;
use crate::watch::RouteTable;

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - config loading and validation
/// - the task graph and one-shot builds
/// - (for `build-app` / `watch`) the dev server, router and file watcher
/// - Ctrl-C handling
pub async fn run(args: CliArgs) -> Result<()> {
    let config_path = args.config.clone();
    let cfg = load_and_validate(&config_path)?;

    if let Command::Check = args.command {
        print_check(&cfg)?;
        return Ok(());
    }

    let root = config_root_dir(&config_path);
    let mut ctx = AppContext::new(cfg, root, Arc::new(RealFileSystem))?;
    ctx.preflight()?;

    match args.command {
        Command::BuildLibs => {
            let group = ctx.config().config.libs_group.clone();
            ctx.build_group(&group).await?.into_result()
        }
        Command::Build { group: Some(group) } => ctx.build_group(&group).await?.into_result(),
        Command::Build { group: None } => ctx.build_all().await.into_result(),
        Command::BuildApp => {
            let report = ctx.build_all().await;
            log_initial_build(&report);
            watch(ctx).await
        }
        Command::Watch => watch(ctx).await,
        Command::Check => Ok(()),
    }
}

/// Run the watch phase until interrupted, then shut down cleanly.
async fn watch(mut ctx: AppContext) -> Result<()> {
    ctx.start_watch_phase().await?;
    ctx.wait_for_exit().await?;
    ctx.shutdown().await
}

/// The initial `build-app` build never aborts the watch phase: a broken file
/// is usually what the developer is about to fix.
fn log_initial_build(report: &GraphReport) {
    match report.first_failure() {
        None => info!(tasks = report.reports.len(), "initial build finished"),
        Some(failed) => {
            let reason = failed
                .first_error()
                .map(|e| e.to_string())
                .unwrap_or_default();
            error!(task = %failed.task, %reason, "initial build had failures; watching anyway");
        }
    }
}

/// Figure out the project root.
///
/// - If the config path has a non-empty parent (e.g. "site/Assetpipe.toml"),
///   we use that directory.
/// - If it's just a bare filename like "Assetpipe.toml" (parent = ""),
///   we fall back to the current working directory "."
fn config_root_dir(config_path: &Path) -> PathBuf {
    match config_path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
    }
}

/// `check` output: groups in run order, each task's chain, and the routes.
fn print_check(cfg: &ConfigFile) -> Result<()> {
    println!("assetpipe check");
    println!("  config.dest_root = {}", cfg.config.dest_root);
    println!("  config.libs_group = {}", cfg.config.libs_group);
    println!("  server = {}:{}", cfg.server.host, cfg.server.port);
    println!();

    println!("groups ({}):", cfg.groups().len());
    for group in cfg.groups() {
        println!("  - {}", group.name);
        for name in &group.tasks {
            let Some(task) = cfg.tasks().get(name) else { continue };
            println!("      {name}");
            println!("          src: {:?}", task.src);
            println!("          dest: {}", task.dest);
            if task.transforms.is_empty() {
                println!("          transforms: (copy)");
            } else {
                println!("          transforms: {}", task.transforms.join(" -> "));
            }
            if task.watch.is_some() {
                println!("          watch: {:?}", task.effective_watch());
            }
            if task.allow_empty {
                println!("          allow_empty: true");
            }
        }
    }

    let routes = RouteTable::from_config(cfg)?;
    println!();
    println!("watch roots:");
    for root in routes.watch_roots() {
        let shown = if root.as_os_str().is_empty() {
            ".".to_string()
        } else {
            root.display().to_string()
        };
        println!("  - {shown}");
    }

    if !cfg.routes().is_empty() {
        println!();
        println!("extra routes ({}):", cfg.routes().len());
        for route in cfg.routes() {
            println!("  - {:?} -> {}", route.watch, route.task);
        }
    }

    debug!("check complete (no execution)");
    Ok(())
}
