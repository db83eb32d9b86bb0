// src/task/mod.rs

//! A task: resolve sources, push each through the transform chain, write the
//! results under the destination root.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::config::model::{ConfigFile, TaskConfig};
use crate::errors::{PipelineError, Result};
use crate::pathset::{self, PathSet, PathSpec, SourceFile};
use crate::transform::{Asset, BuildEnv, Transform, TransformError, TransformKind, chain_output_name};
use crate::types::{ReloadKind, TaskName};

/// Why a task run (or one file of it) failed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TaskError {
    #[error("resolving sources: {0}")]
    Resolve(String),

    #[error("reading {}: {reason}", path.display())]
    Read { path: PathBuf, reason: String },

    #[error(transparent)]
    Transform(#[from] TransformError),

    #[error("writing {}: {reason}", path.display())]
    Write { path: PathBuf, reason: String },

    #[error("task panicked: {0}")]
    Panicked(String),
}

/// Result of one `Task::run`.
#[derive(Debug, Clone)]
pub struct TaskReport {
    pub task: TaskName,
    /// Destination files written during this run.
    pub written: Vec<PathBuf>,
    /// Every failure of this run; empty means success.
    pub errors: Vec<TaskError>,
}

impl TaskReport {
    pub fn new(task: impl Into<TaskName>) -> Self {
        Self {
            task: task.into(),
            written: Vec::new(),
            errors: Vec::new(),
        }
    }

    /// Report for a run that failed outright.
    pub fn failed(task: impl Into<TaskName>, error: TaskError) -> Self {
        let mut report = Self::new(task);
        report.errors.push(error);
        report
    }

    pub fn succeeded(&self) -> bool {
        self.errors.is_empty()
    }

    /// Live-reload signal this run should emit, if any.
    ///
    /// Failed runs never signal (stale output stays in place); successful
    /// runs that wrote nothing have nothing to signal.
    pub fn reload_kind(&self) -> Option<ReloadKind> {
        if !self.succeeded() {
            return None;
        }
        ReloadKind::for_outputs(&self.written)
    }

    pub fn first_error(&self) -> Option<&TaskError> {
        self.errors.first()
    }
}

/// Static task definition. Built once at startup, never mutated.
#[derive(Debug, Clone)]
pub struct Task {
    name: TaskName,
    source: PathSpec,
    destination: PathBuf,
    chain: Vec<Transform>,
}

impl Task {
    pub fn new(
        name: impl Into<TaskName>,
        source: PathSpec,
        destination: impl Into<PathBuf>,
        chain: Vec<Transform>,
    ) -> Self {
        Self {
            name: name.into(),
            source,
            destination: destination.into(),
            chain,
        }
    }

    /// Build a task from its config section, binding tools from `[tools]`.
    pub fn from_config(name: &str, tc: &TaskConfig, cfg: &ConfigFile) -> Result<Self> {
        let source = PathSpec::new(&tc.src, tc.allow_empty).map_err(|e| {
            PipelineError::ConfigError(format!("task '{name}': {e:#}"))
        })?;

        let chain = tc
            .transforms
            .iter()
            .map(|t| {
                let kind: TransformKind = t
                    .parse()
                    .map_err(|e| PipelineError::ConfigError(format!("task '{name}': {e}")))?;
                Ok(Transform::new(kind, cfg.tool(kind.as_str()).map(str::to_string)))
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self::new(name, source, &tc.dest, chain))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn source(&self) -> &PathSpec {
        &self.source
    }

    /// Destination root, relative to the project root.
    pub fn destination(&self) -> &Path {
        &self.destination
    }

    pub fn chain(&self) -> &[Transform] {
        &self.chain
    }

    /// Resolve the source spec against the current filesystem.
    pub fn resolve(&self, env: &BuildEnv) -> anyhow::Result<PathSet> {
        pathset::resolve(&self.source, env.fs.as_ref(), &env.root)
    }

    /// Run the task once.
    ///
    /// Never panics and never returns early on a single bad file: each
    /// source goes through the chain independently and failures are
    /// collected in the report.
    pub async fn run(&self, env: &BuildEnv) -> TaskReport {
        let started = Instant::now();
        let mut report = TaskReport::new(&self.name);
        info!(task = %self.name, "task started");

        let resolved = {
            let spec = self.source.clone();
            let fs = Arc::clone(&env.fs);
            let root = env.root.clone();
            tokio::task::spawn_blocking(move || pathset::resolve(&spec, fs.as_ref(), &root)).await
        };

        let pathset = match resolved {
            Ok(Ok(set)) => set,
            Ok(Err(err)) => {
                error!(task = %self.name, error = %format!("{err:#}"), "failed to resolve sources");
                report.errors.push(TaskError::Resolve(format!("{err:#}")));
                return report;
            }
            Err(join_err) => {
                report.errors.push(TaskError::Panicked(join_err.to_string()));
                return report;
            }
        };

        if pathset.is_empty() {
            debug!(task = %self.name, patterns = ?pathset.patterns(), "no source files matched");
        }

        for file in pathset.iter() {
            match self.build_file(file, env).await {
                Ok(Some(written)) => report.written.push(written),
                Ok(None) => {}
                Err(err) => {
                    error!(task = %self.name, path = ?file.path, error = %err, "failed to build file");
                    report.errors.push(err);
                }
            }
        }

        let elapsed_ms = started.elapsed().as_millis() as u64;
        if report.succeeded() {
            info!(
                task = %self.name,
                written = report.written.len(),
                elapsed_ms,
                "task finished"
            );
        } else {
            warn!(
                task = %self.name,
                written = report.written.len(),
                failed = report.errors.len(),
                elapsed_ms,
                "task failed"
            );
        }

        report
    }

    async fn build_file(&self, file: &SourceFile, env: &BuildEnv) -> std::result::Result<Option<PathBuf>, TaskError> {
        let contents = tokio::fs::read(&file.path).await.map_err(|e| TaskError::Read {
            path: file.path.clone(),
            reason: e.to_string(),
        })?;

        let destination = env
            .root
            .join(&self.destination)
            .join(chain_output_name(&self.chain, &file.relative));

        let mut asset = Asset {
            source: file.path.clone(),
            relative: file.relative.clone(),
            destination,
            contents,
        };

        for transform in &self.chain {
            match transform.apply(asset, env).await? {
                Some(next) => asset = next,
                None => return Ok(None),
            }
        }

        write_output(&asset.destination, &asset.contents).await?;
        debug!(task = %self.name, from = ?asset.source, to = ?asset.destination, "wrote output");
        Ok(Some(asset.destination))
    }
}

async fn write_output(path: &Path, contents: &[u8]) -> std::result::Result<(), TaskError> {
    let write_err = |e: std::io::Error| TaskError::Write {
        path: path.to_path_buf(),
        reason: e.to_string(),
    };
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await.map_err(write_err)?;
    }
    tokio::fs::write(path, contents).await.map_err(write_err)
}
