// src/exec/backend.rs

//! Pluggable task backend abstraction.
//!
//! The runtime talks to a `TaskBackend` instead of running tasks itself.
//! This makes it easy to swap in a fake backend in tests while keeping the
//! production implementation here.
//!
//! - `GraphBackend` is the default implementation. It looks the task up in
//!   the [`TaskGraph`], runs it on its own Tokio task and reports the
//!   resulting [`TaskReport`] back as `RouterEvent::TaskFinished`.
//! - Tests can provide their own `TaskBackend` that, for example, records
//!   which tasks were dispatched and directly emits `TaskFinished` events.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, error};

use crate::engine::RouterEvent;
use crate::errors::{PipelineError, Result};
use crate::graph::TaskGraph;
use crate::task::{TaskError, TaskReport};
use crate::transform::BuildEnv;
use crate::types::TaskName;

/// Trait abstracting how dispatched tasks are executed.
pub trait TaskBackend: Send {
    /// Start one run of `task`.
    ///
    /// Must not wait for the run to finish: completion is reported
    /// asynchronously through a `RouterEvent::TaskFinished`.
    fn dispatch(&mut self, task: TaskName) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>>;
}

/// Backend that runs real tasks from the graph.
#[derive(Debug, Clone)]
pub struct GraphBackend {
    graph: Arc<TaskGraph>,
    env: BuildEnv,
    runtime_tx: mpsc::Sender<RouterEvent>,
}

impl GraphBackend {
    pub fn new(graph: Arc<TaskGraph>, env: BuildEnv, runtime_tx: mpsc::Sender<RouterEvent>) -> Self {
        Self {
            graph,
            env,
            runtime_tx,
        }
    }
}

impl TaskBackend for GraphBackend {
    fn dispatch(&mut self, name: TaskName) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        Box::pin(async move {
            let task = self
                .graph
                .task(&name)
                .cloned()
                .ok_or_else(|| PipelineError::TaskNotFound(name.clone()))?;
            let env = self.env.clone();
            let tx = self.runtime_tx.clone();

            tokio::spawn(async move {
                let run = tokio::spawn(async move { task.run(&env).await });
                let report = match run.await {
                    Ok(report) => report,
                    Err(join_err) => {
                        error!(task = %name, error = %join_err, "task aborted");
                        TaskReport::failed(name.clone(), TaskError::Panicked(join_err.to_string()))
                    }
                };
                if tx.send(RouterEvent::TaskFinished { report }).await.is_err() {
                    debug!(task = %name, "runtime gone; dropping task report");
                }
            });

            Ok(())
        })
    }
}
