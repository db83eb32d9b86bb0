// src/graph/runner.rs

//! Executing groups of tasks.

use std::sync::Arc;

use tracing::{error, info};

use crate::errors::{PipelineError, Result};
use crate::graph::{TaskGraph, TaskGroup};
use crate::reload::ChangeNotifier;
use crate::task::{TaskError, TaskReport};
use crate::transform::BuildEnv;

/// Outcome of running one or more groups.
///
/// Reports are kept in declaration order (group order, then task order
/// inside the group), so `first_failure` is deterministic even though tasks
/// inside a group finish in any order.
#[derive(Debug, Clone, Default)]
pub struct GraphReport {
    pub reports: Vec<TaskReport>,
}

impl GraphReport {
    pub fn first_failure(&self) -> Option<&TaskReport> {
        self.reports.iter().find(|r| !r.succeeded())
    }

    pub fn succeeded(&self) -> bool {
        self.first_failure().is_none()
    }

    pub fn report(&self, task: &str) -> Option<&TaskReport> {
        self.reports.iter().find(|r| r.task == task)
    }

    /// Turn the first failure (if any) into an error.
    pub fn into_result(self) -> Result<()> {
        match self.first_failure() {
            None => Ok(()),
            Some(report) => Err(PipelineError::TaskFailed {
                task: report.task.clone(),
                reason: report
                    .first_error()
                    .map(|e| e.to_string())
                    .unwrap_or_else(|| "unknown error".to_string()),
            }),
        }
    }
}

impl TaskGraph {
    /// Run every group once, in declared order.
    ///
    /// A failed task never stops its siblings or later groups; the report
    /// records every outcome.
    pub async fn run_all(&self, env: &BuildEnv, notifier: &ChangeNotifier) -> GraphReport {
        let mut report = GraphReport::default();
        for group in self.groups() {
            let mut reports = self.run_group_inner(group, env, notifier).await;
            report.reports.append(&mut reports);
        }
        report
    }

    /// Run a single named group once.
    pub async fn run_group(
        &self,
        name: &str,
        env: &BuildEnv,
        notifier: &ChangeNotifier,
    ) -> Result<GraphReport> {
        let group = self
            .group(name)
            .ok_or_else(|| PipelineError::ConfigError(format!("unknown group '{name}'")))?;
        let reports = self.run_group_inner(group, env, notifier).await;
        Ok(GraphReport { reports })
    }

    /// Spawn every task of `group`, then join them all.
    async fn run_group_inner(
        &self,
        group: &TaskGroup,
        env: &BuildEnv,
        notifier: &ChangeNotifier,
    ) -> Vec<TaskReport> {
        info!(group = %group.name, tasks = ?group.tasks, "group started");

        let handles: Vec<_> = group
            .tasks
            .iter()
            .filter_map(|name| self.task(name).map(|t| (name.clone(), Arc::clone(t))))
            .map(|(name, task)| {
                let env = env.clone();
                let notifier = notifier.clone();
                let handle = tokio::spawn(async move {
                    let report = task.run(&env).await;
                    notifier.task_finished(&report);
                    report
                });
                (name, handle)
            })
            .collect();

        let mut reports = Vec::with_capacity(handles.len());
        for (name, handle) in handles {
            match handle.await {
                Ok(report) => reports.push(report),
                Err(join_err) => {
                    error!(task = %name, error = %join_err, "task aborted");
                    reports.push(TaskReport::failed(
                        name,
                        TaskError::Panicked(join_err.to_string()),
                    ));
                }
            }
        }

        let failed = reports.iter().filter(|r| !r.succeeded()).count();
        info!(group = %group.name, failed, "group finished");
        reports
    }
}
