// src/graph/mod.rs

//! The task graph: named tasks arranged in ordered groups.
//!
//! - [`TaskGraph`] holds the immutable task definitions and the group order
//!   declared in `[[group]]`.
//! - [`runner`] executes groups: sequentially between groups, concurrently
//!   inside a group.

pub mod runner;

use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;

use crate::config::model::ConfigFile;
use crate::errors::{PipelineError, Result};
use crate::task::Task;
use crate::transform::BuildEnv;
use crate::types::TaskName;

pub use runner::GraphReport;

/// A named set of tasks that may run concurrently.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskGroup {
    pub name: String,
    pub tasks: Vec<TaskName>,
}

/// Fixed, totally ordered composition of task groups.
#[derive(Debug, Clone)]
pub struct TaskGraph {
    groups: Vec<TaskGroup>,
    tasks: HashMap<TaskName, Arc<Task>>,
}

impl TaskGraph {
    /// Construct the graph from a validated [`ConfigFile`].
    pub fn from_config(cfg: &ConfigFile) -> Result<Self> {
        let tasks = cfg
            .tasks()
            .iter()
            .map(|(name, tc)| Task::from_config(name, tc, cfg))
            .collect::<Result<Vec<_>>>()?;

        let groups = cfg
            .groups()
            .iter()
            .map(|g| TaskGroup {
                name: g.name.clone(),
                tasks: g.tasks.clone(),
            })
            .collect();

        Self::new(groups, tasks)
    }

    /// Assemble a graph from already-built tasks.
    pub fn new(groups: Vec<TaskGroup>, tasks: Vec<Task>) -> Result<Self> {
        let tasks: HashMap<TaskName, Arc<Task>> = tasks
            .into_iter()
            .map(|t| (t.name().to_string(), Arc::new(t)))
            .collect();

        for group in &groups {
            for name in &group.tasks {
                if !tasks.contains_key(name) {
                    return Err(PipelineError::TaskNotFound(format!(
                        "{name} (listed in group '{}')",
                        group.name
                    )));
                }
            }
        }

        Ok(Self { groups, tasks })
    }

    pub fn groups(&self) -> &[TaskGroup] {
        &self.groups
    }

    pub fn group(&self, name: &str) -> Option<&TaskGroup> {
        self.groups.iter().find(|g| g.name == name)
    }

    pub fn task(&self, name: &str) -> Option<&Arc<Task>> {
        self.tasks.get(name)
    }

    pub fn task_names(&self) -> impl Iterator<Item = &str> {
        self.groups
            .iter()
            .flat_map(|g| g.tasks.iter().map(String::as_str))
    }

    /// Check every mandatory source spec matches at least one file.
    ///
    /// Run once at startup, before any build: a mandatory source that
    /// matches nothing is a configuration error, not a build failure.
    pub fn preflight(&self, env: &BuildEnv) -> Result<()> {
        for name in self.task_names() {
            let Some(task) = self.task(name) else { continue };
            if task.source().allow_empty() {
                continue;
            }
            let set = task.resolve(env)?;
            debug!(task = %name, matched = set.len(), "preflight");
            if set.is_empty() {
                return Err(PipelineError::ConfigError(format!(
                    "task '{name}': source {:?} matches no files (set allow_empty = true if this is expected)",
                    task.source().patterns()
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::model::RawConfigFile;
    use crate::fs::mock::MockFileSystem;

    const CONFIG: &str = r#"
[tools]
stylesheet-compile = "cat"

[[group]]
name = "libs"
tasks = ["css-libs", "fonts"]

[[group]]
name = "app"
tasks = ["css-main"]

[task.css-libs]
src = ["app/scss/libs/*.scss"]
dest = "./build/css/libs/"
transforms = ["stylesheet-compile", "stylesheet-minify"]

[task.fonts]
src = ["app/fonts/*"]
dest = "build/fonts"
allow_empty = true

[task.css-main]
src = ["app/scss/*.scss"]
dest = "build/css"
transforms = ["stylesheet-compile"]
"#;

    fn graph() -> TaskGraph {
        let raw: RawConfigFile = toml::from_str(CONFIG).unwrap();
        let cfg = ConfigFile::try_from(raw).unwrap();
        TaskGraph::from_config(&cfg).unwrap()
    }

    #[test]
    fn from_config_keeps_group_order_and_every_task() {
        let graph = graph();
        let names: Vec<&str> = graph.task_names().collect();
        assert_eq!(names, vec!["css-libs", "fonts", "css-main"]);
        assert_eq!(graph.groups()[1].name, "app");

        let libs = graph.task("css-libs").unwrap();
        assert_eq!(libs.chain().len(), 2);
        assert_eq!(libs.destination(), std::path::Path::new("build/css/libs"));
        assert!(graph.task("html").is_none());
    }

    #[test]
    fn new_rejects_groups_naming_missing_tasks() {
        let group = TaskGroup {
            name: "app".to_string(),
            tasks: vec!["ghost".to_string()],
        };
        assert!(matches!(
            TaskGraph::new(vec![group], Vec::new()),
            Err(PipelineError::TaskNotFound(_))
        ));
    }

    #[test]
    fn preflight_skips_optional_sources_and_flags_mandatory_ones() {
        let graph = graph();
        let fs = MockFileSystem::new();
        fs.add_file("./app/scss/libs/grid.scss", b".g{}");
        let env = BuildEnv::new(".", Arc::new(fs.clone()));

        // css-main matches nothing and is mandatory; fonts is optional.
        let err = graph.preflight(&env).unwrap_err().to_string();
        assert!(err.contains("css-main"), "{err}");

        fs.add_file("./app/scss/main.scss", b"body{}");
        graph.preflight(&env).unwrap();
    }
}
