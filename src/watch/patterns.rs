// src/watch/patterns.rs

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::warn;

use crate::config::model::ConfigFile;
use crate::fs::FileSystem;
use crate::pathset::PathSpec;
use crate::types::TaskName;
use crate::watch::path_utils::to_slash;

/// One glob-to-task route.
///
/// Patterns are relative to the project root; `!` entries are subtracted from
/// the union of the others. The watcher passes relative paths with forward
/// slashes (e.g. `"app/assets/scss/main.scss"`) into [`WatchRoute::matches`].
#[derive(Clone)]
pub struct WatchRoute {
    task: TaskName,
    spec: PathSpec,
}

impl fmt::Debug for WatchRoute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WatchRoute")
            .field("task", &self.task)
            .field("patterns", &self.spec.patterns())
            .finish()
    }
}

impl WatchRoute {
    pub fn new(task: impl Into<TaskName>, patterns: &[String]) -> Result<Self> {
        let task = task.into();
        let spec = PathSpec::new(patterns, true)
            .with_context(|| format!("building watch route for task {task}"))?;
        Ok(Self { task, spec })
    }

    /// Name of the task this route triggers.
    pub fn task(&self) -> &str {
        &self.task
    }

    pub fn patterns(&self) -> &[String] {
        self.spec.patterns()
    }

    pub fn matches(&self, rel_path: &str) -> bool {
        self.spec.matches(rel_path)
    }

    /// Literal directory prefixes of the positive patterns.
    pub fn roots(&self) -> impl Iterator<Item = &Path> {
        self.spec.bases()
    }
}

/// Every route known to the router, in declaration order.
#[derive(Debug, Clone, Default)]
pub struct RouteTable {
    routes: Vec<WatchRoute>,
}

impl RouteTable {
    pub fn new(routes: Vec<WatchRoute>) -> Self {
        Self { routes }
    }

    /// One route per task (its `watch` list, defaulting to `src`), then one
    /// per `[[route]]` entry.
    pub fn from_config(cfg: &ConfigFile) -> Result<Self> {
        let mut routes = Vec::new();
        for group in cfg.groups() {
            for name in &group.tasks {
                let Some(task) = cfg.tasks().get(name) else { continue };
                routes.push(WatchRoute::new(name.clone(), task.effective_watch())?);
            }
        }
        for route in cfg.routes() {
            routes.push(WatchRoute::new(route.task.clone(), &route.watch)?);
        }
        Ok(Self { routes })
    }

    pub fn routes(&self) -> &[WatchRoute] {
        &self.routes
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// Tasks whose routes match `rel_path`, each named once, in route order.
    pub fn targets(&self, rel_path: &str) -> Vec<TaskName> {
        let mut out: Vec<TaskName> = Vec::new();
        for route in self.routes.iter().filter(|r| r.matches(rel_path)) {
            if !out.iter().any(|t| t == route.task()) {
                out.push(route.task.clone());
            }
        }
        out
    }

    /// Distinct directories to register with the filesystem watcher.
    ///
    /// Roots nested under another root are dropped since watches are
    /// recursive. An empty path stands for the project root itself.
    pub fn watch_roots(&self) -> Vec<PathBuf> {
        let mut roots: Vec<PathBuf> = self
            .routes
            .iter()
            .flat_map(|r| r.roots().map(Path::to_path_buf))
            .collect();
        roots.sort();
        roots.dedup();

        let all = roots.clone();
        roots.retain(|root| {
            !all.iter()
                .any(|other| other != root && root.starts_with(other))
        });
        roots
    }

    /// Files present under the watch roots that more than one task would
    /// react to. Each is logged as a warning; the router fans such events
    /// out to every matching task.
    pub fn report_overlaps(
        &self,
        fs: &dyn FileSystem,
        root: &Path,
    ) -> Result<BTreeMap<String, Vec<TaskName>>> {
        let mut overlaps = BTreeMap::new();

        for watch_root in self.watch_roots() {
            for path in collect_files(fs, &root.join(&watch_root))? {
                let Ok(rel) = path.strip_prefix(root) else { continue };
                let rel = to_slash(rel);
                let targets = self.targets(&rel);
                if targets.len() > 1 {
                    warn!(path = %rel, tasks = ?targets, "file matches routes of several tasks");
                    overlaps.insert(rel, targets);
                }
            }
        }

        Ok(overlaps)
    }
}

fn collect_files(fs: &dyn FileSystem, dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    if !fs.is_dir(dir) {
        return Ok(files);
    }
    let mut stack = vec![dir.to_path_buf()];

    while let Some(dir) = stack.pop() {
        for path in fs.read_dir(&dir)? {
            if fs.is_dir(&path) {
                stack.push(path);
            } else if fs.is_file(&path) {
                files.push(path);
            }
        }
    }

    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::mock::MockFileSystem;

    fn pats(p: &[&str]) -> Vec<String> {
        p.iter().map(|s| s.to_string()).collect()
    }

    fn scss_table() -> RouteTable {
        RouteTable::new(vec![
            WatchRoute::new("css-libs", &pats(&["app/assets/scss/libs/**/*.scss"])).unwrap(),
            WatchRoute::new(
                "css-main",
                &pats(&["app/assets/scss/**/*.scss", "!app/assets/scss/libs/**"]),
            )
            .unwrap(),
        ])
    }

    #[test]
    fn negation_keeps_libs_out_of_main() {
        let table = scss_table();
        assert_eq!(table.targets("app/assets/scss/libs/a.scss"), vec!["css-libs"]);
        assert_eq!(table.targets("app/assets/scss/main.scss"), vec!["css-main"]);
        assert!(table.targets("app/index.html").is_empty());
    }

    #[test]
    fn nested_roots_collapse() {
        let roots = scss_table().watch_roots();
        assert_eq!(roots, vec![PathBuf::from("app/assets/scss")]);
    }

    #[test]
    fn duplicate_task_routes_yield_single_target() {
        let table = RouteTable::new(vec![
            WatchRoute::new("html", &pats(&["app/*.html"])).unwrap(),
            WatchRoute::new("html", &pats(&["app/**/*.html"])).unwrap(),
        ]);
        assert_eq!(table.targets("app/index.html"), vec!["html"]);
    }

    #[test]
    fn overlaps_are_reported() {
        let fs = MockFileSystem::new();
        fs.add_file("/p/app/partials/nav.html", "<nav/>");
        fs.add_file("/p/app/index.html", "<html/>");

        let table = RouteTable::new(vec![
            WatchRoute::new("html", &pats(&["app/**/*.html"])).unwrap(),
            WatchRoute::new("partials", &pats(&["app/partials/*.html"])).unwrap(),
        ]);

        let overlaps = table.report_overlaps(&fs, Path::new("/p")).unwrap();
        assert_eq!(overlaps.len(), 1);
        assert_eq!(
            overlaps["app/partials/nav.html"],
            vec!["html".to_string(), "partials".to_string()]
        );
    }
}
