// src/config/model.rs

use std::collections::BTreeMap;

use serde::Deserialize;

/// Top-level configuration as read from a TOML file.
///
/// ```toml
/// [config]
/// dest_root = "build"
/// libs_group = "libs"
///
/// [server]
/// port = 3000
///
/// [tools]
/// stylesheet-compile = "sass --stdin --load-path={dir}"
///
/// [[group]]
/// name = "libs"
/// tasks = ["css-libs"]
///
/// [task.css-libs]
/// src = ["app/assets/scss/libs/*.scss"]
/// dest = "build/assets/libs/css"
/// transforms = ["stylesheet-compile", "stylesheet-minify"]
/// ```
///
/// This is the unvalidated form; use [`ConfigFile`] everywhere else.
#[derive(Debug, Clone, Deserialize)]
pub struct RawConfigFile {
    /// Global settings from `[config]`.
    #[serde(default)]
    pub config: ConfigSection,

    /// Dev server settings from `[server]`.
    #[serde(default)]
    pub server: ServerSection,

    /// External tool command lines from `[tools]`, keyed by transform name.
    #[serde(default)]
    pub tools: BTreeMap<String, String>,

    /// Ordered task groups from `[[group]]`.
    #[serde(default)]
    pub group: Vec<GroupConfig>,

    /// All tasks from `[task.<name>]`.
    #[serde(default)]
    pub task: BTreeMap<String, TaskConfig>,

    /// Extra watch routes from `[[route]]`.
    #[serde(default)]
    pub route: Vec<RouteConfig>,
}

/// A configuration that passed validation.
///
/// Construct it with `ConfigFile::try_from(raw)` (see `config::validate`).
#[derive(Debug, Clone)]
pub struct ConfigFile {
    pub config: ConfigSection,
    pub server: ServerSection,
    pub tools: BTreeMap<String, String>,
    pub group: Vec<GroupConfig>,
    pub task: BTreeMap<String, TaskConfig>,
    pub route: Vec<RouteConfig>,
}

impl ConfigFile {
    pub(crate) fn new_unchecked(raw: RawConfigFile) -> Self {
        Self {
            config: raw.config,
            server: raw.server,
            tools: raw.tools,
            group: raw.group,
            task: raw.task,
            route: raw.route,
        }
    }

    pub fn tasks(&self) -> &BTreeMap<String, TaskConfig> {
        &self.task
    }

    pub fn groups(&self) -> &[GroupConfig] {
        &self.group
    }

    pub fn routes(&self) -> &[RouteConfig] {
        &self.route
    }

    /// Configured command line for a transform, ignoring blank entries.
    pub fn tool(&self, transform: &str) -> Option<&str> {
        self.tools
            .get(transform)
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
    }
}

/// `[config]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct ConfigSection {
    /// Root of the derived build tree; served by the dev server and ignored
    /// by the watcher.
    #[serde(default = "default_dest_root")]
    pub dest_root: String,

    /// Group run by `build-libs`.
    #[serde(default = "default_libs_group")]
    pub libs_group: String,
}

fn default_dest_root() -> String {
    "build".to_string()
}

fn default_libs_group() -> String {
    "libs".to_string()
}

impl Default for ConfigSection {
    fn default() -> Self {
        Self {
            dest_root: default_dest_root(),
            libs_group: default_libs_group(),
        }
    }
}

/// `[server]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerSection {
    #[serde(default = "default_host")]
    pub host: String,

    /// Port 0 asks the OS for a free port.
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    3000
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

/// `[[group]]` entry. Groups run in declaration order.
#[derive(Debug, Clone, Deserialize)]
pub struct GroupConfig {
    pub name: String,
    #[serde(default)]
    pub tasks: Vec<String>,
}

/// `[task.<name>]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct TaskConfig {
    /// Source globs relative to the project root. Entries starting with `!`
    /// are subtracted from the union of the others.
    pub src: Vec<String>,

    /// Destination directory relative to the project root.
    pub dest: String,

    /// Transform chain, applied in order. Empty means a verbatim copy.
    #[serde(default)]
    pub transforms: Vec<String>,

    /// Watch globs (with `!` negations). Defaults to `src`.
    #[serde(default)]
    pub watch: Option<Vec<String>>,

    /// Allow `src` to match nothing (e.g. an optional vendor file).
    #[serde(default)]
    pub allow_empty: bool,
}

impl TaskConfig {
    /// Effective watch patterns for this task.
    pub fn effective_watch(&self) -> &[String] {
        self.watch.as_deref().unwrap_or(&self.src)
    }
}

/// `[[route]]` entry: an extra watch route into an existing task.
#[derive(Debug, Clone, Deserialize)]
pub struct RouteConfig {
    pub watch: Vec<String>,
    pub task: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sections_default_when_missing() {
        let raw: RawConfigFile = toml::from_str(
            r#"
[task.copy]
src = ["app/fonts/*"]
dest = "build/fonts"
"#,
        )
        .expect("parse");

        assert_eq!(raw.config.dest_root, "build");
        assert_eq!(raw.config.libs_group, "libs");
        assert_eq!(raw.server.port, 3000);
        let task = &raw.task["copy"];
        assert!(task.transforms.is_empty());
        assert_eq!(task.effective_watch(), &["app/fonts/*".to_string()]);
    }
}
