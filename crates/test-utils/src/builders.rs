#![allow(dead_code)]

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use assetpipe::config::{
    ConfigFile, ConfigSection, GroupConfig, RawConfigFile, RouteConfig, ServerSection, TaskConfig,
};
use assetpipe::errors::Result;

/// Builder for `ConfigFile` to simplify test setup.
pub struct ConfigFileBuilder {
    config: RawConfigFile,
}

impl ConfigFileBuilder {
    pub fn new() -> Self {
        Self {
            config: RawConfigFile {
                config: ConfigSection::default(),
                server: ServerSection {
                    host: "127.0.0.1".to_string(),
                    port: 0,
                },
                tools: BTreeMap::new(),
                group: Vec::new(),
                task: BTreeMap::new(),
                route: Vec::new(),
            },
        }
    }

    /// Append a group; groups run in the order they are added.
    pub fn with_group(mut self, name: &str, tasks: &[&str]) -> Self {
        self.config.group.push(GroupConfig {
            name: name.to_string(),
            tasks: tasks.iter().map(|t| t.to_string()).collect(),
        });
        self
    }

    pub fn with_task(mut self, name: &str, task: TaskConfig) -> Self {
        self.config.task.insert(name.to_string(), task);
        self
    }

    pub fn with_tool(mut self, transform: &str, command: &str) -> Self {
        self.config
            .tools
            .insert(transform.to_string(), command.to_string());
        self
    }

    pub fn with_route(mut self, task: &str, watch: &[&str]) -> Self {
        self.config.route.push(RouteConfig {
            watch: watch.iter().map(|w| w.to_string()).collect(),
            task: task.to_string(),
        });
        self
    }

    pub fn with_dest_root(mut self, dest_root: &str) -> Self {
        self.config.config.dest_root = dest_root.to_string();
        self
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.config.server.port = port;
        self
    }

    pub fn raw(self) -> RawConfigFile {
        self.config
    }

    pub fn try_build(self) -> Result<ConfigFile> {
        ConfigFile::try_from(self.config)
    }

    pub fn build(self) -> ConfigFile {
        self.try_build()
            .expect("Failed to build valid config from builder")
    }
}

impl Default for ConfigFileBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for `TaskConfig`.
pub struct TaskConfigBuilder {
    task: TaskConfig,
}

impl TaskConfigBuilder {
    pub fn new(src: &str, dest: &str) -> Self {
        Self {
            task: TaskConfig {
                src: vec![src.to_string()],
                dest: dest.to_string(),
                transforms: Vec::new(),
                watch: None,
                allow_empty: false,
            },
        }
    }

    pub fn src(mut self, pattern: &str) -> Self {
        self.task.src.push(pattern.to_string());
        self
    }

    pub fn transform(mut self, name: &str) -> Self {
        self.task.transforms.push(name.to_string());
        self
    }

    pub fn watch(mut self, pattern: &str) -> Self {
        let watches = self.task.watch.get_or_insert(vec![]);
        watches.push(pattern.to_string());
        self
    }

    pub fn allow_empty(mut self, val: bool) -> Self {
        self.task.allow_empty = val;
        self
    }

    pub fn build(self) -> TaskConfig {
        self.task
    }
}

/// Write `contents` to `root/rel`, creating parent directories.
pub fn write_file(root: &Path, rel: &str, contents: impl AsRef<[u8]>) {
    let path = root.join(rel);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("create parent dirs");
    }
    fs::write(&path, contents).expect("write test file");
}
