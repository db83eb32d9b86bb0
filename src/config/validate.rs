// src/config/validate.rs

use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::{Path, PathBuf};

use petgraph::algo::toposort;
use petgraph::graphmap::DiGraphMap;
use tracing::warn;

use crate::config::model::{ConfigFile, RawConfigFile};
use crate::errors::{PipelineError, Result};
use crate::pathset::{self, PathSpec};
use crate::transform::{self, TransformKind};

impl TryFrom<RawConfigFile> for ConfigFile {
    type Error = crate::errors::PipelineError;

    fn try_from(raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        let raw = normalize_dirs(raw);
        validate_raw_config(&raw)?;
        Ok(ConfigFile::new_unchecked(raw))
    }
}

/// Rewrite `dest_root` and every task `dest` into the same form source globs
/// are matched in (`./build/` becomes `build`). Blank values are left for
/// validation to reject.
fn normalize_dirs(mut raw: RawConfigFile) -> RawConfigFile {
    if !raw.config.dest_root.trim().is_empty() {
        raw.config.dest_root = pathset::normalize_dir(&raw.config.dest_root);
    }
    for task in raw.task.values_mut() {
        if !task.dest.trim().is_empty() {
            task.dest = pathset::normalize_dir(&task.dest);
        }
    }
    raw
}

fn validate_raw_config(cfg: &RawConfigFile) -> Result<()> {
    ensure_has_tasks(cfg)?;
    let group_of = validate_groups(cfg)?;
    validate_routes(cfg)?;
    validate_tasks(cfg)?;
    validate_feeds(cfg, &group_of)?;
    Ok(())
}

fn ensure_has_tasks(cfg: &RawConfigFile) -> Result<()> {
    if cfg.task.is_empty() {
        return Err(PipelineError::ConfigError(
            "config must contain at least one [task.<name>] section".to_string(),
        ));
    }
    Ok(())
}

/// Returns each task's group index.
fn validate_groups(cfg: &RawConfigFile) -> Result<HashMap<&str, usize>> {
    let mut seen_groups = HashSet::new();
    let mut group_of: HashMap<&str, usize> = HashMap::new();

    for (idx, group) in cfg.group.iter().enumerate() {
        if group.name.trim().is_empty() {
            return Err(PipelineError::ConfigError(format!(
                "[[group]] #{} has an empty name",
                idx + 1
            )));
        }
        if !seen_groups.insert(group.name.as_str()) {
            return Err(PipelineError::ConfigError(format!(
                "group '{}' is declared more than once",
                group.name
            )));
        }
        for task in &group.tasks {
            if !cfg.task.contains_key(task) {
                return Err(PipelineError::ConfigError(format!(
                    "group '{}' references unknown task '{}'",
                    group.name, task
                )));
            }
            if let Some(prev) = group_of.insert(task.as_str(), idx) {
                return Err(PipelineError::ConfigError(format!(
                    "task '{}' is listed in both group '{}' and group '{}'",
                    task, cfg.group[prev].name, group.name
                )));
            }
        }
    }

    for name in cfg.task.keys() {
        if !group_of.contains_key(name.as_str()) {
            return Err(PipelineError::ConfigError(format!(
                "task '{name}' is not listed in any [[group]]"
            )));
        }
    }

    Ok(group_of)
}

fn validate_routes(cfg: &RawConfigFile) -> Result<()> {
    for route in &cfg.route {
        if !cfg.task.contains_key(&route.task) {
            return Err(PipelineError::ConfigError(format!(
                "[[route]] references unknown task '{}'",
                route.task
            )));
        }
        PathSpec::new(&route.watch, true).map_err(|e| {
            PipelineError::ConfigError(format!("[[route]] for '{}': {e:#}", route.task))
        })?;
    }
    Ok(())
}

fn validate_tasks(cfg: &RawConfigFile) -> Result<()> {
    for (name, task) in &cfg.task {
        if task.dest.trim().is_empty() {
            return Err(PipelineError::ConfigError(format!(
                "task '{name}' has an empty `dest`"
            )));
        }

        PathSpec::new(&task.src, task.allow_empty)
            .map_err(|e| PipelineError::ConfigError(format!("task '{name}': {e:#}")))?;
        PathSpec::new(task.effective_watch(), true)
            .map_err(|e| PipelineError::ConfigError(format!("task '{name}' watch: {e:#}")))?;

        let kinds = task
            .transforms
            .iter()
            .map(|t| t.parse::<TransformKind>())
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| PipelineError::ConfigError(format!("task '{name}': {e}")))?;

        transform::validate_chain(&kinds)
            .map_err(|e| PipelineError::ConfigError(format!("task '{name}': {e}")))?;

        for kind in kinds.iter().filter(|k| k.requires_tool()) {
            if !has_tool(&cfg.tools, kind.as_str()) {
                return Err(PipelineError::ConfigError(format!(
                    "task '{name}' uses '{kind}' but [tools].{kind} is not set"
                )));
            }
        }
    }
    Ok(())
}

fn has_tool(tools: &BTreeMap<String, String>, name: &str) -> bool {
    tools.get(name).is_some_and(|cmd| !cmd.trim().is_empty())
}

fn source_bases(src: &[String]) -> Vec<PathBuf> {
    let (positives, _) = pathset::split_patterns(src);
    positives.iter().map(|p| pathset::glob_base(p)).collect()
}

fn reads_from(bases: &[PathBuf], dest: &Path) -> bool {
    bases
        .iter()
        .any(|base| base.starts_with(dest) || (dest.starts_with(base) && !base.as_os_str().is_empty()))
}

/// Build the "feeds" graph and check it against the group order.
///
/// Edge direction: producer -> consumer. A task consumes another when one of
/// its source bases overlaps the producer's destination.
fn validate_feeds(cfg: &RawConfigFile, group_of: &HashMap<&str, usize>) -> Result<()> {
    let mut graph: DiGraphMap<&str, ()> = DiGraphMap::new();
    for name in cfg.task.keys() {
        graph.add_node(name.as_str());
    }

    let bases: HashMap<&str, Vec<PathBuf>> = cfg
        .task
        .iter()
        .map(|(name, t)| (name.as_str(), source_bases(&t.src)))
        .collect();

    for (producer, ptask) in &cfg.task {
        let dest = Path::new(&ptask.dest);
        for (&consumer, cbases) in &bases {
            if !reads_from(cbases, dest) {
                continue;
            }
            if producer.as_str() == consumer {
                warn!(
                    task = %producer,
                    dest = %ptask.dest,
                    "task writes under its own source base"
                );
                continue;
            }
            graph.add_edge(producer.as_str(), consumer, ());
        }
    }

    if let Err(cycle) = toposort(&graph, None) {
        return Err(PipelineError::ConfigError(format!(
            "cycle detected in task outputs involving task '{}'",
            cycle.node_id()
        )));
    }

    for (producer, consumer, _) in graph.all_edges() {
        let (p, c) = (group_of[producer], group_of[consumer]);
        if p >= c {
            return Err(PipelineError::ConfigError(format!(
                "task '{consumer}' reads the output of '{producer}' and must be in a later group \
                 (found '{}' before '{}')",
                cfg.group[c].name, cfg.group[p].name
            )));
        }
    }

    Ok(())
}
