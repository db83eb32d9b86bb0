// src/pathset/resolver.rs

//! Expansion of a [`PathSpec`] into concrete files.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::Result;
use tracing::{debug, trace};

use crate::fs::FileSystem;
use crate::pathset::{PathSet, PathSpec, PositiveGlob, SourceFile, is_literal};

/// Resolve `spec` against `root`.
///
/// - Each positive glob is expanded by walking its base directory.
/// - Negations are applied afterwards, by exact path exclusion.
/// - The result is sorted by path and de-duplicated; when two positive globs
///   select the same file, the first one decides its relative name.
/// - A missing base directory contributes zero files. Whether zero files is
///   acceptable is the caller's decision (see `TaskGraph::preflight`).
pub fn resolve(spec: &PathSpec, fs: &dyn FileSystem, root: &Path) -> Result<PathSet> {
    let mut selected: BTreeMap<PathBuf, PathBuf> = BTreeMap::new();

    for positive in spec.positives() {
        for (rel_str, path) in expand_positive(fs, root, positive)? {
            if spec.is_negated(&rel_str) {
                trace!(path = %rel_str, "excluded by negated pattern");
                continue;
            }
            let relative = Path::new(&rel_str)
                .strip_prefix(&positive.base)
                .map(Path::to_path_buf)
                .unwrap_or_else(|_| PathBuf::from(&rel_str));
            selected.entry(path).or_insert(relative);
        }
    }

    let files: Vec<SourceFile> = selected
        .into_iter()
        .map(|(path, relative)| SourceFile { path, relative })
        .collect();

    debug!(patterns = ?spec.patterns(), matched = files.len(), "resolved path set");
    Ok(PathSet::new(spec.patterns().to_vec(), files))
}

/// Expand one positive glob into `(root-relative string, on-disk path)` pairs.
fn expand_positive(
    fs: &dyn FileSystem,
    root: &Path,
    positive: &PositiveGlob,
) -> Result<Vec<(String, PathBuf)>> {
    if is_literal(&positive.pattern) {
        let path = root.join(&positive.pattern);
        return Ok(if fs.is_file(&path) {
            vec![(positive.pattern.clone(), path)]
        } else {
            Vec::new()
        });
    }

    let start = root.join(&positive.base);
    if !fs.is_dir(&start) {
        debug!(base = ?start, pattern = %positive.pattern, "glob base does not exist");
        return Ok(Vec::new());
    }

    let mut found = Vec::new();
    let mut stack = vec![start];

    while let Some(dir) = stack.pop() {
        for path in fs.read_dir(&dir)? {
            if fs.is_dir(&path) {
                stack.push(path);
            } else if fs.is_file(&path) {
                if let Some(rel_str) = relative_to_root(root, &path) {
                    if positive.matcher.is_match(&rel_str) {
                        found.push((rel_str, path));
                    }
                }
            }
        }
    }

    Ok(found)
}

fn relative_to_root(root: &Path, path: &Path) -> Option<String> {
    let rel = path.strip_prefix(root).ok()?;
    let s = rel.to_string_lossy().replace('\\', "/");
    Some(s.strip_prefix("./").map(str::to_string).unwrap_or(s))
}
