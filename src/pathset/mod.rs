// src/pathset/mod.rs

//! Glob-based source selection.
//!
//! A [`PathSpec`] is the compiled form of a task's `src` list: one or more
//! positive globs plus `!`-prefixed negations. Resolving it against the
//! filesystem yields a [`PathSet`], which is recomputed on every task run.
//!
//! Globs are relative to the project root and use `/` separators. `*` never
//! crosses a directory boundary; `**` does.

pub mod resolver;

use std::fmt;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use globset::{GlobBuilder, GlobMatcher, GlobSet, GlobSetBuilder};

pub use resolver::resolve;

const GLOB_META: &[char] = &['*', '?', '[', '{'];

/// Split a pattern list into positive patterns and negations (with the `!`
/// stripped).
pub fn split_patterns(patterns: &[String]) -> (Vec<String>, Vec<String>) {
    let mut positive = Vec::new();
    let mut negated = Vec::new();
    for pat in patterns {
        let pat = pat.trim();
        match pat.strip_prefix('!') {
            Some(rest) => negated.push(normalize_pattern(rest)),
            None => positive.push(normalize_pattern(pat)),
        }
    }
    (positive, negated)
}

fn normalize_pattern(pat: &str) -> String {
    let pat = pat.replace('\\', "/");
    pat.strip_prefix("./").map(str::to_string).unwrap_or(pat)
}

/// Normalize a root-relative directory such as a task `dest`: forward
/// slashes, no leading `./`, no trailing `/`. The project root itself is `.`.
pub fn normalize_dir(dir: &str) -> String {
    let slashed = dir.trim().replace('\\', "/");
    let mut rest = slashed.as_str();
    while let Some(stripped) = rest.strip_prefix("./") {
        rest = stripped;
    }
    match rest.trim_end_matches('/') {
        "" | "." => ".".to_string(),
        dir => dir.to_string(),
    }
}

/// Whether a pattern contains any glob metacharacter.
pub fn is_literal(pattern: &str) -> bool {
    !pattern.contains(GLOB_META)
}

/// Longest literal directory prefix of a pattern.
///
/// For `app/assets/js/**/*.js` this is `app/assets/js`; for a literal file
/// path it is the file's parent directory; for `*.html` it is empty.
pub fn glob_base(pattern: &str) -> PathBuf {
    let components: Vec<&str> = pattern.split('/').collect();
    let literal_dirs = if is_literal(pattern) {
        components.len().saturating_sub(1)
    } else {
        components
            .iter()
            .take_while(|c| is_literal(c))
            .count()
            .min(components.len().saturating_sub(1))
    };

    components[..literal_dirs]
        .iter()
        .filter(|c| !c.is_empty() && **c != ".")
        .collect()
}

/// Compile a single glob with gulp-like separator semantics.
pub fn compile_glob(pattern: &str) -> Result<GlobMatcher> {
    let glob = GlobBuilder::new(pattern)
        .literal_separator(true)
        .build()
        .with_context(|| format!("invalid glob pattern: {pattern}"))?;
    Ok(glob.compile_matcher())
}

/// Build a GlobSet from simple string patterns.
pub fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pat in patterns {
        let glob = GlobBuilder::new(pat)
            .literal_separator(true)
            .build()
            .with_context(|| format!("invalid glob pattern: {pat}"))?;
        builder.add(glob);
    }
    Ok(builder.build()?)
}

/// One positive glob and the directory resolution starts from.
#[derive(Clone)]
pub(crate) struct PositiveGlob {
    pub(crate) pattern: String,
    pub(crate) base: PathBuf,
    pub(crate) matcher: GlobMatcher,
}

/// Compiled source specification.
#[derive(Clone)]
pub struct PathSpec {
    patterns: Vec<String>,
    positives: Vec<PositiveGlob>,
    negations: Option<GlobSet>,
    allow_empty: bool,
}

impl fmt::Debug for PathSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PathSpec")
            .field("patterns", &self.patterns)
            .field("allow_empty", &self.allow_empty)
            .finish_non_exhaustive()
    }
}

impl PathSpec {
    /// Compile a pattern list. At least one positive pattern is required.
    pub fn new(patterns: &[String], allow_empty: bool) -> Result<Self> {
        let (positive, negated) = split_patterns(patterns);
        if positive.is_empty() {
            anyhow::bail!("source patterns {patterns:?} contain no positive glob");
        }

        let positives = positive
            .into_iter()
            .map(|pattern| {
                let matcher = compile_glob(&pattern)?;
                Ok(PositiveGlob {
                    base: glob_base(&pattern),
                    pattern,
                    matcher,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let negations = if negated.is_empty() {
            None
        } else {
            Some(build_globset(&negated)?)
        };

        Ok(Self {
            patterns: patterns.to_vec(),
            positives,
            negations,
            allow_empty,
        })
    }

    /// The patterns this spec was compiled from, as written.
    pub fn patterns(&self) -> &[String] {
        &self.patterns
    }

    pub fn allow_empty(&self) -> bool {
        self.allow_empty
    }

    /// Base directories of the positive globs, relative to the project root.
    pub fn bases(&self) -> impl Iterator<Item = &Path> {
        self.positives.iter().map(|p| p.base.as_path())
    }

    pub(crate) fn positives(&self) -> &[PositiveGlob] {
        &self.positives
    }

    /// True if a root-relative path is excluded by a negation.
    pub fn is_negated(&self, rel_path: &str) -> bool {
        self.negations
            .as_ref()
            .is_some_and(|set| set.is_match(rel_path))
    }

    /// True if a root-relative path is selected by this spec.
    pub fn matches(&self, rel_path: &str) -> bool {
        self.positives.iter().any(|p| p.matcher.is_match(rel_path)) && !self.is_negated(rel_path)
    }
}

/// One resolved source file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    /// Path on disk (project root joined with the relative path).
    pub path: PathBuf,
    /// Path relative to the glob base; this is the output name before any
    /// transform renames it.
    pub relative: PathBuf,
}

/// Ordered, de-duplicated result of resolving a [`PathSpec`].
#[derive(Debug, Clone, Default)]
pub struct PathSet {
    patterns: Vec<String>,
    files: Vec<SourceFile>,
}

impl PathSet {
    pub fn new(patterns: Vec<String>, files: Vec<SourceFile>) -> Self {
        Self { patterns, files }
    }

    pub fn patterns(&self) -> &[String] {
        &self.patterns
    }

    pub fn iter(&self) -> impl Iterator<Item = &SourceFile> {
        self.files.iter()
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}
