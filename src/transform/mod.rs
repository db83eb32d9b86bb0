// src/transform/mod.rs

//! The closed set of transforms a task chain can use.
//!
//! Every transform works on one [`Asset`] at a time and either returns the
//! (possibly renamed and rewritten) asset, drops it (`Ok(None)`, e.g. a sass
//! partial or an unchanged image), or fails with a [`TransformError`] naming
//! the offending source file.
//!
//! - [`builtin`] holds the in-process implementations (CSS minifier, HTML
//!   partial includes).
//! - [`external`] runs configured command-line tools (stdin -> stdout).
//! - [`cache`] is the incremental cache used by `image-optimize`.

pub mod builtin;
pub mod cache;
pub mod external;

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;

use thiserror::Error;
use tracing::debug;

use crate::fs::FileSystem;

pub use cache::OptimizeCache;

/// Transform vocabulary, resolved from config names at validation time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TransformKind {
    StylesheetCompile,
    StylesheetMinify,
    ScriptMinify,
    PartialInclude,
    ImageOptimize,
    VerbatimCopy,
}

/// Position of a transform inside a chain. Chains must be non-decreasing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Stage {
    /// Produces the final language (sass -> css, partial includes, copies).
    Compile,
    /// Post-processes compiled output (minifiers, optimizers).
    Post,
}

const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "webp", "svg", "gif"];

impl TransformKind {
    pub const ALL: [TransformKind; 6] = [
        TransformKind::StylesheetCompile,
        TransformKind::StylesheetMinify,
        TransformKind::ScriptMinify,
        TransformKind::PartialInclude,
        TransformKind::ImageOptimize,
        TransformKind::VerbatimCopy,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            TransformKind::StylesheetCompile => "stylesheet-compile",
            TransformKind::StylesheetMinify => "stylesheet-minify",
            TransformKind::ScriptMinify => "script-minify",
            TransformKind::PartialInclude => "partial-include",
            TransformKind::ImageOptimize => "image-optimize",
            TransformKind::VerbatimCopy => "verbatim-copy",
        }
    }

    /// Source extensions this transform acts on. `None` means any file.
    pub fn extensions(self) -> Option<&'static [&'static str]> {
        match self {
            TransformKind::StylesheetCompile => Some(&["scss", "sass", "css"]),
            TransformKind::StylesheetMinify => Some(&["css"]),
            TransformKind::ScriptMinify => Some(&["js"]),
            TransformKind::PartialInclude => Some(&["html", "htm"]),
            TransformKind::ImageOptimize => Some(IMAGE_EXTENSIONS),
            TransformKind::VerbatimCopy => None,
        }
    }

    /// Whether a file with this name is processed (others pass through).
    pub fn accepts(self, path: &Path) -> bool {
        let Some(allowed) = self.extensions() else {
            return true;
        };
        extension_of(path).is_some_and(|ext| allowed.iter().any(|a| a.eq_ignore_ascii_case(&ext)))
    }

    pub fn stage(self) -> Stage {
        match self {
            TransformKind::StylesheetCompile
            | TransformKind::PartialInclude
            | TransformKind::VerbatimCopy => Stage::Compile,
            TransformKind::StylesheetMinify
            | TransformKind::ScriptMinify
            | TransformKind::ImageOptimize => Stage::Post,
        }
    }

    /// Transforms that cannot run without a `[tools]` entry.
    pub fn requires_tool(self) -> bool {
        matches!(
            self,
            TransformKind::StylesheetCompile | TransformKind::ScriptMinify
        )
    }

    /// Whether a `[tools]` entry is consulted at all.
    pub fn uses_tool(self) -> bool {
        self.requires_tool() || self == TransformKind::ImageOptimize
    }

    /// Deterministic output name for an accepted input.
    pub fn output_name(self, rel: &Path) -> PathBuf {
        match self {
            TransformKind::StylesheetCompile => rel.with_extension("css"),
            TransformKind::StylesheetMinify => with_min_suffix(rel, "css"),
            TransformKind::ScriptMinify => with_min_suffix(rel, "js"),
            TransformKind::PartialInclude
            | TransformKind::ImageOptimize
            | TransformKind::VerbatimCopy => rel.to_path_buf(),
        }
    }
}

impl fmt::Display for TransformKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransformKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase().replace('_', "-");
        TransformKind::ALL
            .into_iter()
            .find(|k| k.as_str() == wanted)
            .ok_or_else(|| {
                let known: Vec<&str> = TransformKind::ALL.iter().map(|k| k.as_str()).collect();
                format!("unknown transform '{s}' (expected one of {known:?})")
            })
    }
}

fn extension_of(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
}

/// `a/b.css` -> `a/b.min.css`; names already ending in `.min.<ext>` keep
/// their name.
fn with_min_suffix(rel: &Path, ext: &str) -> PathBuf {
    let stem = rel
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    if stem.ends_with(".min") {
        return rel.with_extension(ext);
    }
    rel.with_file_name(format!("{stem}.min.{ext}"))
}

/// A single transform invocation failing on a single source file.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{transform} failed for {}: {reason}", path.display())]
pub struct TransformError {
    pub transform: TransformKind,
    pub path: PathBuf,
    pub reason: String,
}

impl TransformError {
    pub fn new(transform: TransformKind, path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self {
            transform,
            path: path.into(),
            reason: reason.into(),
        }
    }
}

/// One file travelling through a chain.
#[derive(Debug, Clone)]
pub struct Asset {
    /// Original source file on disk.
    pub source: PathBuf,
    /// Current name relative to the task destination; transforms rename it.
    pub relative: PathBuf,
    /// Final on-disk destination once the whole chain has run.
    pub destination: PathBuf,
    pub contents: Vec<u8>,
}

/// Everything a transform may touch besides its input.
///
/// Cheap to clone; shared between all concurrently running tasks.
#[derive(Debug, Clone)]
pub struct BuildEnv {
    /// Project root; all configured paths are relative to it.
    pub root: PathBuf,
    pub fs: Arc<dyn FileSystem>,
    pub cache: OptimizeCache,
}

impl BuildEnv {
    pub fn new(root: impl Into<PathBuf>, fs: Arc<dyn FileSystem>) -> Self {
        Self {
            root: root.into(),
            fs,
            cache: OptimizeCache::new(),
        }
    }
}

/// A transform bound to its tool command line (if it uses one).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transform {
    kind: TransformKind,
    tool: Option<String>,
}

impl Transform {
    pub fn new(kind: TransformKind, tool: Option<String>) -> Self {
        let tool = if kind.uses_tool() { tool } else { None };
        Self { kind, tool }
    }

    pub fn kind(&self) -> TransformKind {
        self.kind
    }

    pub fn tool(&self) -> Option<&str> {
        self.tool.as_deref()
    }

    /// Run this transform on one asset.
    ///
    /// Assets this transform does not accept pass through untouched.
    pub async fn apply(&self, mut asset: Asset, env: &BuildEnv) -> Result<Option<Asset>, TransformError> {
        if !self.kind.accepts(&asset.relative) {
            return Ok(Some(asset));
        }

        match self.kind {
            TransformKind::VerbatimCopy => {}
            TransformKind::StylesheetCompile => {
                if is_partial(&asset.relative) {
                    debug!(path = ?asset.source, "skipping stylesheet partial");
                    return Ok(None);
                }
                asset.contents = self.run_tool(&asset).await?;
            }
            TransformKind::StylesheetMinify => {
                let text = self.utf8(&asset)?;
                asset.contents = builtin::minify_css(&text).into_bytes();
            }
            TransformKind::ScriptMinify => {
                asset.contents = self.run_tool(&asset).await?;
            }
            TransformKind::PartialInclude => {
                let text = self.utf8(&asset)?;
                let source = asset.source.clone();
                let expanded = tokio::task::spawn_blocking(move || {
                    builtin::expand_includes(&source, &text)
                })
                .await
                .map_err(|e| TransformError::new(self.kind, &asset.source, e.to_string()))?
                .map_err(|reason| TransformError::new(self.kind, &asset.source, reason))?;
                asset.contents = expanded.into_bytes();
            }
            TransformKind::ImageOptimize => {
                let modified = env
                    .fs
                    .modified(&asset.source)
                    .map_err(|e| TransformError::new(self.kind, &asset.source, format!("{e:#}")))?;
                if env.cache.is_fresh(&asset.source, &asset.destination, modified)
                    && env.fs.exists(&asset.destination)
                {
                    debug!(path = ?asset.source, "image unchanged since last optimize; skipping");
                    return Ok(None);
                }
                if self.tool.is_some() {
                    asset.contents = self.run_tool(&asset).await?;
                }
                env.cache.record(&asset.source, &asset.destination, modified);
            }
        }

        asset.relative = self.kind.output_name(&asset.relative);
        Ok(Some(asset))
    }

    async fn run_tool(&self, asset: &Asset) -> Result<Vec<u8>, TransformError> {
        let Some(tool) = self.tool.as_deref() else {
            return Err(TransformError::new(
                self.kind,
                &asset.source,
                "no tool configured in [tools]",
            ));
        };
        external::run_tool(self.kind, tool, &asset.source, &asset.contents).await
    }

    fn utf8(&self, asset: &Asset) -> Result<String, TransformError> {
        String::from_utf8(asset.contents.clone())
            .map_err(|e| TransformError::new(self.kind, &asset.source, format!("not valid UTF-8: {e}")))
    }
}

/// Sass partials (`_name.scss`) are only ever imported, never compiled.
fn is_partial(rel: &Path) -> bool {
    rel.file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| n.starts_with('_'))
}

/// Final output name of `rel` after every transform of `chain` has run.
pub fn chain_output_name(chain: &[Transform], rel: &Path) -> PathBuf {
    chain.iter().fold(rel.to_path_buf(), |name, t| {
        if t.kind.accepts(&name) {
            t.kind.output_name(&name)
        } else {
            name
        }
    })
}

/// Check that a chain is in stage order and does not repeat a transform.
pub fn validate_chain(chain: &[TransformKind]) -> Result<(), String> {
    for (i, pair) in chain.windows(2).enumerate() {
        if pair[1].stage() < pair[0].stage() {
            return Err(format!(
                "'{}' must not run after '{}' (position {})",
                pair[1],
                pair[0],
                i + 1
            ));
        }
    }
    for (i, kind) in chain.iter().enumerate() {
        if chain[..i].contains(kind) {
            return Err(format!("'{kind}' appears more than once"));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chain(kinds: &[TransformKind]) -> Vec<Transform> {
        kinds.iter().map(|k| Transform::new(*k, None)).collect()
    }

    #[test]
    fn names_round_trip_through_from_str() {
        for kind in TransformKind::ALL {
            assert_eq!(kind.as_str().parse::<TransformKind>(), Ok(kind));
        }
        assert_eq!("Script_Minify".parse::<TransformKind>(), Ok(TransformKind::ScriptMinify));
        assert!("uglify".parse::<TransformKind>().is_err());
    }

    #[test]
    fn compile_then_minify_names_min_css() {
        let c = chain(&[TransformKind::StylesheetCompile, TransformKind::StylesheetMinify]);
        assert_eq!(
            chain_output_name(&c, Path::new("pages/home.scss")),
            PathBuf::from("pages/home.min.css")
        );
    }

    #[test]
    fn min_suffix_is_not_doubled() {
        assert_eq!(
            TransformKind::ScriptMinify.output_name(Path::new("vendor.min.js")),
            PathBuf::from("vendor.min.js")
        );
        assert_eq!(
            TransformKind::ScriptMinify.output_name(Path::new("app.js")),
            PathBuf::from("app.min.js")
        );
    }

    #[test]
    fn unaccepted_files_keep_their_name() {
        let c = chain(&[TransformKind::ScriptMinify]);
        assert_eq!(
            chain_output_name(&c, Path::new("data.json")),
            PathBuf::from("data.json")
        );
        assert!(TransformKind::ImageOptimize.accepts(Path::new("logo.PNG")));
        assert!(!TransformKind::ImageOptimize.accepts(Path::new("logo.psd")));
    }

    #[test]
    fn minifier_before_compiler_is_rejected() {
        let err = validate_chain(&[TransformKind::StylesheetMinify, TransformKind::StylesheetCompile])
            .unwrap_err();
        assert!(err.contains("stylesheet-compile"));
        assert!(validate_chain(&[TransformKind::PartialInclude, TransformKind::PartialInclude]).is_err());
        assert!(validate_chain(&[TransformKind::StylesheetCompile, TransformKind::StylesheetMinify]).is_ok());
        assert!(validate_chain(&[]).is_ok());
    }

    #[test]
    fn tools_are_only_kept_where_used() {
        let t = Transform::new(TransformKind::StylesheetMinify, Some("cleancss".into()));
        assert_eq!(t.tool(), None);
        let t = Transform::new(TransformKind::ImageOptimize, Some("svgo -i - -o -".into()));
        assert_eq!(t.tool(), Some("svgo -i - -o -"));
    }
}
