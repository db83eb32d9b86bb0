// src/types.rs

//! Small value types shared between the watcher, the router and the dev
//! server.

use std::fmt;
use std::path::Path;

/// Canonical task name type used throughout the pipeline.
pub type TaskName = String;

/// What happened to a watched path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChangeKind {
    Add,
    Modify,
    Delete,
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ChangeKind::Add => "add",
            ChangeKind::Modify => "modify",
            ChangeKind::Delete => "delete",
        };
        f.write_str(s)
    }
}

/// A single filesystem change, as seen by the watch router.
///
/// `path` is relative to the project root and always uses forward slashes so
/// it can be matched against glob patterns directly. `origin` is empty when
/// the watcher produces the event and names the target task once the router
/// has fanned it out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeEvent {
    pub path: String,
    pub kind: ChangeKind,
    pub origin: Option<TaskName>,
}

impl ChangeEvent {
    pub fn new(path: impl Into<String>, kind: ChangeKind) -> Self {
        Self {
            path: path.into(),
            kind,
            origin: None,
        }
    }

    /// Copy of this event attributed to the task it is being dispatched to.
    pub fn routed_to(&self, task: &str) -> Self {
        Self {
            origin: Some(task.to_string()),
            ..self.clone()
        }
    }
}

/// Scope of a live-reload signal sent to connected browsers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReloadKind {
    /// Only stylesheets changed: swap them in place.
    Stylesheet,
    /// Anything else: reload the whole page.
    Other,
}

impl ReloadKind {
    /// Decide the reload scope for a set of freshly written files.
    ///
    /// Returns `None` when nothing was written.
    pub fn for_outputs<P: AsRef<Path>>(written: &[P]) -> Option<ReloadKind> {
        if written.is_empty() {
            return None;
        }
        let all_css = written.iter().all(|p| {
            p.as_ref()
                .extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| e.eq_ignore_ascii_case("css"))
        });
        Some(if all_css {
            ReloadKind::Stylesheet
        } else {
            ReloadKind::Other
        })
    }

    /// Name of the server-sent event carrying this signal.
    pub fn event_name(self) -> &'static str {
        match self {
            ReloadKind::Stylesheet => "css",
            ReloadKind::Other => "reload",
        }
    }
}
