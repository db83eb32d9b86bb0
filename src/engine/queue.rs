// src/engine/queue.rs

use std::collections::HashSet;

use tracing::debug;

use crate::types::TaskName;

/// Re-runs requested while a task is already running.
///
/// Semantics:
/// - At most one pending re-run per task. A second, third, ... request for
///   the same task while it is still running is dropped: the single pending
///   run will pick up every change made so far, since sources are resolved
///   when the run starts.
/// - When the running instance finishes, the runtime calls `take` and starts
///   the pending run if there was one.
#[derive(Debug, Default, Clone)]
pub struct PendingRuns {
    tasks: HashSet<TaskName>,
}

impl PendingRuns {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true if there are no pending re-runs.
    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn contains(&self, task: &str) -> bool {
        self.tasks.contains(task)
    }

    /// Record that `task` was triggered while running.
    ///
    /// Returns false when a re-run was already pending and this request was
    /// coalesced into it.
    pub fn record(&mut self, task: &str) -> bool {
        let inserted = self.tasks.insert(task.to_string());
        debug!(task = %task, inserted, "re-run requested while running");
        inserted
    }

    /// Remove and report the pending re-run for `task`.
    pub fn take(&mut self, task: &str) -> bool {
        self.tasks.remove(task)
    }

    /// Drop every pending re-run, returning how many were discarded.
    pub fn clear(&mut self) -> usize {
        let n = self.tasks.len();
        self.tasks.clear();
        n
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicates_coalesce() {
        let mut q = PendingRuns::new();
        assert!(q.record("css"));
        assert!(!q.record("css"));
        assert!(q.record("js"));
        assert_eq!(q.len(), 2);

        assert!(q.take("css"));
        assert!(!q.take("css"));
        assert_eq!(q.clear(), 1);
        assert!(q.is_empty());
    }
}
