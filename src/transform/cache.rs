// src/transform/cache.rs

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::SystemTime;

use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq)]
struct CacheEntry {
    destination: PathBuf,
    modified: SystemTime,
}

/// Incremental cache for `image-optimize`, keyed by source path.
///
/// An entry records which destination a source was last written to and the
/// source modification time at that point. Shared by every running task
/// for the lifetime of the process; never persisted.
#[derive(Debug, Clone, Default)]
pub struct OptimizeCache {
    entries: Arc<Mutex<HashMap<PathBuf, CacheEntry>>>,
}

impl OptimizeCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<PathBuf, CacheEntry>> {
        // A panic while holding the lock cannot leave an entry half-written.
        self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// True if `source` was already optimized into `destination` at exactly
    /// this modification time.
    pub fn is_fresh(&self, source: &Path, destination: &Path, modified: SystemTime) -> bool {
        self.lock().get(source).is_some_and(|entry| {
            entry.destination == destination && entry.modified == modified
        })
    }

    /// Remember that `source` (at `modified`) was written to `destination`.
    pub fn record(&self, source: &Path, destination: &Path, modified: SystemTime) {
        debug!(?source, ?destination, "recording optimized image");
        self.lock().insert(
            source.to_path_buf(),
            CacheEntry {
                destination: destination.to_path_buf(),
                modified,
            },
        );
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}
