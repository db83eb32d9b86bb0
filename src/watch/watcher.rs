// src/watch/watcher.rs

use std::path::PathBuf;

use anyhow::Result;
use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use crate::engine::RouterEvent;
use crate::errors::PipelineError;
use crate::watch::event_handler::forward_event;

/// Handle for the filesystem watcher.
///
/// This exists mainly so the underlying `RecommendedWatcher` is kept alive for
/// as long as needed. Dropping this handle will stop file watching.
pub struct WatcherHandle {
    _inner: RecommendedWatcher,
    watched: Vec<PathBuf>,
    forwarder: JoinHandle<()>,
}

impl std::fmt::Debug for WatcherHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WatcherHandle")
            .field("watched", &self.watched)
            .finish()
    }
}

impl WatcherHandle {
    /// Directories actually registered with the OS watcher.
    pub fn watched(&self) -> &[PathBuf] {
        &self.watched
    }

    /// Stop watching and wait for the forwarding loop to end.
    pub async fn stop(self) {
        drop(self._inner);
        self.forwarder.abort();
        let _ = self.forwarder.await;
        debug!("file watcher stopped");
    }
}

/// Spawn a filesystem watcher that observes each of `roots` recursively and
/// sends `RouterEvent::Change` for every relevant change.
///
/// - `root` is the project root against which all glob patterns are evaluated.
/// - `roots` are root-relative directories to watch (already de-nested).
/// - `ignore` is the root-relative build output directory; changes under it
///   never reach the router.
/// - A root that does not exist is reported once and skipped; the others keep
///   working.
pub fn spawn_watcher(
    root: impl Into<PathBuf>,
    roots: &[PathBuf],
    ignore: impl Into<PathBuf>,
    runtime_tx: mpsc::Sender<RouterEvent>,
) -> Result<WatcherHandle> {
    let root = root.into();
    // Canonicalize once so we have a stable base path.
    let root = root.canonicalize().unwrap_or_else(|_| root.clone());
    let ignore = ignore.into();

    // Channel from the blocking notify callback into the async world.
    let (event_tx, mut event_rx) = mpsc::unbounded_channel::<Event>();

    // Closure called synchronously by notify whenever an event arrives.
    let mut watcher = RecommendedWatcher::new(
        move |res: notify::Result<Event>| match res {
            Ok(event) => {
                // Receiver gone means we are shutting down.
                let _ = event_tx.send(event);
            }
            Err(err) => {
                error!("file watch error: {err}");
            }
        },
        Config::default(),
    )?;

    let mut watched = Vec::new();
    for rel in roots {
        let dir = root.join(rel);
        if !dir.is_dir() {
            let err = PipelineError::WatchSetup {
                root: rel.clone(),
                reason: "directory does not exist".to_string(),
            };
            error!("{err}; routes under it stay inactive");
            continue;
        }
        if let Err(e) = watcher.watch(&dir, RecursiveMode::Recursive) {
            let err = PipelineError::WatchSetup {
                root: rel.clone(),
                reason: e.to_string(),
            };
            error!("{err}; routes under it stay inactive");
            continue;
        }
        watched.push(dir);
    }

    info!(roots = ?watched, "file watcher started");

    let async_root = root.clone();
    let forwarder = tokio::spawn(async move {
        while let Some(event) = event_rx.recv().await {
            debug!(?event, "received notify event");
            if !forward_event(&async_root, &ignore, &event, &runtime_tx).await {
                break;
            }
        }
        debug!("watcher event loop finished");
    });

    Ok(WatcherHandle {
        _inner: watcher,
        watched,
        forwarder,
    })
}

