// src/watch/event_handler.rs

//! Turning raw `notify` events into root-relative [`ChangeEvent`]s.

use std::path::Path;

use notify::event::{MetadataKind, ModifyKind, RenameMode};
use notify::{Event, EventKind};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::engine::RouterEvent;
use crate::pathset;
use crate::types::{ChangeEvent, ChangeKind};
use crate::watch::path_utils::relative_str;

/// Map a notify event kind onto a change kind.
///
/// Access events and access-time updates carry no content change and are
/// dropped.
pub fn change_kind(kind: &EventKind) -> Option<ChangeKind> {
    match kind {
        EventKind::Access(_) => None,
        EventKind::Create(_) => Some(ChangeKind::Add),
        EventKind::Remove(_) => Some(ChangeKind::Delete),
        EventKind::Modify(ModifyKind::Metadata(MetadataKind::AccessTime)) => None,
        EventKind::Modify(ModifyKind::Name(RenameMode::From)) => Some(ChangeKind::Delete),
        EventKind::Modify(ModifyKind::Name(RenameMode::To)) => Some(ChangeKind::Add),
        EventKind::Modify(_) | EventKind::Any | EventKind::Other => Some(ChangeKind::Modify),
    }
}

/// Convert one notify event into change events relative to `root`.
///
/// Paths outside `root` and paths under `ignore` (the build output tree)
/// are skipped.
pub fn to_change_events(root: &Path, ignore: &Path, event: &Event) -> Vec<ChangeEvent> {
    let Some(kind) = change_kind(&event.kind) else {
        return Vec::new();
    };

    event
        .paths
        .iter()
        .filter_map(|path| {
            let Some(rel) = relative_str(root, path) else {
                warn!("could not relativize path {:?} against root {:?}", path, root);
                return None;
            };
            if rel.is_empty() || is_ignored(&rel, ignore) {
                return None;
            }
            Some(ChangeEvent::new(rel, kind))
        })
        .collect()
}

fn is_ignored(rel: &str, ignore: &Path) -> bool {
    let ignore = pathset::normalize_dir(&ignore.to_string_lossy());
    ignore != "." && Path::new(rel).starts_with(&ignore)
}

/// Forward a notify event to the router.
///
/// Returns false once the router is gone.
pub async fn forward_event(
    root: &Path,
    ignore: &Path,
    event: &Event,
    runtime_tx: &mpsc::Sender<RouterEvent>,
) -> bool {
    for change in to_change_events(root, ignore, event) {
        debug!(path = %change.path, kind = %change.kind, "file change");
        if let Err(err) = runtime_tx.send(RouterEvent::Change(change)).await {
            warn!("failed to send RouterEvent::Change: {err}");
            return false;
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify::event::{AccessKind, CreateKind, DataChange};
    use std::path::PathBuf;

    fn event(kind: EventKind, path: &str) -> Event {
        Event::new(kind).add_path(PathBuf::from(path))
    }

    #[test]
    fn build_output_is_ignored() {
        let ev = event(EventKind::Create(CreateKind::File), "/p/build/app.css");
        assert!(to_change_events(Path::new("/p"), Path::new("build"), &ev).is_empty());

        let ev = event(EventKind::Create(CreateKind::File), "/p/builder/a.js");
        let out = to_change_events(Path::new("/p"), Path::new("build"), &ev);
        assert_eq!(out, vec![ChangeEvent::new("builder/a.js", ChangeKind::Add)]);
    }

    #[test]
    fn dot_slash_output_root_is_ignored() {
        let ev = event(EventKind::Create(CreateKind::File), "/p/build/index.html");
        assert!(to_change_events(Path::new("/p"), Path::new("./build/"), &ev).is_empty());

        let ev = event(EventKind::Create(CreateKind::File), "/p/app/index.html");
        let out = to_change_events(Path::new("/p"), Path::new("./build"), &ev);
        assert_eq!(out, vec![ChangeEvent::new("app/index.html", ChangeKind::Add)]);
    }

    #[test]
    fn access_events_are_dropped() {
        let ev = event(EventKind::Access(AccessKind::Any), "/p/app/a.scss");
        assert!(to_change_events(Path::new("/p"), Path::new("build"), &ev).is_empty());
    }

    #[test]
    fn data_modification_maps_to_modify() {
        let ev = event(
            EventKind::Modify(ModifyKind::Data(DataChange::Content)),
            "/p/app/a.scss",
        );
        let out = to_change_events(Path::new("/p"), Path::new("build"), &ev);
        assert_eq!(out, vec![ChangeEvent::new("app/a.scss", ChangeKind::Modify)]);
    }

    #[test]
    fn rename_halves_map_to_delete_and_add() {
        assert_eq!(
            change_kind(&EventKind::Modify(ModifyKind::Name(RenameMode::From))),
            Some(ChangeKind::Delete)
        );
        assert_eq!(
            change_kind(&EventKind::Modify(ModifyKind::Name(RenameMode::To))),
            Some(ChangeKind::Add)
        );
    }
}
