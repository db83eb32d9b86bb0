// src/fs/mock.rs

use super::FileSystem;
use anyhow::{Result, anyhow};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, SystemTime};

#[derive(Debug, Clone)]
pub enum MockEntry {
    File {
        contents: Vec<u8>,
        modified: SystemTime,
    },
    Dir(Vec<String>), // List of child names
}

/// In-memory filesystem for resolver and cache tests.
///
/// Every write bumps a logical clock, so modification times are strictly
/// increasing without depending on the wall clock resolution.
#[derive(Debug, Clone, Default)]
pub struct MockFileSystem {
    files: Arc<Mutex<HashMap<PathBuf, MockEntry>>>,
    clock: Arc<Mutex<u64>>,
}

impl MockFileSystem {
    pub fn new() -> Self {
        let mut files = HashMap::new();
        // Ensure root exists
        files.insert(PathBuf::from("."), MockEntry::Dir(Vec::new()));

        Self {
            files: Arc::new(Mutex::new(files)),
            clock: Arc::new(Mutex::new(0)),
        }
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<PathBuf, MockEntry>> {
        self.files.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn tick(&self) -> SystemTime {
        let mut clock = self.clock.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        *clock += 1;
        SystemTime::UNIX_EPOCH + Duration::from_secs(*clock)
    }

    /// Create or overwrite a file, creating parent directories implicitly.
    pub fn add_file(&self, path: impl AsRef<Path>, content: impl Into<Vec<u8>>) {
        let path = path.as_ref().to_path_buf();
        let modified = self.tick();
        let mut files = self.entries();
        files.insert(
            path.clone(),
            MockEntry::File {
                contents: content.into(),
                modified,
            },
        );

        if let Some(parent) = path.parent() {
            let parent = if parent.as_os_str().is_empty() {
                Path::new(".")
            } else {
                parent
            };

            Self::ensure_dir_entry(&mut files, parent);
            Self::link_child(&mut files, parent, &path);
        }
    }

    /// Remove a file (no-op if it does not exist).
    pub fn remove_file(&self, path: impl AsRef<Path>) {
        let path = path.as_ref();
        let mut files = self.entries();
        if files.remove(path).is_none() {
            return;
        }
        let parent = match path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
        if let (Some(MockEntry::Dir(children)), Some(name)) =
            (files.get_mut(parent), path.file_name().and_then(|n| n.to_str()))
        {
            children.retain(|c| c != name);
        }
    }

    /// Read back the contents of a file.
    pub fn contents(&self, path: impl AsRef<Path>) -> Option<Vec<u8>> {
        match self.entries().get(path.as_ref()) {
            Some(MockEntry::File { contents, .. }) => Some(contents.clone()),
            _ => None,
        }
    }

    fn link_child(files: &mut HashMap<PathBuf, MockEntry>, parent: &Path, child: &Path) {
        if let Some(MockEntry::Dir(children)) = files.get_mut(parent) {
            if let Some(name) = child.file_name().and_then(|n| n.to_str()) {
                if !children.iter().any(|c| c == name) {
                    children.push(name.to_string());
                }
            }
        }
    }

    fn ensure_dir_entry(files: &mut HashMap<PathBuf, MockEntry>, path: &Path) {
        if files.contains_key(path) {
            return;
        }
        files.insert(path.to_path_buf(), MockEntry::Dir(Vec::new()));
        if let Some(parent) = path.parent() {
            let parent = if parent.as_os_str().is_empty() {
                Path::new(".")
            } else {
                parent
            };

            if parent != path {
                // Avoid infinite loop at root
                Self::ensure_dir_entry(files, parent);
                Self::link_child(files, parent, path);
            }
        }
    }
}

impl FileSystem for MockFileSystem {
    fn exists(&self, path: &Path) -> bool {
        self.entries().contains_key(path)
    }

    fn is_file(&self, path: &Path) -> bool {
        matches!(self.entries().get(path), Some(MockEntry::File { .. }))
    }

    fn is_dir(&self, path: &Path) -> bool {
        matches!(self.entries().get(path), Some(MockEntry::Dir(_)))
    }

    fn modified(&self, path: &Path) -> Result<SystemTime> {
        match self.entries().get(path) {
            Some(MockEntry::File { modified, .. }) => Ok(*modified),
            Some(MockEntry::Dir(_)) => Err(anyhow!("Is a directory: {:?}", path)),
            None => Err(anyhow!("File not found: {:?}", path)),
        }
    }

    fn read_dir(&self, path: &Path) -> Result<Vec<PathBuf>> {
        match self.entries().get(path) {
            Some(MockEntry::Dir(children)) => {
                Ok(children.iter().map(|name| path.join(name)).collect())
            }
            _ => Err(anyhow!("Not a directory or not found: {:?}", path)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rewrites_bump_modification_time() {
        let fs = MockFileSystem::new();
        fs.add_file("./img/a.png", b"v1");
        let first = fs.modified(Path::new("./img/a.png")).unwrap();
        fs.add_file("./img/a.png", b"v2");
        let second = fs.modified(Path::new("./img/a.png")).unwrap();
        assert!(second > first);
        assert_eq!(fs.contents("./img/a.png").unwrap(), b"v2");
        assert_eq!(fs.read_dir(Path::new("./img")).unwrap().len(), 1);
    }

    #[test]
    fn removed_files_disappear_from_listing() {
        let fs = MockFileSystem::new();
        fs.add_file("./img/a.png", b"v1");
        fs.remove_file("./img/a.png");
        assert!(!fs.exists(Path::new("./img/a.png")));
        assert!(fs.read_dir(Path::new("./img")).unwrap().is_empty());
    }
}
