// src/watch/path_utils.rs

//! Root-relative path strings for glob matching.

use std::path::Path;

/// Render a relative path with forward slashes, as globs expect.
pub fn to_slash(rel: &Path) -> String {
    rel.to_string_lossy().replace('\\', "/")
}

/// Convert `path` into a string relative to `root`.
///
/// Falls back to comparing canonical forms when the plain prefix check fails
/// (symlinked temp dirs, `/private/var` on macOS). Returns `None` if the
/// path is not under `root`.
pub fn relative_str(root: &Path, path: &Path) -> Option<String> {
    if let Ok(rel) = path.strip_prefix(root) {
        return Some(to_slash(rel));
    }

    let root_canon = root.canonicalize().ok()?;
    // A deleted file cannot be canonicalized; its parent usually can.
    let path_canon = match path.canonicalize() {
        Ok(p) => p,
        Err(_) => {
            let parent = path.parent()?.canonicalize().ok()?;
            parent.join(path.file_name()?)
        }
    };
    path_canon.strip_prefix(&root_canon).ok().map(to_slash)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_prefix() {
        assert_eq!(
            relative_str(Path::new("/p"), Path::new("/p/app/a.scss")).as_deref(),
            Some("app/a.scss")
        );
    }

    #[test]
    fn outside_root_is_none() {
        assert_eq!(relative_str(Path::new("/p/x"), Path::new("/q/a")), None);
    }
}
