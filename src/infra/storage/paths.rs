//! Containment checks for every path that reaches the filesystem.
//!
//! A path is acceptable only when its lexically normalized form stays under
//! the storage root and, once symlinks are resolved, its canonical form does
//! too.

use std::io;
use std::path::{Component, Path, PathBuf};

use super::StoreError;

/// Outcome of checking a candidate path against the storage root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Containment {
    /// The path resolves to a regular file under the root; carries the canonical path.
    Contained(PathBuf),
    /// The path leaves the root, lexically or through a symlink.
    Escapes,
    /// Nothing exists at the path.
    Missing,
    /// The path exists under the root but is not a regular file.
    NotAFile,
}

impl Containment {
    pub fn is_contained(&self) -> bool {
        matches!(self, Self::Contained(_))
    }

    /// Convert into a readable path or the matching storage error.
    pub fn into_file(self, label: &str) -> Result<PathBuf, StoreError> {
        match self {
            Self::Contained(path) => Ok(path),
            Self::Escapes => Err(StoreError::AccessDenied(label.to_string())),
            Self::Missing | Self::NotAFile => Err(StoreError::NotFound(label.to_string())),
        }
    }
}

/// Check `candidate` (absolute, or relative to `root`) for containment.
///
/// `root` must already be canonical.
pub fn check(root: &Path, candidate: &Path) -> Containment {
    let joined = if candidate.is_absolute() {
        candidate.to_path_buf()
    } else {
        root.join(candidate)
    };

    let Some(normalized) = normalize(&joined) else {
        return Containment::Escapes;
    };
    if !normalized.starts_with(root) {
        return Containment::Escapes;
    }

    match std::fs::symlink_metadata(&normalized) {
        Ok(_) => {}
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Containment::Missing,
        Err(_) => return Containment::Escapes,
    }

    let canonical = match normalized.canonicalize() {
        Ok(canonical) => canonical,
        // Dangling symlink.
        Err(_) => return Containment::Escapes,
    };
    if !canonical.starts_with(root) {
        return Containment::Escapes;
    }

    match std::fs::metadata(&canonical) {
        Ok(meta) if meta.is_file() => Containment::Contained(canonical),
        Ok(_) => Containment::NotAFile,
        Err(_) => Containment::Missing,
    }
}

pub fn is_contained(root: &Path, candidate: &Path) -> bool {
    check(root, candidate).is_contained()
}

/// Resolve a `/`-separated relative path taken from a request.
///
/// Only plain components are accepted; `..`, `.`, absolute prefixes and
/// backslashes are refused outright.
pub fn resolve_relative(root: &Path, relative: &str) -> Result<PathBuf, StoreError> {
    if relative.is_empty() || relative.contains('\\') || relative.contains('\0') {
        return Err(StoreError::AccessDenied(relative.to_string()));
    }
    let path = Path::new(relative);
    if !path
        .components()
        .all(|component| matches!(component, Component::Normal(_)))
    {
        return Err(StoreError::AccessDenied(relative.to_string()));
    }
    Ok(root.join(path))
}

/// Validate a path that is about to be created or replaced.
///
/// An existing entry must canonicalize under the root. For a new entry the
/// nearest existing ancestor must, so that a symlinked directory cannot
/// redirect the write.
pub fn resolve_for_write(root: &Path, target: &Path) -> Result<PathBuf, StoreError> {
    let label = target.display().to_string();
    let normalized = normalize(target).ok_or_else(|| StoreError::AccessDenied(label.clone()))?;
    if !normalized.starts_with(root) {
        return Err(StoreError::AccessDenied(label));
    }

    match std::fs::symlink_metadata(&normalized) {
        Ok(_) => {
            let canonical = normalized
                .canonicalize()
                .map_err(|_| StoreError::AccessDenied(label.clone()))?;
            if !canonical.starts_with(root) {
                return Err(StoreError::AccessDenied(label));
            }
            return Ok(normalized);
        }
        Err(err) if err.kind() == io::ErrorKind::NotFound => {}
        Err(err) => return Err(StoreError::StorageIo(err)),
    }

    let mut ancestor = normalized.as_path();
    while let Some(parent) = ancestor.parent() {
        match std::fs::symlink_metadata(parent) {
            Ok(_) => {
                let canonical = parent
                    .canonicalize()
                    .map_err(|_| StoreError::AccessDenied(label.clone()))?;
                if !canonical.starts_with(root) {
                    return Err(StoreError::AccessDenied(label));
                }
                break;
            }
            Err(err) if err.kind() == io::ErrorKind::NotFound => {}
            Err(err) => return Err(StoreError::StorageIo(err)),
        }
        ancestor = parent;
    }

    Ok(normalized)
}

/// Lexically fold `.` and `..`. Returns `None` when `..` climbs past the top.
fn normalize(path: &Path) -> Option<PathBuf> {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    return None;
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    Some(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn root() -> (tempfile::TempDir, PathBuf) {
        let dir = tempfile::tempdir().expect("tempdir");
        let canonical = dir.path().canonicalize().expect("canonical root");
        (dir, canonical)
    }

    #[test]
    fn regular_file_inside_root_is_contained() {
        let (_dir, root) = root();
        std::fs::write(root.join("a.html"), "x").expect("write");
        assert_eq!(
            check(&root, Path::new("a.html")),
            Containment::Contained(root.join("a.html"))
        );
    }

    #[test]
    fn parent_escape_is_rejected() {
        let (_dir, root) = root();
        assert_eq!(
            check(&root, Path::new("../../etc/passwd")),
            Containment::Escapes
        );
        assert_eq!(check(&root, Path::new("/etc/passwd")), Containment::Escapes);
        assert!(resolve_relative(&root, "notes/../../x").is_err());
        assert!(resolve_relative(&root, "/etc/passwd").is_err());
    }

    #[test]
    fn inner_dot_segments_that_stay_inside_are_accepted() {
        let (_dir, root) = root();
        std::fs::create_dir_all(root.join("notes")).expect("mkdir");
        std::fs::write(root.join("b.css"), "x").expect("write");
        assert!(is_contained(&root, Path::new("notes/../b.css")));
    }

    #[test]
    fn missing_and_directories_are_distinguished() {
        let (_dir, root) = root();
        std::fs::create_dir_all(root.join("notes")).expect("mkdir");
        assert_eq!(check(&root, Path::new("none.html")), Containment::Missing);
        assert_eq!(check(&root, Path::new("notes")), Containment::NotAFile);
    }

    #[test]
    #[cfg(unix)]
    fn symlink_out_of_root_is_rejected() {
        use std::os::unix::fs::symlink;

        let (_dir, root) = root();
        let outside = tempfile::tempdir().expect("outside");
        let secret = outside.path().join("secret.txt");
        std::fs::write(&secret, "secret").expect("write");

        symlink(&secret, root.join("link.txt")).expect("symlink");
        symlink(outside.path(), root.join("linked-dir")).expect("symlink dir");

        assert_eq!(check(&root, Path::new("link.txt")), Containment::Escapes);
        assert_eq!(
            check(&root, Path::new("linked-dir/secret.txt")),
            Containment::Escapes
        );
        assert!(matches!(
            resolve_for_write(&root, &root.join("linked-dir/new/file.png")),
            Err(StoreError::AccessDenied(_))
        ));
    }

    #[test]
    fn new_paths_under_root_can_be_written() {
        let (_dir, root) = root();
        let target = root.join("notes/a/assets/f.png");
        assert_eq!(resolve_for_write(&root, &target).expect("ok"), target);
    }
}
