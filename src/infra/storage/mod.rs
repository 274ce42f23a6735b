//! Filesystem-backed note and asset storage.
//!
//! Everything lives below one storage root:
//!
//! ```text
//! <root>/<id>.html                     rendered note documents
//! <root>/theme.css                     singleton site theme
//! <root>/<hash>.<ext>                  scratch uploads not yet owned by a note
//! <root>/notes/<id>/assets/<hash>.<ext> assets owned by a note
//! ```
//!
//! The stores are synchronous; HTTP handlers call them through
//! `tokio::task::spawn_blocking`.

pub mod assets;
pub mod notes;
pub mod paths;
pub mod tree;

use std::io::{self, Write};
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::domain::DomainError;

pub use assets::{AssetScope, AssetStore, AttachOutcome, StaticFile, StoredAsset};
pub use notes::{NoteStore, PublishedNote};
pub use paths::Containment;
pub use tree::DocTreeNode;

/// Directory below the root that holds per-note asset directories.
pub const NOTES_DIR: &str = "notes";
/// Directory inside a note directory that holds its owned assets.
pub const ASSETS_DIR: &str = "assets";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("invalid identifier `{0}`")]
    InvalidIdentifier(String),
    #[error("invalid content hash `{0}`")]
    InvalidHash(String),
    #[error("file type `{0}` is not allowed")]
    UnsupportedType(String),
    #[error("`{0}` does not match exactly one stored file")]
    NotFound(String),
    #[error("access denied for `{0}`")]
    AccessDenied(String),
    #[error("storage i/o failed: {0}")]
    StorageIo(#[from] io::Error),
}

impl From<DomainError> for StoreError {
    fn from(err: DomainError) -> Self {
        match err {
            DomainError::InvalidIdentifier { value } => Self::InvalidIdentifier(value),
            DomainError::InvalidContentHash { value } => Self::InvalidHash(value),
            DomainError::UnsupportedType { file_type } => Self::UnsupportedType(file_type),
        }
    }
}

/// The canonical storage root shared by both stores.
#[derive(Debug, Clone)]
pub struct StorageRoot {
    path: PathBuf,
}

impl StorageRoot {
    /// Create the directory if needed and pin its canonical form.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref();
        std::fs::create_dir_all(path)?;
        Ok(Self {
            path: path.canonicalize()?,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn join(&self, relative: impl AsRef<Path>) -> PathBuf {
        self.path.join(relative)
    }

    /// Root-relative form of `absolute` with forward slashes, as used in URLs and cache keys.
    pub fn relative_key(&self, absolute: &Path) -> Option<String> {
        let relative = absolute.strip_prefix(&self.path).ok()?;
        let parts: Option<Vec<&str>> = relative
            .components()
            .map(|component| component.as_os_str().to_str())
            .collect();
        parts.map(|parts| parts.join("/"))
    }
}

/// Write `bytes` to `target` through a sibling temp file and a rename.
///
/// Readers either see the previous content or the new content, never a prefix.
pub(crate) fn write_atomically(target: &Path, bytes: &[u8]) -> Result<(), StoreError> {
    let parent = target
        .parent()
        .ok_or_else(|| StoreError::AccessDenied(target.display().to_string()))?;
    std::fs::create_dir_all(parent)?;

    let mut temp = tempfile::Builder::new()
        .prefix(".sharenote-")
        .suffix(".tmp")
        .tempfile_in(parent)?;
    temp.write_all(bytes)?;
    temp.as_file().sync_all()?;
    temp.persist(target).map_err(|err| StoreError::StorageIo(err.error))?;
    Ok(())
}
