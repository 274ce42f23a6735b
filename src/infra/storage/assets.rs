//! Asset Store: uploaded files, their per-note directories and the site theme.
//!
//! An upload without an owning note lands in the scratch area at the root.
//! When a note that references it is saved, [`AssetStore::attach_to_note`]
//! moves it under `notes/<id>/assets/` and rewrites the note body to the
//! canonical URL. Assets no longer referenced by a note's current body are
//! removed by [`AssetStore::reconcile_on_update`].

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use bytes::Bytes;
use metrics::counter;
use regex::{Captures, Regex};
use tracing::{debug, info, warn};

use crate::cache::{Cache, CacheKey, Cacheable, STATIC_OP};
use crate::domain::assets::THEME_FILE_NAME;
use crate::domain::notes::is_valid_identifier;
use crate::domain::{AssetRef, ContentHash, FileTypePolicy, NoteId};

use super::paths;
use super::{ASSETS_DIR, NOTES_DIR, StorageRoot, StoreError, write_atomically};

/// Served regardless of the upload policy: note documents and site scripts.
const SITE_EXTENSIONS: [&str; 2] = ["html", "js"];

/// Where an upload should be placed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssetScope {
    /// Not yet claimed by any note.
    Scratch,
    /// Directly inside the asset directory of the given note.
    Note(NoteId),
}

/// A stored asset and its public URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredAsset {
    pub relative_path: String,
    pub url: String,
}

/// Result of relocating a note's assets.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AttachOutcome {
    /// The note body with every placed asset pointing at its canonical URL.
    pub body: String,
    /// File names now present in the note's asset directory.
    pub placed: Vec<String>,
    /// File names that could not be located or moved.
    pub failed: Vec<String>,
}

/// A static file ready to be served.
#[derive(Debug, Clone)]
pub enum StaticFile {
    /// Small enough to keep in memory; memoized.
    Buffered { body: Bytes, content_type: String },
    /// Read from disk per request and never cached.
    Streamed {
        path: PathBuf,
        len: u64,
        content_type: String,
    },
}

impl StaticFile {
    pub fn content_type(&self) -> &str {
        match self {
            Self::Buffered { content_type, .. } | Self::Streamed { content_type, .. } => {
                content_type
            }
        }
    }
}

#[derive(Debug)]
pub struct AssetStore {
    root: Arc<StorageRoot>,
    policy: FileTypePolicy,
    cache: Arc<Cache>,
    public_base: String,
}

impl AssetStore {
    pub fn new(
        root: Arc<StorageRoot>,
        policy: FileTypePolicy,
        cache: Arc<Cache>,
        public_base: impl Into<String>,
    ) -> Self {
        let public_base = public_base.into().trim_end_matches('/').to_string();
        Self {
            root,
            policy,
            cache,
            public_base,
        }
    }

    pub fn policy(&self) -> &FileTypePolicy {
        &self.policy
    }

    /// Public URL of a file addressed relative to the storage root.
    pub fn public_url(&self, relative_path: &str) -> String {
        format!("{}/static/{relative_path}", self.public_base)
    }

    /// Persist uploaded bytes.
    ///
    /// Stylesheets always replace the site theme, whatever the scope.
    pub fn admit(
        &self,
        hash: &str,
        file_type: &str,
        scope: &AssetScope,
        bytes: &[u8],
    ) -> Result<StoredAsset, StoreError> {
        let hash = ContentHash::parse(hash)?;
        let file_type = self.policy.check(file_type)?;
        let file_name = format!("{hash}.{file_type}");

        let relative_path = if file_type.is_theme() {
            THEME_FILE_NAME.to_string()
        } else {
            match scope {
                AssetScope::Scratch => file_name,
                AssetScope::Note(note) => owned_path(note.as_str(), &file_name),
            }
        };

        let target = paths::resolve_for_write(self.root.path(), &self.root.join(&relative_path))?;
        write_atomically(&target, bytes)?;
        self.cache.invalidate(&CacheKey::static_file(&relative_path));

        info!(
            op = "admit",
            asset = %relative_path,
            size = bytes.len(),
            "asset stored"
        );

        Ok(StoredAsset {
            url: self.public_url(&relative_path),
            relative_path,
        })
    }

    /// Current location of an asset: the theme, the scratch area, or any
    /// note's asset directory.
    pub fn locate(&self, asset: &AssetRef) -> Result<Option<StoredAsset>, StoreError> {
        if asset.file_type.is_theme() {
            return Ok(self.theme_url().map(|url| StoredAsset {
                relative_path: THEME_FILE_NAME.to_string(),
                url,
            }));
        }

        let file_name = asset.file_name();
        if self.is_stored(&file_name) {
            return Ok(Some(self.stored(file_name)));
        }
        for note in self.note_directories()? {
            let relative = owned_path(&note, &file_name);
            if self.is_stored(&relative) {
                return Ok(Some(self.stored(relative)));
            }
        }
        Ok(None)
    }

    pub fn theme_url(&self) -> Option<String> {
        self.is_stored(THEME_FILE_NAME)
            .then(|| self.public_url(THEME_FILE_NAME))
    }

    /// Move every referenced asset into the note's own directory and point
    /// the body at the canonical URLs.
    ///
    /// A single asset that cannot be placed is logged and skipped; it never
    /// fails the note.
    pub fn attach_to_note(&self, note: &NoteId, assets: &[AssetRef], body: &str) -> AttachOutcome {
        let mut outcome = AttachOutcome {
            body: body.to_string(),
            ..AttachOutcome::default()
        };

        for asset in assets.iter().filter(|asset| !asset.file_type.is_theme()) {
            let file_name = asset.file_name();
            match self.place_in_note(note, asset) {
                Ok(relative) => {
                    let canonical = self.public_url(&relative);
                    outcome.body = rewrite_references(&outcome.body, asset, &canonical);
                    outcome.placed.push(file_name);
                }
                Err(err) => {
                    counter!("sharenote_asset_relocation_failed_total").increment(1);
                    warn!(
                        op = "attach",
                        note_id = %note,
                        asset = %file_name,
                        error = %err,
                        "asset relocation failed"
                    );
                    outcome.failed.push(file_name);
                }
            }
        }

        outcome
    }

    /// Remove assets in the note's directory that `body` no longer references.
    pub fn reconcile_on_update(&self, note: &NoteId, body: &str) -> Result<Vec<String>, StoreError> {
        let directory_relative = format!("{NOTES_DIR}/{note}/{ASSETS_DIR}");
        let directory = self.root.join(&directory_relative);
        let entries = match fs::read_dir(&directory) {
            Ok(entries) => entries,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(err.into()),
        };

        let mut removed = Vec::new();
        for entry in entries {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            let Some(name) = entry.file_name().to_str().map(str::to_string) else {
                continue;
            };
            let relative = format!("{directory_relative}/{name}");
            if body.contains(&relative) {
                continue;
            }

            match fs::remove_file(entry.path()) {
                Ok(()) => {}
                Err(err) if err.kind() == io::ErrorKind::NotFound => {}
                Err(err) => return Err(err.into()),
            }
            self.cache.invalidate(&CacheKey::static_file(&relative));
            counter!("sharenote_asset_gc_removed_total").increment(1);
            debug!(op = "reconcile", note_id = %note, asset = %name, "unreferenced asset removed");
            removed.push(name);
        }
        Ok(removed)
    }

    /// Remove the note's whole asset directory. Missing directories are fine.
    pub fn delete(&self, note: &NoteId) -> Result<(), StoreError> {
        let relative = format!("{NOTES_DIR}/{note}");
        let directory = self.root.join(&relative);

        let result = match fs::symlink_metadata(&directory) {
            Ok(meta) if meta.file_type().is_symlink() || meta.is_file() => {
                fs::remove_file(&directory)
            }
            Ok(_) => fs::remove_dir_all(&directory),
            Err(err) => Err(err),
        };
        match result {
            Ok(()) => {}
            Err(err) if err.kind() == io::ErrorKind::NotFound => {}
            Err(err) => return Err(err.into()),
        }

        self.cache
            .invalidate_prefix(&CacheKey::static_prefix(&relative));
        debug!(op = "delete_assets", note_id = %note, "asset directory removed");
        Ok(())
    }

    /// Load a file below the root for serving.
    ///
    /// Files up to the cache's size ceiling are read into memory and
    /// memoized; larger ones are handed back as a path to stream.
    pub fn fetch(&self, relative_path: &str) -> Result<StaticFile, StoreError> {
        let candidate = paths::resolve_relative(self.root.path(), relative_path)?;
        if !self.is_servable(&candidate) {
            return Err(StoreError::AccessDenied(relative_path.to_string()));
        }

        let config = self.cache.config();
        let ttl = config.note_ttl;
        let ceiling = u64::try_from(config.max_cached_bytes).unwrap_or(u64::MAX);
        let root = self.root.path();

        self.cache.memoize(
            STATIC_OP,
            relative_path,
            |relative| relative.to_string(),
            ttl,
            |relative: &str| -> Result<Cacheable<StaticFile>, StoreError> {
                let path = paths::check(root, &candidate).into_file(relative)?;
                let len = fs::metadata(&path)?.len();
                let content_type = mime_guess::from_path(&path)
                    .first_or_octet_stream()
                    .essence_str()
                    .to_string();

                if len > ceiling {
                    return Ok(Cacheable::Bypass(StaticFile::Streamed {
                        path,
                        len,
                        content_type,
                    }));
                }
                let body = Bytes::from(fs::read(&path)?);
                Ok(Cacheable::Store(StaticFile::Buffered { body, content_type }))
            },
        )
    }

    fn is_servable(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| {
                SITE_EXTENSIONS
                    .iter()
                    .any(|site| ext.eq_ignore_ascii_case(site))
                    || self.policy.allows_extension(ext)
            })
            .unwrap_or(false)
    }

    fn place_in_note(&self, note: &NoteId, asset: &AssetRef) -> Result<String, StoreError> {
        let file_name = asset.file_name();
        let target_relative = owned_path(note.as_str(), &file_name);
        if self.is_stored(&target_relative) {
            return Ok(target_relative);
        }

        let source = self
            .find_source(note, asset)?
            .ok_or_else(|| StoreError::NotFound(file_name.clone()))?;
        let source_path = paths::check(self.root.path(), Path::new(&source)).into_file(&source)?;
        let target = paths::resolve_for_write(self.root.path(), &self.root.join(&target_relative))?;
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }
        move_file(&source_path, &target)?;

        self.cache.invalidate_all([
            &CacheKey::static_file(&source),
            &CacheKey::static_file(&target_relative),
        ]);
        debug!(
            op = "attach",
            note_id = %note,
            from = %source,
            to = %target_relative,
            "asset relocated"
        );
        Ok(target_relative)
    }

    /// Scratch first, then other notes' asset directories, then legacy
    /// display-name locations in any note directory.
    fn find_source(&self, note: &NoteId, asset: &AssetRef) -> Result<Option<String>, StoreError> {
        let file_name = asset.file_name();
        if self.is_stored(&file_name) {
            return Ok(Some(file_name));
        }

        let notes = self.note_directories()?;
        for other in notes.iter().filter(|other| other.as_str() != note.as_str()) {
            let relative = owned_path(other, &file_name);
            if self.is_stored(&relative) {
                return Ok(Some(relative));
            }
        }

        if let Some(legacy) = asset.legacy_name.as_deref() {
            for owner in &notes {
                let relative = format!("{NOTES_DIR}/{owner}/{legacy}");
                if self.is_stored(&relative) {
                    return Ok(Some(relative));
                }
            }
        }
        Ok(None)
    }

    fn note_directories(&self) -> Result<Vec<String>, StoreError> {
        let entries = match fs::read_dir(self.root.join(NOTES_DIR)) {
            Ok(entries) => entries,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(err.into()),
        };

        let mut notes = Vec::new();
        for entry in entries {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }
            if let Some(name) = entry.file_name().to_str()
                && is_valid_identifier(name)
            {
                notes.push(name.to_string());
            }
        }
        notes.sort();
        Ok(notes)
    }

    fn is_stored(&self, relative_path: &str) -> bool {
        paths::is_contained(self.root.path(), Path::new(relative_path))
    }

    fn stored(&self, relative_path: String) -> StoredAsset {
        StoredAsset {
            url: self.public_url(&relative_path),
            relative_path,
        }
    }
}

fn owned_path(note: &str, file_name: &str) -> String {
    format!("{NOTES_DIR}/{note}/{ASSETS_DIR}/{file_name}")
}

fn move_file(from: &Path, to: &Path) -> io::Result<()> {
    match fs::rename(from, to) {
        Ok(()) => Ok(()),
        Err(_) => copy_then_replace(from, to),
    }
}

/// Copy through a temp file beside `to`, publish it by rename, then drop the source.
///
/// A failed copy leaves no file at `to`.
fn copy_then_replace(from: &Path, to: &Path) -> io::Result<()> {
    let parent = to
        .parent()
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "target has no parent"))?;
    let mut source = fs::File::open(from)?;
    let mut temp = tempfile::Builder::new()
        .prefix(".sharenote-")
        .suffix(".tmp")
        .tempfile_in(parent)?;
    io::copy(&mut source, temp.as_file_mut())?;
    temp.as_file().sync_all()?;
    temp.persist(to).map_err(|err| err.error)?;
    fs::remove_file(from)
}

/// Point every recognised reference to `asset` at `canonical`.
///
/// Recognised forms, each optionally prefixed by a scheme and host:
/// `/static/<file>`, `static/<file>`, `/static/notes/<any>/<file>`,
/// `/static/notes/<any>/assets/<file>`, and `/static/notes/<any>/<legacy name>`.
/// The canonical URL is itself a recognised form, so rewriting twice is a
/// no-op.
pub fn rewrite_references(body: &str, asset: &AssetRef, canonical: &str) -> String {
    let file = regex::escape(&asset.file_name());
    let mut targets = format!(r"(?:{NOTES_DIR}/[a-z0-9_-]+/(?:{ASSETS_DIR}/)?)?{file}");
    if let Some(legacy) = asset.legacy_name.as_deref() {
        targets.push_str(&format!(r"|{NOTES_DIR}/[a-z0-9_-]+/{}", regex::escape(legacy)));
        let encoded = legacy.replace(' ', "%20");
        if encoded != legacy {
            targets.push_str(&format!(r"|{NOTES_DIR}/[a-z0-9_-]+/{}", regex::escape(&encoded)));
        }
    }
    let pattern = format!(
        r#"(?P<lead>^|[\s"'(=,;>])(?:https?://[^\s"'()<>]*?)?/?static/(?:{targets})\b"#
    );

    match Regex::new(&pattern) {
        Ok(regex) => regex
            .replace_all(body, |captures: &Captures<'_>| {
                format!("{}{canonical}", &captures["lead"])
            })
            .into_owned(),
        Err(err) => {
            warn!(asset = %asset.file_name(), error = %err, "asset reference pattern rejected");
            body.to_string()
        }
    }
}
