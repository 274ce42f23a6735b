//! Note Store: the authoritative read/write path for note documents.

use std::fs;
use std::io;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use dashmap::DashMap;
use tracing::{debug, info, warn};

use crate::cache::{Cache, CacheKey, Cacheable, DOC_TREE_OP, NOTE_OP, mutex_lock};
use crate::domain::notes::{INDEX_IDENTIFIER, is_home_page_title, is_valid_identifier};
use crate::domain::slug::{generate_identifier, short_code};
use crate::domain::{AssetRef, NoteId};

use super::assets::AssetStore;
use super::paths;
use super::tree::{self, DocEntry, DocTreeNode};
use super::{StorageRoot, StoreError, write_atomically};

const SOURCE: &str = "infra::storage::notes";
const DOCUMENT_EXTENSION: &str = "html";

/// Summary of a create or update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishedNote {
    pub id: NoteId,
    pub placed_assets: Vec<String>,
    pub failed_assets: Vec<String>,
    pub removed_assets: Vec<String>,
}

#[derive(Debug)]
pub struct NoteStore {
    root: Arc<StorageRoot>,
    cache: Arc<Cache>,
    assets: Arc<AssetStore>,
    secret: String,
    locks: DashMap<String, Arc<Mutex<()>>>,
    storage_reads: AtomicU64,
}

impl NoteStore {
    pub fn new(
        root: Arc<StorageRoot>,
        cache: Arc<Cache>,
        assets: Arc<AssetStore>,
        secret: impl Into<String>,
    ) -> Self {
        Self {
            root,
            cache,
            assets,
            secret: secret.into(),
            locks: DashMap::new(),
            storage_reads: AtomicU64::new(0),
        }
    }

    pub fn assets(&self) -> &AssetStore {
        &self.assets
    }

    /// Number of document files read from disk so far.
    pub fn storage_reads(&self) -> u64 {
        self.storage_reads.load(Ordering::Relaxed)
    }

    /// Pick the identifier a create/update request should write to.
    ///
    /// Home-page titles always map to `index`. Otherwise an existing document
    /// is reused when exactly one identifier ends with the supplied short
    /// code, or failing that with the title's own short code; only then is a
    /// fresh identifier derived from the title.
    pub fn resolve_identifier(
        &self,
        supplied: Option<&str>,
        title: &str,
    ) -> Result<NoteId, StoreError> {
        if is_home_page_title(title) {
            return Ok(NoteId::index());
        }

        let existing = self.document_identifiers()?;

        if let Some(code) = supplied.map(str::trim).filter(|code| !code.is_empty()) {
            if is_valid_identifier(code) {
                if let [only] = matching_suffix(&existing, code).as_slice() {
                    debug!(op = "resolve", note_id = %only, "reusing identifier for supplied code");
                    return Ok(NoteId::parse(only.as_str())?);
                }
            } else {
                debug!(op = "resolve", supplied = code, "ignoring malformed supplied code");
            }
        }

        let code = short_code(title, &self.secret);
        if let [only] = matching_suffix(&existing, &code).as_slice() {
            return Ok(NoteId::parse(only.as_str())?);
        }

        Ok(NoteId::parse(generate_identifier(title, &self.secret))?)
    }

    /// Write a rendered document, replacing any previous version atomically.
    pub fn write(&self, identifier: &str, body: &str) -> Result<NoteId, StoreError> {
        let id = NoteId::parse(identifier)?;
        let lock = self.identifier_lock(&id);
        let _guard = mutex_lock(&lock, SOURCE, "write");
        self.write_document(&id, body)?;
        Ok(id)
    }

    /// Place the note's assets, write the document and collect assets the
    /// new body no longer references, as one step per identifier.
    pub fn publish(
        &self,
        id: &NoteId,
        body: &str,
        assets: &[AssetRef],
    ) -> Result<PublishedNote, StoreError> {
        let lock = self.identifier_lock(id);
        let _guard = mutex_lock(&lock, SOURCE, "publish");

        let attached = self.assets.attach_to_note(id, assets, body);
        self.write_document(id, &attached.body)?;

        let removed_assets = match self.assets.reconcile_on_update(id, &attached.body) {
            Ok(removed) => removed,
            Err(err) => {
                warn!(op = "reconcile", note_id = %id, error = %err, "asset cleanup failed");
                Vec::new()
            }
        };

        Ok(PublishedNote {
            id: id.clone(),
            placed_assets: attached.placed,
            failed_assets: attached.failed,
            removed_assets,
        })
    }

    /// Read a document, serving from the cache while the entry is live.
    pub fn read(&self, identifier: &str) -> Result<Arc<str>, StoreError> {
        let id = NoteId::parse(identifier)?;
        let ttl = self.cache.config().note_ttl;

        self.cache.memoize(
            NOTE_OP,
            id.as_str(),
            |id| id.to_string(),
            ttl,
            |id: &str| -> Result<Cacheable<Arc<str>>, StoreError> {
                let file_name = format!("{id}.{DOCUMENT_EXTENSION}");
                let path = paths::check(self.root.path(), Path::new(&file_name)).into_file(id)?;
                self.storage_reads.fetch_add(1, Ordering::Relaxed);
                let body = fs::read_to_string(&path)?;
                Ok(Cacheable::Store(Arc::from(body)))
            },
        )
    }

    /// Delete the document addressed by `target` and its asset directory.
    ///
    /// `index` matches exactly; anything else is a short code matched
    /// against identifier suffixes. Zero or several matches are `NotFound`.
    pub fn delete(&self, target: &str) -> Result<NoteId, StoreError> {
        if !is_valid_identifier(target) {
            return Err(StoreError::InvalidIdentifier(target.to_string()));
        }

        let existing = self.document_identifiers()?;
        let candidates: Vec<&String> = if target == INDEX_IDENTIFIER {
            existing.iter().filter(|id| *id == INDEX_IDENTIFIER).collect()
        } else {
            let suffix = format!("-{target}");
            existing.iter().filter(|id| id.ends_with(&suffix)).collect()
        };
        let [only] = candidates.as_slice() else {
            debug!(op = "delete", target, matches = candidates.len(), "no unique delete target");
            return Err(StoreError::NotFound(target.to_string()));
        };

        let id = NoteId::parse(only.as_str())?;
        let lock = self.identifier_lock(&id);
        let result = {
            let _guard = mutex_lock(&lock, SOURCE, "delete");
            self.remove_document(&id, target)
        };
        drop(lock);
        self.release_lock(&id);

        result?;
        info!(op = "delete", note_id = %id, "note deleted");
        Ok(id)
    }

    fn remove_document(&self, id: &NoteId, target: &str) -> Result<(), StoreError> {
        let path = paths::check(self.root.path(), Path::new(&id.document_file_name()))
            .into_file(target)?;
        match fs::remove_file(&path) {
            Ok(()) => {}
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                return Err(StoreError::NotFound(target.to_string()));
            }
            Err(err) => return Err(err.into()),
        }
        self.invalidate_document(id);
        self.assets.delete(id)
    }

    /// Folder tree of every stored document, `index` first.
    pub fn doc_tree(&self) -> Result<Arc<Vec<DocTreeNode>>, StoreError> {
        let ttl = self.cache.config().tree_ttl;
        self.cache.memoize(
            DOC_TREE_OP,
            &(),
            |_| String::new(),
            ttl,
            |_| -> Result<Cacheable<Arc<Vec<DocTreeNode>>>, StoreError> {
                let mut identifiers = self.document_identifiers()?;
                if let Some(position) = identifiers.iter().position(|id| id == INDEX_IDENTIFIER) {
                    let index = identifiers.remove(position);
                    identifiers.insert(0, index);
                }

                let mut entries = Vec::with_capacity(identifiers.len());
                for identifier in identifiers {
                    let title = self
                        .document_title(&identifier)
                        .unwrap_or_else(|| identifier.clone());
                    entries.push(DocEntry { identifier, title });
                }
                Ok(Cacheable::Store(Arc::new(tree::organize(&entries))))
            },
        )
    }

    fn document_title(&self, identifier: &str) -> Option<String> {
        let file_name = format!("{identifier}.{DOCUMENT_EXTENSION}");
        let path = paths::check(self.root.path(), Path::new(&file_name))
            .into_file(identifier)
            .ok()?;
        self.storage_reads.fetch_add(1, Ordering::Relaxed);
        match fs::read_to_string(&path) {
            Ok(html) => tree::extract_title(&html),
            Err(err) => {
                warn!(op = "doc_tree", note_id = identifier, error = %err, "document unreadable");
                None
            }
        }
    }

    fn write_document(&self, id: &NoteId, body: &str) -> Result<(), StoreError> {
        let target = paths::resolve_for_write(
            self.root.path(),
            &self.root.join(id.document_file_name()),
        )?;
        write_atomically(&target, body.as_bytes())?;
        self.invalidate_document(id);
        info!(op = "write", note_id = %id, size = body.len(), "note written");
        Ok(())
    }

    fn invalidate_document(&self, id: &NoteId) {
        self.cache.invalidate_all([
            &CacheKey::note(id.as_str()),
            &CacheKey::doc_tree(),
            &CacheKey::static_file(&id.document_file_name()),
        ]);
    }

    /// Identifiers of every `<id>.html` directly under the root, sorted.
    fn document_identifiers(&self) -> Result<Vec<String>, StoreError> {
        let mut identifiers = Vec::new();
        for entry in fs::read_dir(self.root.path())? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            let name = entry.file_name();
            let Some(name) = name.to_str() else {
                continue;
            };
            if let Some(stem) = name.strip_suffix(".html")
                && is_valid_identifier(stem)
            {
                identifiers.push(stem.to_string());
            }
        }
        identifiers.sort();
        Ok(identifiers)
    }

    fn identifier_lock(&self, id: &NoteId) -> Arc<Mutex<()>> {
        self.locks
            .entry(id.as_str().to_string())
            .or_default()
            .clone()
    }

    /// Forget the lock of a deleted note unless another caller still holds it.
    fn release_lock(&self, id: &NoteId) {
        self.locks
            .remove_if(id.as_str(), |_, lock| Arc::strong_count(lock) == 1);
    }
}

fn matching_suffix<'a>(existing: &'a [String], code: &str) -> Vec<&'a String> {
    let suffix = format!("-{code}");
    existing
        .iter()
        .filter(|id| id.as_str() == code || id.ends_with(&suffix))
        .collect()
}
