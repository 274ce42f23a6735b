//! Publishing service: the operations behind the client-facing endpoints.

use std::sync::Arc;

use serde::{Deserialize, Serialize, Serializer};
use tracing::{info, warn};

use crate::domain::notes::INDEX_IDENTIFIER;
use crate::domain::{AssetDescriptor, AssetRef, NoteId};
use crate::infra::storage::{
    AssetScope, DocTreeNode, NoteStore, StaticFile, StoreError, StoredAsset,
};

use super::error::AppError;
use super::render::{NoteTemplate, TemplateFields};

/// Body of a create-note request.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NotePayload {
    pub template: TemplateFields,
    /// Short code (or full identifier) of a previously published note.
    #[serde(default)]
    pub filename: Option<String>,
    #[serde(default, alias = "assets")]
    pub files: Vec<AssetDescriptor>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PublishResponse {
    pub success: bool,
    pub url: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub unresolved_assets: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CheckedFile {
    pub hash: String,
    pub filetype: String,
    #[serde(serialize_with = "url_or_false")]
    pub url: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ThemeLocation {
    pub url: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct CheckFilesResponse {
    pub success: bool,
    pub files: Vec<CheckedFile>,
    #[serde(serialize_with = "url_or_false")]
    pub css: Option<ThemeLocation>,
}

/// Upload parameters taken from request headers.
#[derive(Debug, Clone)]
pub struct UploadRequest {
    pub hash: String,
    pub file_type: String,
    pub note: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct UploadResponse {
    pub success: bool,
    pub url: String,
}

#[derive(Debug)]
pub struct NoteService {
    notes: Arc<NoteStore>,
    template: NoteTemplate,
    public_base: String,
}

impl NoteService {
    pub fn new(notes: Arc<NoteStore>, template: NoteTemplate, public_base: impl Into<String>) -> Self {
        let public_base = public_base.into().trim_end_matches('/').to_string();
        Self {
            notes,
            template,
            public_base,
        }
    }

    pub fn note_url(&self, id: &NoteId) -> String {
        format!("{}/{id}", self.public_base)
    }

    /// Render, place assets, write and invalidate.
    ///
    /// Every validation (encryption flag, asset descriptors) runs before
    /// anything touches storage.
    pub fn publish(&self, payload: &NotePayload) -> Result<PublishResponse, AppError> {
        let html = self.template.cook(&payload.template)?;
        let policy = self.notes.assets().policy();
        let assets = payload
            .files
            .iter()
            .map(|descriptor| AssetRef::from_descriptor(descriptor, policy))
            .collect::<Result<Vec<_>, _>>()?;

        let id = self
            .notes
            .resolve_identifier(payload.filename.as_deref(), &payload.template.title)?;
        let published = self.notes.publish(&id, &html, &assets)?;

        if !published.failed_assets.is_empty() {
            warn!(
                op = "publish",
                note_id = %id,
                failed = ?published.failed_assets,
                "note published with unresolved assets"
            );
        }
        info!(
            op = "publish",
            note_id = %id,
            placed = published.placed_assets.len(),
            removed = published.removed_assets.len(),
            "note published"
        );

        Ok(PublishResponse {
            success: true,
            url: self.note_url(&id),
            unresolved_assets: published.failed_assets,
        })
    }

    pub fn delete(&self, filename: &str) -> Result<NoteId, AppError> {
        Ok(self.notes.delete(filename.trim())?)
    }

    /// Report where each asset currently lives, and the theme location.
    pub fn check_files(&self, files: &[AssetDescriptor]) -> Result<CheckFilesResponse, AppError> {
        let assets = self.notes.assets();
        let mut checked = Vec::with_capacity(files.len());
        for descriptor in files {
            let url = match AssetRef::from_descriptor(descriptor, assets.policy()) {
                Ok(asset) => assets.locate(&asset)?.map(|stored| stored.url),
                Err(_) => None,
            };
            checked.push(CheckedFile {
                hash: descriptor.hash.clone(),
                filetype: descriptor.filetype.clone(),
                url,
            });
        }

        Ok(CheckFilesResponse {
            success: true,
            files: checked,
            css: assets.theme_url().map(|url| ThemeLocation { url }),
        })
    }

    pub fn upload(&self, request: &UploadRequest, bytes: &[u8]) -> Result<UploadResponse, AppError> {
        let scope = match request.note.as_deref().map(str::trim) {
            Some(note) if !note.is_empty() => AssetScope::Note(NoteId::parse(note)?),
            _ => AssetScope::Scratch,
        };
        let StoredAsset { url, .. } =
            self.notes
                .assets()
                .admit(&request.hash, &request.file_type, &scope, bytes)?;
        Ok(UploadResponse { success: true, url })
    }

    pub fn read_note(&self, identifier: &str) -> Result<Arc<str>, AppError> {
        Ok(self.notes.read(identifier)?)
    }

    /// The home page, or `None` when none has been published.
    pub fn home_page(&self) -> Result<Option<Arc<str>>, AppError> {
        match self.notes.read(INDEX_IDENTIFIER) {
            Ok(body) => Ok(Some(body)),
            Err(StoreError::NotFound(_)) => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    pub fn doc_tree(&self) -> Result<Arc<Vec<DocTreeNode>>, AppError> {
        Ok(self.notes.doc_tree()?)
    }

    pub fn fetch_static(&self, relative_path: &str) -> Result<StaticFile, AppError> {
        Ok(self.notes.assets().fetch(relative_path)?)
    }
}

fn url_or_false<T, S>(value: &Option<T>, serializer: S) -> Result<S::Ok, S::Error>
where
    T: Serialize,
    S: Serializer,
{
    match value {
        Some(inner) => inner.serialize(serializer),
        None => serializer.serialize_bool(false),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{Cache, CacheConfig};
    use crate::domain::FileTypePolicy;
    use crate::infra::storage::{AssetStore, StorageRoot};

    fn service() -> (tempfile::TempDir, NoteService) {
        let dir = tempfile::tempdir().expect("tempdir");
        let root = Arc::new(StorageRoot::open(dir.path()).expect("root"));
        let cache = Arc::new(Cache::new(CacheConfig::default()));
        let assets = Arc::new(AssetStore::new(
            root.clone(),
            FileTypePolicy::new(["png"]),
            cache.clone(),
            "http://notes.test",
        ));
        let notes = Arc::new(NoteStore::new(root, cache, assets, "secret"));
        let service = NoteService::new(notes, NoteTemplate::default(), "http://notes.test/");
        (dir, service)
    }

    fn payload(title: &str) -> NotePayload {
        NotePayload {
            template: TemplateFields {
                title: title.to_string(),
                content: "<p>hi</p>".to_string(),
                ..TemplateFields::default()
            },
            ..NotePayload::default()
        }
    }

    #[test]
    fn publish_returns_note_url() {
        let (_dir, service) = service();
        let response = service.publish(&payload("Hello World")).expect("publish");
        assert!(response.url.starts_with("http://notes.test/hello-world-"));
        assert!(response.success);
    }

    #[test]
    fn invalid_asset_descriptor_rejects_before_writing() {
        let (dir, service) = service();
        let mut request = payload("Hello World");
        request.files.push(AssetDescriptor {
            hash: "abc".to_string(),
            filetype: "exe".to_string(),
            name: None,
        });

        assert!(matches!(
            service.publish(&request),
            Err(AppError::Store(StoreError::UnsupportedType(_)))
        ));
        let written = std::fs::read_dir(dir.path()).expect("list").count();
        assert_eq!(written, 0);
    }

    #[test]
    fn check_files_serializes_absent_entries_as_false() {
        let (_dir, service) = service();
        let response = service
            .check_files(&[AssetDescriptor {
                hash: "abc".to_string(),
                filetype: "png".to_string(),
                name: None,
            }])
            .expect("check");
        let json = serde_json::to_value(&response).expect("json");
        assert_eq!(json["files"][0]["url"], false);
        assert_eq!(json["css"], false);
    }

    #[test]
    fn home_page_is_optional() {
        let (_dir, service) = service();
        assert!(service.home_page().expect("home").is_none());
        service.publish(&payload("Share Note Index")).expect("publish");
        assert!(service.home_page().expect("home").is_some());
    }
}
