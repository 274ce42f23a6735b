//! Wiring from resolved settings to the running service graph.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::application::notes::NoteService;
use crate::application::render::NoteTemplate;
use crate::cache::{Cache, CacheConfig};
use crate::config::Settings;
use crate::domain::FileTypePolicy;

use super::error::InfraError;
use super::http::HttpState;
use super::signature::RequestSigner;
use super::storage::{AssetStore, NoteStore, StorageRoot};

pub struct Runtime {
    pub cache: Arc<Cache>,
    pub http: HttpState,
}

/// Open the storage root and build every service the router needs.
pub fn assemble(settings: &Settings) -> Result<Runtime, InfraError> {
    let root = Arc::new(StorageRoot::open(&settings.storage.root)?);
    let template = NoteTemplate::load(settings.storage.note_template.as_deref()).map_err(|err| {
        InfraError::configuration(format!("failed to read note template: {err}"))
    })?;

    let cache = Arc::new(Cache::new(CacheConfig::from(&settings.cache)));
    let public_base = settings.server.server_url.as_str();
    let assets = Arc::new(AssetStore::new(
        root.clone(),
        FileTypePolicy::new(settings.storage.allowed_filetypes.iter()),
        cache.clone(),
        public_base,
    ));
    let notes = Arc::new(NoteStore::new(
        root.clone(),
        cache.clone(),
        assets,
        settings.security.secret_api_key.clone(),
    ));
    let service = Arc::new(NoteService::new(notes, template, public_base));

    info!(
        root = %root.path().display(),
        server_url = public_base,
        cache_enabled = settings.cache.enabled,
        "storage ready"
    );

    Ok(Runtime {
        cache,
        http: HttpState {
            service,
            signer: Arc::new(RequestSigner::new(
                settings.security.secret_api_key.clone(),
            )),
            max_upload_bytes: settings.security.max_upload_bytes,
        },
    })
}

/// Periodically drop expired cache entries.
pub fn spawn_sweeper(cache: Arc<Cache>, every: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(every);
        interval.tick().await;
        loop {
            interval.tick().await;
            let removed = cache.sweep();
            if removed > 0 {
                debug!(op = "sweep", removed, "expired cache entries dropped");
            }
        }
    })
}
