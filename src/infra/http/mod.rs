//! Axum surface over [`NoteService`].
//!
//! Handlers are thin: they decode the request, run the synchronous core on
//! the blocking pool and encode the result.

mod middleware;
mod public;
mod signed;

use std::sync::Arc;

use axum::{Router, extract::DefaultBodyLimit, middleware as axum_middleware};

use crate::application::error::AppError;
use crate::application::notes::NoteService;
use crate::infra::signature::RequestSigner;

use middleware::{log_responses, require_signature, set_request_context};

#[derive(Clone)]
pub struct HttpState {
    pub service: Arc<NoteService>,
    pub signer: Arc<RequestSigner>,
    pub max_upload_bytes: usize,
}

pub fn build_router(state: HttpState) -> Router {
    let signed_routes = signed::routes()
        .layer(DefaultBodyLimit::max(state.max_upload_bytes))
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            require_signature,
        ));

    public::routes()
        .merge(signed_routes)
        .with_state(state)
        .layer(axum_middleware::from_fn(log_responses))
        .layer(axum_middleware::from_fn(set_request_context))
}

/// Run `work` against the service on the blocking pool.
async fn blocking<T, F>(state: &HttpState, work: F) -> Result<T, AppError>
where
    T: Send + 'static,
    F: FnOnce(&NoteService) -> Result<T, AppError> + Send + 'static,
{
    let service = state.service.clone();
    tokio::task::spawn_blocking(move || work(&service))
        .await
        .map_err(|err| AppError::unexpected(format!("blocking task failed: {err}")))?
}
