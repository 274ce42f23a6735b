use std::{io, path::PathBuf};

use async_stream::try_stream;
use axum::{
    Json, Router,
    body::Body,
    extract::{Path, State},
    http::{
        HeaderValue, StatusCode,
        header::{CACHE_CONTROL, CONTENT_LENGTH, CONTENT_TYPE},
    },
    response::{Html, IntoResponse, Response},
    routing::get,
};
use bytes::Bytes;
use futures::Stream;
use serde::Serialize;
use time::OffsetDateTime;
use tokio::io::AsyncReadExt;

use crate::application::error::AppError;
use crate::infra::storage::{StaticFile, StoreError};

use super::{HttpState, blocking};

const PLACEHOLDER_HOME: &str = "The sharenote server is running. To customize this page, \
     upload a note titled <b>Share Note Index</b>.";
const GET_KEY_MESSAGE: &str =
    "Please set your API key in the Share Note plugin settings to the one configured on this server";
const STREAM_CHUNK_BYTES: usize = 64 * 1024;

pub(super) fn routes() -> Router<HttpState> {
    Router::new()
        .route("/", get(home))
        .route("/static/{*path}", get(serve_static))
        .route("/api/doc-tree", get(doc_tree))
        .route("/api/system/health", get(health))
        .route("/v1/account/get-key", get(get_key))
        .route("/{id}", get(note))
}

async fn home(State(state): State<HttpState>) -> Response {
    match blocking(&state, |service| service.home_page()).await {
        Ok(Some(body)) => Html(body.to_string()).into_response(),
        Ok(None) => Html(PLACEHOLDER_HOME).into_response(),
        Err(err) => err.into_response(),
    }
}

async fn note(State(state): State<HttpState>, Path(id): Path<String>) -> Response {
    let requested = id.clone();
    match blocking(&state, move |service| service.read_note(&id)).await {
        Ok(body) => Html(body.to_string()).into_response(),
        // A malformed identifier can never name a note.
        Err(AppError::Store(StoreError::InvalidIdentifier(_))) => {
            AppError::Store(StoreError::NotFound(requested)).into_response()
        }
        Err(err) => err.into_response(),
    }
}

async fn serve_static(State(state): State<HttpState>, Path(path): Path<String>) -> Response {
    let relative = path.clone();
    match blocking(&state, move |service| service.fetch_static(&relative)).await {
        Ok(file) => static_response(&path, file),
        Err(err) => err.into_response(),
    }
}

async fn doc_tree(State(state): State<HttpState>) -> Response {
    match blocking(&state, |service| service.doc_tree()).await {
        Ok(tree) => Json(tree.as_slice()).into_response(),
        Err(err) => err.into_response(),
    }
}

#[derive(Debug, Serialize)]
struct HealthStatus {
    status: &'static str,
    timestamp: f64,
}

async fn health() -> Json<HealthStatus> {
    let nanos = OffsetDateTime::now_utc().unix_timestamp_nanos();
    Json(HealthStatus {
        status: "healthy",
        timestamp: nanos as f64 / 1_000_000_000.0,
    })
}

async fn get_key() -> &'static str {
    GET_KEY_MESSAGE
}

fn static_response(path: &str, file: StaticFile) -> Response {
    let content_type = with_charset(file.content_type());
    let (body, len) = match file {
        StaticFile::Buffered { body, .. } => {
            let len = body.len() as u64;
            (Body::from(body), len)
        }
        StaticFile::Streamed { path, len, .. } => (Body::from_stream(file_chunks(path)), len),
    };

    let mut response = Response::new(body);
    *response.status_mut() = StatusCode::OK;

    let headers = response.headers_mut();
    if let Ok(value) = HeaderValue::from_str(&content_type) {
        headers.insert(CONTENT_TYPE, value);
    }
    if let Ok(value) = HeaderValue::from_str(&len.to_string()) {
        headers.insert(CONTENT_LENGTH, value);
    }
    if is_content_addressed(path) {
        headers.insert(
            CACHE_CONTROL,
            HeaderValue::from_static("public, max-age=31536000, immutable"),
        );
    }

    response
}

fn file_chunks(path: PathBuf) -> impl Stream<Item = io::Result<Bytes>> + Send + 'static {
    try_stream! {
        let mut file = tokio::fs::File::open(&path).await?;
        let mut buffer = vec![0u8; STREAM_CHUNK_BYTES];
        loop {
            let read = file.read(&mut buffer).await?;
            if read == 0 {
                break;
            }
            yield Bytes::copy_from_slice(&buffer[..read]);
        }
    }
}

fn with_charset(content_type: &str) -> String {
    let textual = content_type.starts_with("text/")
        || content_type == "application/javascript"
        || content_type == "application/json"
        || content_type == "image/svg+xml";
    if textual {
        format!("{content_type}; charset=utf-8")
    } else {
        content_type.to_string()
    }
}

/// Files under `notes/<id>/assets/` are named by their content hash.
fn is_content_addressed(path: &str) -> bool {
    let mut segments = path.split('/');
    matches!(
        (segments.next(), segments.next(), segments.next(), segments.next(), segments.next()),
        (Some("notes"), Some(_), Some("assets"), Some(_), None)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_owned_asset_paths_are_immutable() {
        assert!(is_content_addressed("notes/hello-abc123/assets/0a1b.png"));
        assert!(!is_content_addressed("theme.css"));
        assert!(!is_content_addressed("notes/hello-abc123/legacy.png"));
        assert!(!is_content_addressed("notes/a/assets/b/c.png"));
    }

    #[test]
    fn textual_types_carry_charset() {
        assert_eq!(with_charset("text/css"), "text/css; charset=utf-8");
        assert_eq!(with_charset("image/png"), "image/png");
    }
}
