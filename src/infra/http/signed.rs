use axum::{
    Json, Router,
    extract::State,
    http::HeaderMap,
    response::{IntoResponse, Response},
    routing::post,
};
use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::application::error::AppError;
use crate::application::notes::{NotePayload, UploadRequest};
use crate::domain::AssetDescriptor;

use super::middleware::header_str;
use super::{HttpState, blocking};

const HASH_HEADER: &str = "x-sharenote-hash";
const FILETYPE_HEADER: &str = "x-sharenote-filetype";
const NOTE_HEADER: &str = "x-sharenote-note";

pub(super) fn routes() -> Router<HttpState> {
    Router::new()
        .route("/v1/file/check-files", post(check_files))
        .route("/v1/file/upload", post(upload))
        .route("/v1/file/create-note", post(create_note))
        .route("/v1/file/delete", post(delete_note))
}

#[derive(Debug, Deserialize)]
struct CheckFilesRequest {
    #[serde(default)]
    files: Vec<AssetDescriptor>,
}

#[derive(Debug, Deserialize)]
struct DeleteRequest {
    filename: String,
}

#[derive(Debug, Serialize)]
struct Deleted {
    success: bool,
}

async fn check_files(
    State(state): State<HttpState>,
    Json(request): Json<CheckFilesRequest>,
) -> Response {
    match blocking(&state, move |service| service.check_files(&request.files)).await {
        Ok(body) => Json(body).into_response(),
        Err(err) => err.into_response(),
    }
}

async fn upload(State(state): State<HttpState>, headers: HeaderMap, body: Bytes) -> Response {
    let request = match upload_request(&headers) {
        Ok(request) => request,
        Err(err) => return err.into_response(),
    };
    match blocking(&state, move |service| service.upload(&request, &body)).await {
        Ok(body) => Json(body).into_response(),
        Err(err) => err.into_response(),
    }
}

async fn create_note(
    State(state): State<HttpState>,
    Json(payload): Json<NotePayload>,
) -> Response {
    match blocking(&state, move |service| service.publish(&payload)).await {
        Ok(body) => Json(body).into_response(),
        Err(err) => err.into_response(),
    }
}

async fn delete_note(
    State(state): State<HttpState>,
    Json(request): Json<DeleteRequest>,
) -> Response {
    match blocking(&state, move |service| service.delete(&request.filename)).await {
        Ok(_) => Json(Deleted { success: true }).into_response(),
        Err(err) => err.into_response(),
    }
}

fn upload_request(headers: &HeaderMap) -> Result<UploadRequest, AppError> {
    let required = |name: &'static str| {
        let value = header_str(headers, name);
        if value.is_empty() {
            Err(AppError::validation(format!("missing {name} header")))
        } else {
            Ok(value.to_string())
        }
    };

    let note = header_str(headers, NOTE_HEADER);
    Ok(UploadRequest {
        hash: required(HASH_HEADER)?,
        file_type: required(FILETYPE_HEADER)?,
        note: (!note.is_empty()).then(|| note.to_string()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn upload_headers_are_required_except_note() {
        let mut headers = HeaderMap::new();
        headers.insert(HASH_HEADER, HeaderValue::from_static("0a1b"));
        assert!(matches!(
            upload_request(&headers),
            Err(AppError::Validation(_))
        ));

        headers.insert(FILETYPE_HEADER, HeaderValue::from_static("png"));
        let request = upload_request(&headers).expect("request");
        assert_eq!(request.hash, "0a1b");
        assert_eq!(request.file_type, "png");
        assert!(request.note.is_none());
    }
}
