use std::sync::Arc;

use axum::{
    Router,
    body::Body,
    http::{Method, Request, StatusCode, header::CONTENT_TYPE},
};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use tower::ServiceExt;

use sharenote::application::notes::NoteService;
use sharenote::application::render::NoteTemplate;
use sharenote::cache::{Cache, CacheConfig};
use sharenote::domain::FileTypePolicy;
use sharenote::infra::http::{HttpState, build_router};
use sharenote::infra::signature::{KEY_HEADER, NONCE_HEADER, RequestSigner};
use sharenote::infra::storage::{AssetStore, NoteStore, StorageRoot};

const SECRET: &str = "route-secret";
const BASE: &str = "http://notes.test";

fn app() -> (tempfile::TempDir, Router) {
    let dir = tempfile::tempdir().expect("tempdir");
    let root = Arc::new(StorageRoot::open(dir.path()).expect("storage root"));
    let cache = Arc::new(Cache::new(CacheConfig::default()));
    let assets = Arc::new(AssetStore::new(
        root.clone(),
        FileTypePolicy::new(["png"]),
        cache.clone(),
        BASE,
    ));
    let notes = Arc::new(NoteStore::new(root, cache, assets, SECRET));
    let service = Arc::new(NoteService::new(notes, NoteTemplate::default(), BASE));
    let router = build_router(HttpState {
        service,
        signer: Arc::new(RequestSigner::new(SECRET)),
        max_upload_bytes: 1024,
    });
    (dir, router)
}

fn signed(method: Method, uri: &str) -> axum::http::request::Builder {
    let nonce = "nonce-1234";
    let key = RequestSigner::new(SECRET).sign(nonce).expect("signature");
    Request::builder()
        .method(method)
        .uri(uri)
        .header(NONCE_HEADER, nonce)
        .header(KEY_HEADER, key)
}

fn json_request(uri: &str, body: Value) -> Request<Body> {
    signed(Method::POST, uri)
        .header(CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .expect("request")
}

async fn send(router: &Router, request: Request<Body>) -> (StatusCode, Vec<u8>) {
    let response = router.clone().oneshot(request).await.expect("response");
    let status = response.status();
    let body = response
        .into_body()
        .collect()
        .await
        .expect("body")
        .to_bytes()
        .to_vec();
    (status, body)
}

async fn send_json(router: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let (status, body) = send(router, request).await;
    let value = serde_json::from_slice(&body).unwrap_or(Value::Null);
    (status, value)
}

fn get(uri: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .body(Body::empty())
        .expect("request")
}

#[tokio::test]
async fn unsigned_writes_are_rejected() {
    let (_dir, router) = app();

    let request = Request::builder()
        .method(Method::POST)
        .uri("/v1/file/create-note")
        .header(CONTENT_TYPE, "application/json")
        .body(Body::from(r#"{"template":{"title":"x"}}"#))
        .expect("request");
    let (status, body) = send_json(&router, request).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["success"], false);

    let request = Request::builder()
        .method(Method::POST)
        .uri("/v1/file/delete")
        .header(NONCE_HEADER, "nonce")
        .header(KEY_HEADER, "00")
        .header(CONTENT_TYPE, "application/json")
        .body(Body::from(r#"{"filename":"abc123"}"#))
        .expect("request");
    let (status, _) = send(&router, request).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn create_read_and_delete_a_note() {
    let (_dir, router) = app();

    let (status, body) = send_json(
        &router,
        json_request(
            "/v1/file/create-note",
            json!({
                "template": {
                    "title": "Hello World",
                    "description": "greeting",
                    "content": "<p>hello</p>"
                }
            }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    let url = body["url"].as_str().expect("url").to_string();
    let id = url.strip_prefix("http://notes.test/").expect("base");
    assert!(id.starts_with("hello-world-"));

    let (status, html) = send(&router, get(&format!("/{id}"))).await;
    assert_eq!(status, StatusCode::OK);
    let html = String::from_utf8(html).expect("utf8");
    assert!(html.contains("<title>Hello World</title>"));
    assert!(html.contains("<p>hello</p>"));

    let (status, tree) = send_json(&router, get("/api/doc-tree")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(tree[0]["title"], "Hello World");
    assert_eq!(tree[0]["url"], format!("/{id}"));
    assert_eq!(tree[0]["isFolder"], false);

    let code = id.rsplit('-').next().expect("code");
    let (status, body) = send_json(
        &router,
        json_request("/v1/file/delete", json!({ "filename": code })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);

    let (status, _) = send(&router, get(&format!("/{id}"))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn encrypted_notes_are_bad_requests() {
    let (_dir, router) = app();
    let (status, body) = send_json(
        &router,
        json_request(
            "/v1/file/create-note",
            json!({ "template": { "title": "Secret", "content": "x", "encrypted": true } }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "encrypted_unsupported");
}

#[tokio::test]
async fn upload_then_check_files_and_serve_static() {
    let (_dir, router) = app();

    let request = signed(Method::POST, "/v1/file/upload")
        .header("x-sharenote-hash", "ab12")
        .header("x-sharenote-filetype", "png")
        .body(Body::from(&b"\x89PNG-bytes"[..]))
        .expect("request");
    let (status, body) = send_json(&router, request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["url"], "http://notes.test/static/ab12.png");

    let (status, body) = send_json(
        &router,
        json_request(
            "/v1/file/check-files",
            json!({ "files": [
                { "hash": "ab12", "filetype": "png" },
                { "hash": "cd34", "filetype": "png" }
            ]}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["files"][0]["url"], "http://notes.test/static/ab12.png");
    assert_eq!(body["files"][1]["url"], false);
    assert_eq!(body["css"], false);

    let response = router
        .clone()
        .oneshot(get("/static/ab12.png"))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get(CONTENT_TYPE).expect("content type"),
        "image/png"
    );
}

#[tokio::test]
async fn upload_rejects_disallowed_types_and_oversized_bodies() {
    let (_dir, router) = app();

    let request = signed(Method::POST, "/v1/file/upload")
        .header("x-sharenote-hash", "ab12")
        .header("x-sharenote-filetype", "exe")
        .body(Body::from("payload"))
        .expect("request");
    let (status, body) = send_json(&router, request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "unsupported_type");

    let request = signed(Method::POST, "/v1/file/upload")
        .header("x-sharenote-hash", "ab12")
        .header("x-sharenote-filetype", "png")
        .body(Body::from(vec![0u8; 4096]))
        .expect("request");
    let (status, _) = send(&router, request).await;
    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
}

#[tokio::test]
async fn static_traversal_is_refused() {
    let (_dir, router) = app();
    let (status, _) = send(&router, get("/static/..%2F..%2Fetc%2Fpasswd")).await;
    assert!(status == StatusCode::FORBIDDEN || status == StatusCode::NOT_FOUND);

    let (status, _) = send(&router, get("/static/notes/x/secret.exe")).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn malformed_identifier_is_not_found() {
    let (_dir, router) = app();
    let (status, body) = send_json(&router, get("/Hello.World")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "not_found");
}

#[tokio::test]
async fn home_page_falls_back_to_placeholder() {
    let (_dir, router) = app();
    let (status, body) = send(&router, get("/")).await;
    assert_eq!(status, StatusCode::OK);
    assert!(
        String::from_utf8(body)
            .expect("utf8")
            .contains("Share Note Index")
    );
}

#[tokio::test]
async fn health_and_get_key_are_public() {
    let (_dir, router) = app();
    let (status, body) = send_json(&router, get("/api/system/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert!(body["timestamp"].as_f64().expect("timestamp") > 0.0);

    let (status, _) = send(&router, get("/v1/account/get-key")).await;
    assert_eq!(status, StatusCode::OK);
}
