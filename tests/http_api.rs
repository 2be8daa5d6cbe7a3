use std::path::{Path, PathBuf};
use std::sync::Arc;

use axum::http::StatusCode;
use axum_test::TestServer;
use axum_test::multipart::{MultipartForm, Part};
use serde_json::{Value, json};
use tempfile::TempDir;

use qrshare::config::MetricsFormat;
use qrshare::models::{GenerateResponse, UploadResponse};
use qrshare::{
    AppState, AssetStore, IntakeValidator, QrDecoder, QrEncoder, SequentialIds, ServerOptions,
    router,
};

const FAKE_PNG: &[u8] = b"\x89PNG\r\n\x1a\nnot really pixels";

struct Harness {
    server: TestServer,
    uploads: PathBuf,
    _tmp: TempDir,
}

fn harness() -> Harness {
    build(ServerOptions::default(), 5 * 1024 * 1024, None, None)
}

fn build(
    options: ServerOptions,
    max_file_size: u64,
    metrics: Option<MetricsFormat>,
    upload_dir: Option<PathBuf>,
) -> Harness {
    let tmp = tempfile::tempdir().expect("create tempdir");
    let uploads = upload_dir.unwrap_or_else(|| tmp.path().join("uploads"));
    let public = tmp.path().join("public");
    std::fs::create_dir_all(&public).expect("create public dir");
    std::fs::write(public.join("index.html"), "<h1>qrshare</h1>").expect("write index");

    let options = ServerOptions {
        public_dir: public,
        ..options
    };
    let store = AssetStore::with_ids(&uploads, Arc::new(SequentialIds::new("asset-")));
    let mut state = AppState::new(
        store,
        IntakeValidator::new(max_file_size),
        QrEncoder::new(),
        options,
    );
    if let Some(format) = metrics {
        state = state.with_metrics_endpoint(format);
    }

    let app = router(state).expect("build router");
    let server = TestServer::new(app).expect("start test server");
    Harness {
        server,
        uploads,
        _tmp: tmp,
    }
}

fn stored_files(dir: &Path) -> usize {
    match std::fs::read_dir(dir) {
        Ok(entries) => entries.count(),
        Err(_) => 0,
    }
}

fn image_form(file_name: &str, mime: &str, bytes: &[u8]) -> MultipartForm {
    MultipartForm::new().add_part(
        "image",
        Part::bytes(bytes.to_vec())
            .file_name(file_name.to_string())
            .mime_type(mime.to_string()),
    )
}

#[tokio::test]
async fn generate_returns_code_that_decodes_to_input() {
    let h = harness();
    let text = "https://example.com/some/page?ref=qr";

    let response = h
        .server
        .post("/generate")
        .json(&json!({ "text": text }))
        .await;
    response.assert_status_ok();

    let body: GenerateResponse = response.json();
    assert!(body.success);
    let decoded = QrDecoder::new()
        .decode_data_url(&body.qr_code)
        .expect("decode generated code");
    assert_eq!(decoded.as_str(), Some(text));
}

#[tokio::test]
async fn generate_accepts_any_non_empty_text() {
    let h = harness();
    let inputs = [
        "a",
        " ",
        "hello world",
        "WIFI:T:WPA;S:home;P:secret;;",
        "Grüße aus Köln ✓",
        "line one\nline two",
    ];

    for text in inputs {
        let response = h
            .server
            .post("/generate")
            .json(&json!({ "text": text }))
            .await;
        response.assert_status_ok();
        let body: Value = response.json();
        assert_eq!(body["success"], true, "input {text:?}");
        let qr = body["qrCode"].as_str().unwrap_or_default();
        assert!(qr.starts_with("data:image/png;base64,"), "input {text:?}");
        assert!(qr.len() > "data:image/png;base64,".len(), "input {text:?}");
    }
}

#[tokio::test]
async fn generate_rejects_empty_text() {
    let h = harness();

    let response = h
        .server
        .post("/generate")
        .json(&json!({ "text": "" }))
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);
    let body: Value = response.json();
    assert_eq!(body["error"], "Please enter text or URL.");
}

#[tokio::test]
async fn generate_rejects_missing_or_malformed_body() {
    let h = harness();

    let missing = h.server.post("/generate").json(&json!({})).await;
    missing.assert_status(StatusCode::BAD_REQUEST);

    let null_text = h
        .server
        .post("/generate")
        .json(&json!({ "text": null }))
        .await;
    null_text.assert_status(StatusCode::BAD_REQUEST);

    let wrong_shape = h
        .server
        .post("/generate")
        .json(&json!("just a string"))
        .await;
    wrong_shape.assert_status(StatusCode::BAD_REQUEST);
    let body: Value = wrong_shape.json();
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn generate_oversized_text_is_internal_error() {
    let h = harness();
    let response = h
        .server
        .post("/generate")
        .json(&json!({ "text": "x".repeat(10_000) }))
        .await;
    response.assert_status(StatusCode::INTERNAL_SERVER_ERROR);
    let body: Value = response.json();
    assert_eq!(body["error"], "Internal Server Error");
}

#[tokio::test]
async fn upload_stores_file_and_returns_link_code() {
    let h = harness();

    let response = h
        .server
        .post("/upload")
        .multipart(image_form("holiday.png", "image/png", FAKE_PNG))
        .await;
    response.assert_status_ok();

    let body: UploadResponse = response.json();
    assert!(body.success);
    assert!(body.image_url.starts_with("http://"));
    assert!(body.image_url.ends_with("/uploads/asset-00000000.png"));

    let stored = h.uploads.join("asset-00000000.png");
    assert_eq!(std::fs::read(&stored).expect("stored file"), FAKE_PNG);

    let decoded = QrDecoder::new()
        .decode_data_url(&body.qr_code)
        .expect("decode upload code");
    assert_eq!(decoded.as_str(), Some(body.image_url.as_str()));

    let served = h.server.get("/uploads/asset-00000000.png").await;
    served.assert_status_ok();
    assert_eq!(served.as_bytes().as_ref(), FAKE_PNG);
}

#[tokio::test]
async fn upload_link_uses_request_host() {
    let h = harness();

    let response = h
        .server
        .post("/upload")
        .add_header("host", "192.168.1.50:3000")
        .multipart(image_form("cat.JPG", "image/jpeg", FAKE_PNG))
        .await;
    response.assert_status_ok();

    let body: UploadResponse = response.json();
    assert_eq!(
        body.image_url,
        "http://192.168.1.50:3000/uploads/asset-00000000.JPG"
    );
}

#[tokio::test]
async fn upload_link_uses_configured_public_url() {
    let options = ServerOptions {
        public_url: Some("https://qr.example.com".to_string()),
        ..Default::default()
    };
    let h = build(options, 5 * 1024 * 1024, None, None);

    let response = h
        .server
        .post("/upload")
        .multipart(image_form("anim.gif", "image/gif", FAKE_PNG))
        .await;
    response.assert_status_ok();

    let body: UploadResponse = response.json();
    assert_eq!(
        body.image_url,
        "https://qr.example.com/uploads/asset-00000000.gif"
    );
}

#[tokio::test]
async fn upload_rejects_disallowed_types_without_writing() {
    let h = harness();
    let cases = [
        ("notes.txt", "text/plain"),
        ("notes.txt", "image/png"),
        ("photo.png", "text/plain"),
        ("logo.svg", "image/svg+xml"),
        ("scan.pdf", "application/pdf"),
        ("archive.png.zip", "application/zip"),
        ("noextension", "image/png"),
    ];

    for (file_name, mime) in cases {
        let response = h
            .server
            .post("/upload")
            .multipart(image_form(file_name, mime, FAKE_PNG))
            .await;
        response.assert_status(StatusCode::BAD_REQUEST);
        let body: Value = response.json();
        assert_eq!(
            body["error"], "Only images are allowed (jpeg, jpg, png, gif, webp)!",
            "{file_name} {mime}"
        );
    }

    assert_eq!(stored_files(&h.uploads), 0);
}

#[tokio::test]
async fn upload_without_file_field_is_rejected() {
    let h = harness();

    let form = MultipartForm::new().add_text("caption", "no file here");
    let response = h.server.post("/upload").multipart(form).await;
    response.assert_status(StatusCode::BAD_REQUEST);
    let body: Value = response.json();
    assert_eq!(body["error"], "Please upload an image file.");

    let text_under_image = MultipartForm::new().add_text("image", "plain value");
    let response = h.server.post("/upload").multipart(text_under_image).await;
    response.assert_status(StatusCode::BAD_REQUEST);

    let not_multipart = h
        .server
        .post("/upload")
        .json(&json!({ "image": "x" }))
        .await;
    not_multipart.assert_status(StatusCode::BAD_REQUEST);

    assert_eq!(stored_files(&h.uploads), 0);
}

#[tokio::test]
async fn upload_rejects_oversized_file() {
    let h = build(ServerOptions::default(), 1024, None, None);

    let response = h
        .server
        .post("/upload")
        .multipart(image_form("big.png", "image/png", &vec![0u8; 4096]))
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);
    let body: Value = response.json();
    assert_eq!(body["error"], "File too large (max 1024 bytes)");
    assert_eq!(stored_files(&h.uploads), 0);

    let at_limit = h
        .server
        .post("/upload")
        .multipart(image_form("ok.png", "image/png", &vec![0u8; 1024]))
        .await;
    at_limit.assert_status_ok();
}

#[tokio::test]
async fn repeated_uploads_of_same_name_get_distinct_files() {
    let h = harness();
    let mut urls = std::collections::HashSet::new();

    for _ in 0..25 {
        let response = h
            .server
            .post("/upload")
            .multipart(image_form("same.webp", "image/webp", FAKE_PNG))
            .await;
        response.assert_status_ok();
        let body: UploadResponse = response.json();
        urls.insert(body.image_url);
    }

    assert_eq!(urls.len(), 25);
    assert_eq!(stored_files(&h.uploads), 25);
}

#[tokio::test]
async fn storage_failure_is_internal_error() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let blocker = tmp.path().join("blocked");
    std::fs::write(&blocker, "a file where the upload dir should be").expect("write blocker");

    let h = build(
        ServerOptions::default(),
        5 * 1024 * 1024,
        None,
        Some(blocker.join("uploads")),
    );

    let response = h
        .server
        .post("/upload")
        .multipart(image_form("photo.png", "image/png", FAKE_PNG))
        .await;
    response.assert_status(StatusCode::INTERNAL_SERVER_ERROR);
    let body: Value = response.json();
    assert_eq!(body["error"], "Internal Server Error");
}

#[tokio::test]
async fn failed_encode_leaves_no_stored_file() {
    let h = harness();
    // Link longer than any QR version can hold.
    let host = format!("{}.example.com", "a".repeat(3_000));

    let response = h
        .server
        .post("/upload")
        .add_header("host", host.as_str())
        .multipart(image_form("photo.png", "image/png", FAKE_PNG))
        .await;
    response.assert_status(StatusCode::INTERNAL_SERVER_ERROR);
    let body: Value = response.json();
    assert_eq!(body["error"], "Internal Server Error");
    assert_eq!(stored_files(&h.uploads), 0);

    let retry = h
        .server
        .post("/upload")
        .multipart(image_form("photo.png", "image/png", FAKE_PNG))
        .await;
    retry.assert_status_ok();
    assert_eq!(stored_files(&h.uploads), 1);
}

#[tokio::test]
async fn serves_front_end_and_health() {
    let h = harness();

    let index = h.server.get("/").await;
    index.assert_status_ok();
    assert!(index.text().contains("qrshare"));

    let health = h.server.get("/healthz").await;
    health.assert_status_ok();
    let body: Value = health.json();
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn metrics_endpoint_counts_requests() {
    let h = build(
        ServerOptions::default(),
        5 * 1024 * 1024,
        Some(MetricsFormat::Prometheus),
        None,
    );

    h.server
        .post("/generate")
        .json(&json!({ "text": "count me" }))
        .await
        .assert_status_ok();
    h.server
        .post("/generate")
        .json(&json!({ "text": "" }))
        .await
        .assert_status(StatusCode::BAD_REQUEST);

    let response = h.server.get("/metrics").await;
    response.assert_status_ok();
    let text = response.text();
    assert!(text.contains("qrshare_requests_total{flow=\"text\",result=\"success\"} 1"));
    assert!(text.contains("qrshare_requests_total{flow=\"text\",result=\"failure\"} 1"));
}

#[tokio::test]
async fn metrics_endpoint_disabled_by_default() {
    let h = harness();
    let response = h.server.get("/metrics").await;
    response.assert_status(StatusCode::NOT_FOUND);
}
