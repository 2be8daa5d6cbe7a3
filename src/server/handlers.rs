//! Request handlers for the upload and text flows

use crate::error::{Error, Result};
use crate::intake::IntakeValidator;
use crate::models::{
    EncodeKind, EncodeRequest, EncodeResult, GenerateRequest, GenerateResponse, UploadResponse,
};
use crate::qr::QrEncoder;
use crate::server::AppState;
use crate::server::net::request_origin;
use axum::Json;
use axum::extract::multipart::{Field, MultipartError, MultipartRejection};
use axum::extract::rejection::JsonRejection;
use axum::extract::{Multipart, State};
use axum::http::header::CONTENT_TYPE;
use axum::http::{HeaderMap, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use bytes::{Bytes, BytesMut};
use serde_json::json;
use std::time::Instant;

/// Multipart form field carrying the uploaded image
pub const IMAGE_FIELD: &str = "image";

/// `POST /upload`: store an image and return a code linking to it.
pub async fn upload(
    State(state): State<AppState>,
    headers: HeaderMap,
    uri: Uri,
    multipart: std::result::Result<Multipart, MultipartRejection>,
) -> Result<Json<UploadResponse>> {
    let started = Instant::now();
    let result = handle_upload(&state, &headers, &uri, multipart).await;
    state
        .metrics
        .record(EncodeKind::Image, started.elapsed(), result.is_ok());
    result.map(Json)
}

async fn handle_upload(
    state: &AppState,
    headers: &HeaderMap,
    uri: &Uri,
    multipart: std::result::Result<Multipart, MultipartRejection>,
) -> Result<UploadResponse> {
    let mut multipart = multipart.map_err(|rejection| {
        tracing::debug!(%rejection, "Upload without multipart body");
        Error::MissingFile
    })?;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| multipart_error(e, &state.validator))?
    {
        if field.name() != Some(IMAGE_FIELD) {
            continue;
        }
        // A plain form value under the file field name is not a file.
        let Some(file_name) = field.file_name().map(str::to_string) else {
            continue;
        };
        let mime = field.content_type().unwrap_or_default().to_string();

        let extension = state.validator.check_type(&mime, &file_name)?;
        let bytes = read_limited(field, &state.validator).await?;

        let asset = state.store.store(&extension, &bytes).await?;
        let origin = request_origin(&state.options, headers, uri, &state.fallback_host);
        let image_url = asset.public_url(&origin);

        let encoded = encode(
            state.encoder,
            EncodeRequest::Image {
                source_url: image_url.clone(),
            },
        )
        .await;
        // No link is returned on failure; drop the stored file.
        let qr_code = match encoded {
            Ok(qr_code) => qr_code,
            Err(err) => {
                state.store.discard(&asset).await;
                return Err(err);
            }
        };

        tracing::info!(
            original = %file_name,
            stored = %asset.file_name(),
            url = %image_url,
            "Generated code for upload"
        );
        return Ok(UploadResponse {
            success: true,
            image_url,
            qr_code: qr_code.into_string(),
        });
    }

    Err(Error::MissingFile)
}

/// Buffer a file field, failing as soon as it grows past the size ceiling.
async fn read_limited(mut field: Field<'_>, validator: &IntakeValidator) -> Result<Bytes> {
    let mut buffer = BytesMut::new();
    while let Some(chunk) = field
        .chunk()
        .await
        .map_err(|e| multipart_error(e, validator))?
    {
        validator.check_size((buffer.len() + chunk.len()) as u64)?;
        buffer.extend_from_slice(&chunk);
    }
    Ok(buffer.freeze())
}

fn multipart_error(err: MultipartError, validator: &IntakeValidator) -> Error {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        return Error::Validation(format!(
            "File too large (max {} bytes)",
            validator.max_bytes()
        ));
    }
    Error::Validation(format!("Failed to parse multipart data: {}", err.body_text()))
}

/// `POST /generate`: encode submitted text or URL directly.
pub async fn generate(
    State(state): State<AppState>,
    payload: std::result::Result<Json<GenerateRequest>, JsonRejection>,
) -> Result<Json<GenerateResponse>> {
    let started = Instant::now();
    let result = handle_generate(&state, payload).await;
    state
        .metrics
        .record(EncodeKind::Text, started.elapsed(), result.is_ok());
    result.map(Json)
}

async fn handle_generate(
    state: &AppState,
    payload: std::result::Result<Json<GenerateRequest>, JsonRejection>,
) -> Result<GenerateResponse> {
    let Json(request) = payload.map_err(|rejection| Error::Validation(rejection.body_text()))?;
    let content = request
        .text
        .filter(|text| !text.is_empty())
        .ok_or(Error::EmptyText)?;

    let chars = content.chars().count();
    let qr_code = encode(state.encoder, EncodeRequest::Text { content }).await?;
    tracing::info!(chars, "Generated code for text");

    Ok(GenerateResponse {
        success: true,
        qr_code: qr_code.into_string(),
    })
}

/// Render on the blocking pool; QR construction and PNG compression are CPU bound.
async fn encode(encoder: QrEncoder, request: EncodeRequest) -> Result<EncodeResult> {
    let kind = request.kind();
    tokio::task::spawn_blocking(move || encoder.encode_data_url(request.as_str()))
        .await
        .map_err(|e| Error::Other(format!("{kind} encoder task failed: {e}")))?
}

/// `GET /metrics`
pub async fn metrics(State(state): State<AppState>) -> Response {
    let (content_type, body) = state.metrics.render(state.metrics_format);
    ([(CONTENT_TYPE, content_type)], body).into_response()
}

/// `GET /healthz`
pub async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}
